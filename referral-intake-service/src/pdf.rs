use referral_flow::{IntakeError, Result};
use tracing::info;

pub fn is_pdf_filename(filename: &str) -> bool {
    filename.to_lowercase().ends_with(".pdf")
}

/// Pull the embedded text layer out of a PDF. Scanned pages yield nothing.
pub async fn extract_pdf_text(bytes: Vec<u8>) -> Result<String> {
    let size = bytes.len();
    let text = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem(&bytes).map_err(|e| IntakeError::Pdf(e.to_string()))
    })
    .await
    .map_err(|e| IntakeError::Pdf(format!("PDF worker failed: {}", e)))??;

    info!(bytes = size, chars = text.len(), "Extracted text from PDF");
    Ok(text)
}
