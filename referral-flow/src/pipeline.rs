use tracing::info;

use crate::{
    adapter::ExtractionAdapter,
    config::ExtractionConfig,
    error::Result,
    models::{ParseResult, RawReferral},
    triage::{ReferralStatus, derive_status},
};

/// Entry point used by request handlers: raw text in, triaged result out.
#[derive(Clone)]
pub struct ReferralClassifier {
    adapter: ExtractionAdapter,
}

impl ReferralClassifier {
    pub fn new(adapter: ExtractionAdapter) -> Self {
        Self { adapter }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(ExtractionAdapter::from_config(config))
    }

    pub fn ai_enabled(&self) -> bool {
        self.adapter.ai_enabled()
    }

    /// Never fails once the input has been validated.
    pub async fn classify(&self, referral: &RawReferral) -> ParseResult {
        let result = self.adapter.parse(referral.text()).await;
        info!(
            source = ?result.source,
            missing = result.missing_info.len(),
            next_steps = result.next_steps.len(),
            "Referral classified"
        );
        result
    }

    /// Validate then classify. The length check is the only error surfaced.
    pub async fn classify_text(&self, text: &str) -> Result<ParseResult> {
        let referral = RawReferral::new(text)?;
        Ok(self.classify(&referral).await)
    }
}

/// Status for a referral about to be saved.
pub fn status_for(result: &ParseResult, fallback: ReferralStatus) -> ReferralStatus {
    derive_status(&result.missing_info, fallback)
}
