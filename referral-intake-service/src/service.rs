use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, patch, post},
};
use referral_flow::{
    InMemoryReferralStore, IntakeError, NewReferral, PostgresReferralStore, RawReferral, Referral,
    ReferralClassifier, ReferralStatus, ReferralStore, StoredParse, derive_status,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::{
    config::ServiceConfig,
    models::{
        ParseResponse, ParseTextRequest, SampleReferrals, SaveReferralRequest, StatusUpdateRequest,
    },
    pdf::{extract_pdf_text, is_pdf_filename},
    samples::sample_referrals,
    seed::seed_if_empty,
};

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: i64) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "referral_id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReferralStore>,
    pub classifier: ReferralClassifier,
}

pub async fn create_app(config: &ServiceConfig) -> anyhow::Result<Router> {
    let app_state = create_app_state(config).await?;
    Ok(build_router(app_state))
}

async fn create_app_state(config: &ServiceConfig) -> anyhow::Result<AppState> {
    let store = create_referral_store(config).await?;
    if config.seed_demo_data {
        seed_if_empty(store.as_ref()).await?;
    }

    let classifier = ReferralClassifier::from_config(&config.extraction);
    if !classifier.ai_enabled() {
        warn!("OPENROUTER_API_KEY not set, referrals will be parsed heuristically");
    }

    Ok(AppState { store, classifier })
}

async fn create_referral_store(config: &ServiceConfig) -> anyhow::Result<Arc<dyn ReferralStore>> {
    match &config.database_url {
        Some(database_url) => {
            let store = PostgresReferralStore::connect(database_url).await?;
            info!("Using PostgreSQL referral store");
            Ok(Arc::new(store))
        }
        None => {
            warn!("DATABASE_URL not set, referrals are kept in memory only");
            Ok(Arc::new(InMemoryReferralStore::new()))
        }
    }
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/referrals", get(list_referrals))
        .route("/referrals/{referral_id}", get(get_referral))
        .route("/referrals/{referral_id}/status", patch(update_status))
        .route("/parse", post(parse_text))
        .route("/parse/pdf", post(parse_pdf))
        .route("/save", post(save_referral))
        .route("/samples", get(samples))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Referral Intake Service",
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Parses DME referral faxes into structured intake records",
        "endpoints": {
            "GET /referrals": "List saved referrals, newest first",
            "GET /referrals/{id}": "Get one referral",
            "PATCH /referrals/{id}/status": "Update a referral's status",
            "POST /parse": "Parse referral text",
            "POST /parse/pdf": "Parse an uploaded referral PDF",
            "POST /save": "Save a parsed referral",
            "GET /samples": "Sample referral texts",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn list_referrals(State(state): State<AppState>) -> ApiResult<Vec<Referral>> {
    state.store.list().await.map(Json).map_err(|e| {
        error!("Failed to list referrals: {}", e);
        internal_error("Failed to list referrals", &e.to_string())
    })
}

async fn get_referral(
    State(state): State<AppState>,
    Path(referral_id): Path<i64>,
) -> ApiResult<Referral> {
    match state.store.get(referral_id).await {
        Ok(Some(referral)) => Ok(Json(referral)),
        Ok(None) => Err(not_found_error("Referral not found", referral_id)),
        Err(e) => {
            error!("Failed to load referral {}: {}", referral_id, e);
            Err(internal_error("Failed to load referral", &e.to_string()))
        }
    }
}

async fn parse_text(
    State(state): State<AppState>,
    Json(request): Json<ParseTextRequest>,
) -> ApiResult<ParseResponse> {
    let referral = validate_referral_text(request.text)?;
    info!(chars = referral.text().len(), "Parsing referral text");

    let parsed_data = state.classifier.classify(&referral).await;
    Ok(Json(ParseResponse {
        success: true,
        raw_text: referral.into_text(),
        parsed_data,
        message: Some("Referral parsed successfully".to_string()),
    }))
}

async fn parse_pdf(State(state): State<AppState>, multipart: Multipart) -> ApiResult<ParseResponse> {
    let (filename, bytes) = read_upload(multipart).await?;
    if !is_pdf_filename(&filename) {
        return Err(bad_request_error("File must be a PDF"));
    }
    info!(%filename, bytes = bytes.len(), "Parsing referral PDF");

    let text = extract_pdf_text(bytes).await.map_err(|e| {
        error!("PDF extraction failed for {}: {}", filename, e);
        internal_error("PDF parsing failed", &e.to_string())
    })?;

    if text.trim().is_empty() {
        return Err(bad_request_error("Could not extract text from PDF"));
    }

    let referral = validate_referral_text(text)?;
    let parsed_data = state.classifier.classify(&referral).await;
    Ok(Json(ParseResponse {
        success: true,
        raw_text: referral.into_text(),
        parsed_data,
        message: Some("PDF parsed successfully".to_string()),
    }))
}

async fn read_upload(mut multipart: Multipart) -> Result<(String, Vec<u8>), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request_error(&format!("Invalid upload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| {
            warn!("Failed to read upload bytes: {}", e);
            bad_request_error("Failed to read file data")
        })?;
        return Ok((filename, bytes.to_vec()));
    }
    Err(bad_request_error("No file provided"))
}

fn validate_referral_text(text: String) -> Result<RawReferral, ApiError> {
    RawReferral::new(text).map_err(|e| match e {
        IntakeError::Validation(message) => bad_request_error(&message),
        other => internal_error("Failed to read referral", &other.to_string()),
    })
}

fn parse_status(label: &str) -> Result<ReferralStatus, ApiError> {
    label.parse().map_err(|e: IntakeError| match e {
        IntakeError::Validation(message) => bad_request_error(&message),
        other => internal_error("Failed to read status", &other.to_string()),
    })
}

async fn save_referral(
    State(state): State<AppState>,
    Json(request): Json<SaveReferralRequest>,
) -> ApiResult<Referral> {
    let requested = match request.status.as_deref().map(str::trim) {
        Some(label) if !label.is_empty() => parse_status(label)?,
        _ => ReferralStatus::New,
    };

    let parsed_data = StoredParse::from_value(request.parsed_data);
    let status = derive_status(&parsed_data.missing_info(), requested);

    let saved = state
        .store
        .create(NewReferral {
            patient_name: request.patient_name,
            insurance: request.insurance,
            status,
            raw_text: request.raw_text,
            parsed_data,
        })
        .await
        .map_err(|e| {
            error!("Failed to save referral: {}", e);
            internal_error("Save failed", &e.to_string())
        })?;

    info!(referral_id = saved.id, %status, "Referral saved");
    Ok(Json(saved))
}

async fn update_status(
    State(state): State<AppState>,
    Path(referral_id): Path<i64>,
    Json(request): Json<StatusUpdateRequest>,
) -> ApiResult<Value> {
    let status = parse_status(&request.status)?;

    match state.store.update_status(referral_id, status).await {
        Ok(true) => {
            info!(referral_id, %status, "Referral status updated");
            Ok(Json(json!({ "success": true, "message": "Status updated" })))
        }
        Ok(false) => Err(not_found_error("Referral not found", referral_id)),
        Err(e) => {
            error!("Failed to update referral {}: {}", referral_id, e);
            Err(internal_error("Failed to update status", &e.to_string()))
        }
    }
}

async fn samples() -> Json<SampleReferrals> {
    Json(sample_referrals())
}
