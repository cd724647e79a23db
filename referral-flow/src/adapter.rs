use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::ExtractionConfig,
    error::AdapterFailure,
    extractor,
    models::{ExtractionSource, ParseResult},
};

pub const EXTRACTION_PROMPT: &str = r#"You are helping process a DME (durable medical equipment) referral for a home healthcare company.
Extract the key information an intake coordinator needs to process this order.

Referrals arrive as clean typed documents, messy faxes, or handwritten notes. Pull out what you can.

Extract these fields (use null if not found):
- patient_name: full name
- dob: date of birth (any format)
- insurance: insurance company/plan
- policy_number: member ID, policy number, etc
- referring_physician: doctor who sent the referral
- physician_npi: the physician's NPI number
- physician_contact: phone/fax for the physician's office
- diagnosis: diagnosis description
- icd_codes: list of ICD-10 codes
- hcpcs_codes: list of HCPCS billing codes for the requested supplies
- supplies_requested: list of equipment/supplies needed
- clinical_notes: relevant clinical justification
- delivery_address: where the supplies should be delivered
- urgency: "stat" if delivery is urgent, otherwise "routine"

Also identify:
- missing_info: critical information that is missing and would block processing (insurance, DOB, signed CMN, prior auth, etc)
- next_steps: specific, practical actions for the intake team ("call Dr. X for signature", "verify eligibility with Aetna", etc)

Return JSON only, no markdown, no explanation:
{
    "extracted_data": { ... },
    "missing_info": [...],
    "next_steps": [...]
}"#;

/// Text-in, text-out access to a language model.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

#[cfg(feature = "rig")]
pub use openrouter_backend::OpenRouterBackend;

#[cfg(feature = "rig")]
mod openrouter_backend {
    use async_trait::async_trait;
    use rig::{
        agent::Agent,
        client::CompletionClient,
        completion::Prompt,
        providers::openrouter,
    };

    use super::CompletionBackend;

    /// Completion backend that talks to OpenRouter through rig.
    pub struct OpenRouterBackend {
        agent: Agent<openrouter::CompletionModel>,
    }

    impl OpenRouterBackend {
        pub fn new(api_key: &str, model: &str) -> Self {
            let client = openrouter::Client::new(api_key);
            let agent = client.agent(model).temperature(0.0).build();
            Self { agent }
        }
    }

    #[async_trait]
    impl CompletionBackend for OpenRouterBackend {
        async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
            let response = self.agent.prompt(prompt).await?;
            Ok(response)
        }
    }
}

/// Result of one attempt at AI extraction, before collapsing to a [`ParseResult`].
#[derive(Debug)]
pub enum AdapterOutcome {
    Success(ParseResult),
    Unavailable,
    Failure(AdapterFailure),
}

/// Prefers the AI backend, falls back to the heuristic extractor on anything else.
#[derive(Clone)]
pub struct ExtractionAdapter {
    backend: Option<Arc<dyn CompletionBackend>>,
    timeout: Duration,
}

impl ExtractionAdapter {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        let backend = if config.ai_enabled() {
            build_backend(config)
        } else {
            None
        };

        Self {
            backend,
            timeout: config.timeout,
        }
    }

    pub fn with_backend(backend: Arc<dyn CompletionBackend>, timeout: Duration) -> Self {
        Self {
            backend: Some(backend),
            timeout,
        }
    }

    pub fn heuristic_only() -> Self {
        Self::from_config(&ExtractionConfig::heuristic_only())
    }

    pub fn ai_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Always produces a result; AI problems are logged, never returned.
    pub async fn parse(&self, text: &str) -> ParseResult {
        let extraction_id = Uuid::new_v4();

        match self.attempt(text).await {
            AdapterOutcome::Success(result) => {
                info!(
                    %extraction_id,
                    missing = result.missing_info.len(),
                    "AI extraction succeeded"
                );
                result
            }
            AdapterOutcome::Unavailable => {
                debug!(%extraction_id, "No AI backend configured, using heuristic extraction");
                extractor::extract(text)
            }
            AdapterOutcome::Failure(reason) => {
                warn!(
                    %extraction_id,
                    error = %reason,
                    "AI extraction failed, using heuristic extraction"
                );
                extractor::extract(text)
            }
        }
    }

    pub async fn attempt(&self, text: &str) -> AdapterOutcome {
        let Some(backend) = &self.backend else {
            return AdapterOutcome::Unavailable;
        };

        let prompt = build_prompt(text);
        let response = match tokio::time::timeout(self.timeout, backend.complete(&prompt)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return AdapterOutcome::Failure(AdapterFailure::Service(format!("{e:#}"))),
            Err(_) => return AdapterOutcome::Failure(AdapterFailure::Timeout(self.timeout)),
        };

        match parse_response(&response) {
            Ok(result) => AdapterOutcome::Success(result),
            Err(failure) => AdapterOutcome::Failure(failure),
        }
    }
}

#[cfg(feature = "rig")]
fn build_backend(config: &ExtractionConfig) -> Option<Arc<dyn CompletionBackend>> {
    let api_key = config.api_key.as_deref()?;
    info!(model = %config.model, "AI extraction enabled");
    Some(Arc::new(OpenRouterBackend::new(api_key, &config.model)))
}

#[cfg(not(feature = "rig"))]
fn build_backend(_config: &ExtractionConfig) -> Option<Arc<dyn CompletionBackend>> {
    warn!("API key configured but built without the `rig` feature; AI extraction disabled");
    None
}

pub fn build_prompt(text: &str) -> String {
    format!(
        "{}\n\n--- REFERRAL TO PARSE ---\n{}\n---\n\nJSON output:",
        EXTRACTION_PROMPT, text
    )
}

/// Remove a leading ```json / ``` marker and a trailing ``` marker.
pub fn strip_code_fences(response: &str) -> &str {
    let mut body = response.trim();
    if let Some(rest) = body.strip_prefix("```json") {
        body = rest;
    } else if let Some(rest) = body.strip_prefix("```") {
        body = rest;
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }
    body.trim()
}

pub fn parse_response(response: &str) -> Result<ParseResult, AdapterFailure> {
    let value: Value = serde_json::from_str(strip_code_fences(response))
        .map_err(|e| AdapterFailure::MalformedResponse(e.to_string()))?;

    let mut result = ParseResult::try_from(value)
        .map_err(|e| AdapterFailure::MalformedResponse(e.to_string()))?;
    result.source = ExtractionSource::Ai;
    Ok(result)
}
