use std::time::Duration;

pub const DEFAULT_EXTRACTION_MODEL: &str = "google/gemini-2.0-flash-001";
pub const DEFAULT_EXTRACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for the AI extraction path. Built once at startup and injected.
#[derive(Clone)]
pub struct ExtractionConfig {
    /// No key means every referral goes through the heuristic extractor.
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl ExtractionConfig {
    pub fn heuristic_only() -> Self {
        Self {
            api_key: None,
            ..Self::default()
        }
    }

    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    pub fn ai_enabled(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.trim().is_empty())
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_EXTRACTION_MODEL.to_string(),
            timeout: DEFAULT_EXTRACTION_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}
