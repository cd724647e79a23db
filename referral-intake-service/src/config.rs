use std::time::Duration;

use referral_flow::{ExtractionConfig, config::DEFAULT_EXTRACTION_MODEL};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Process configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    /// No URL means referrals live in memory for the life of the process.
    pub database_url: Option<String>,
    pub seed_demo_data: bool,
    pub log_format: LogFormat,
    pub extraction: ExtractionConfig,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = non_empty("PORT")
            .and_then(|port| port.parse::<u16>().ok())
            .unwrap_or(8000);

        let seed_demo_data = non_empty("SEED_DEMO_DATA")
            .map(|flag| !matches!(flag.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(true);

        let log_format = match non_empty("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let timeout = non_empty("EXTRACTION_TIMEOUT_SECS")
            .and_then(|secs| secs.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(referral_flow::config::DEFAULT_EXTRACTION_TIMEOUT);

        let extraction = ExtractionConfig {
            api_key: non_empty("OPENROUTER_API_KEY"),
            model: non_empty("EXTRACTION_MODEL").unwrap_or_else(|| DEFAULT_EXTRACTION_MODEL.to_string()),
            timeout,
        };

        Self {
            port,
            database_url: non_empty("DATABASE_URL"),
            seed_demo_data,
            log_format,
            extraction,
        }
    }
}
