pub mod adapter;
pub mod config;
pub mod error;
pub mod extractor;
pub mod models;
pub mod pipeline;
pub mod storage;
pub mod storage_postgres;
pub mod triage;

// Re-export commonly used types
pub use adapter::{AdapterOutcome, CompletionBackend, ExtractionAdapter};
#[cfg(feature = "rig")]
pub use adapter::OpenRouterBackend;
pub use config::ExtractionConfig;
pub use error::{AdapterFailure, IntakeError, Result};
pub use models::{
    ExtractedRecord, ExtractionSource, MIN_REFERRAL_TEXT_LEN, ParseResult, RawReferral, Urgency,
};
pub use pipeline::{ReferralClassifier, status_for};
pub use storage::{InMemoryReferralStore, NewReferral, Referral, ReferralStore, StoredParse};
pub use storage_postgres::PostgresReferralStore;
pub use triage::{ReferralStatus, derive_status};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    struct CannedBackend(String);

    #[async_trait]
    impl CompletionBackend for CannedBackend {
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            Ok(self.0.clone())
        }
    }

    const MISSING_INSURANCE_FAX: &str = "URGENT - HOSPITAL DISCHARGE TODAY\n\nPatient: Thomas Garcia\nDOB: 07/14/1982\n\n** INSURANCE NOT ON FILE - PATIENT WILL CALL **";

    #[tokio::test]
    async fn test_classify_and_store_fallback_referral() {
        let classifier = ReferralClassifier::from_config(&ExtractionConfig::heuristic_only());
        let store = InMemoryReferralStore::new();

        let result = classifier.classify_text(MISSING_INSURANCE_FAX).await.unwrap();
        assert!(result.is_fallback());
        assert_eq!(
            result.extracted_data.patient_name.as_deref(),
            Some("Thomas Garcia")
        );
        assert_eq!(
            result.missing_info,
            vec!["insurance info missing", "policy/member ID needed"]
        );

        let status = status_for(&result, ReferralStatus::New);
        assert_eq!(status, ReferralStatus::PendingInsurance);

        let saved = store
            .create(NewReferral {
                patient_name: "Thomas Garcia".to_string(),
                insurance: "Unknown".to_string(),
                status,
                raw_text: MISSING_INSURANCE_FAX.to_string(),
                parsed_data: StoredParse::Parsed(result.clone()),
            })
            .await
            .unwrap();

        let loaded = store.get(saved.id).await.unwrap().unwrap();
        assert_eq!(loaded.parsed_data, Some(StoredParse::Parsed(result)));
    }

    #[tokio::test]
    async fn test_ai_and_fallback_results_store_interchangeably() {
        let ai_json = r#"{
            "extracted_data": {
                "patient_name": "Dorothy Mitchell",
                "insurance": "Medicare Part B",
                "icd_codes": ["L89.314"],
                "urgency": "routine"
            },
            "missing_info": ["Signed Certificate of Medical Necessity (CMN)"],
            "next_steps": ["Fax CMN to Dr. Chen"]
        }"#;
        let adapter = ExtractionAdapter::with_backend(
            Arc::new(CannedBackend(ai_json.to_string())),
            Duration::from_secs(1),
        );
        let classifier = ReferralClassifier::new(adapter);

        let ai_result = classifier
            .classify(&RawReferral::new("Patient Name: Dorothy Mitchell").unwrap())
            .await;
        assert_eq!(ai_result.source, ExtractionSource::Ai);
        assert_eq!(
            status_for(&ai_result, ReferralStatus::New),
            ReferralStatus::PendingAuth
        );

        let stored = StoredParse::Parsed(ai_result.clone());
        let reloaded = StoredParse::from_text(&stored.to_text().unwrap());
        assert_eq!(reloaded, stored);
    }
}
