use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{error::Result, models::ParseResult, triage::ReferralStatus};

/// Persisted parse output. Anything that does not match the [`ParseResult`]
/// shape is kept verbatim.
///
/// Deserializes from any JSON: a string is read back like stored text, any
/// other value goes through [`StoredParse::from_value`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged, from = "Value")]
pub enum StoredParse {
    Parsed(ParseResult),
    Opaque(String),
}

impl From<Value> for StoredParse {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => StoredParse::from_text(&text),
            other => StoredParse::from_value(other),
        }
    }
}

impl StoredParse {
    pub fn from_value(value: Value) -> Self {
        match ParseResult::try_from(value.clone()) {
            Ok(result) => StoredParse::Parsed(result),
            Err(_) => StoredParse::Opaque(value.to_string()),
        }
    }

    pub fn from_text(text: &str) -> Self {
        serde_json::from_str::<ParseResult>(text)
            .map(StoredParse::Parsed)
            .unwrap_or_else(|_| StoredParse::Opaque(text.to_string()))
    }

    pub fn to_text(&self) -> Result<String> {
        match self {
            StoredParse::Parsed(result) => Ok(serde_json::to_string(result)?),
            StoredParse::Opaque(text) => Ok(text.clone()),
        }
    }

    /// Missing-info entries, read loosely from opaque JSON when possible.
    pub fn missing_info(&self) -> Vec<String> {
        match self {
            StoredParse::Parsed(result) => result.missing_info.clone(),
            StoredParse::Opaque(text) => serde_json::from_str::<Value>(text)
                .ok()
                .and_then(|value| match value.get("missing_info") {
                    Some(Value::Array(items)) => Some(
                        items
                            .iter()
                            .filter_map(|item| item.as_str().map(str::to_string))
                            .collect(),
                    ),
                    _ => None,
                })
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Referral {
    pub id: i64,
    pub patient_name: String,
    pub insurance: String,
    pub status: ReferralStatus,
    pub raw_text: String,
    pub parsed_data: Option<StoredParse>,
    pub created_at: DateTime<Utc>,
}

/// A referral that has not been assigned an id yet.
#[derive(Debug, Clone)]
pub struct NewReferral {
    pub patient_name: String,
    pub insurance: String,
    pub status: ReferralStatus,
    pub raw_text: String,
    pub parsed_data: StoredParse,
}

/// Trait for storing and retrieving referrals.
///
/// Referrals are only ever inserted and have their status updated.
#[async_trait]
pub trait ReferralStore: Send + Sync {
    async fn create(&self, referral: NewReferral) -> Result<Referral>;
    /// Newest first.
    async fn list(&self) -> Result<Vec<Referral>>;
    async fn get(&self, id: i64) -> Result<Option<Referral>>;
    /// Returns false when no referral has this id.
    async fn update_status(&self, id: i64, status: ReferralStatus) -> Result<bool>;
    async fn count(&self) -> Result<usize>;
}

/// In-memory implementation of ReferralStore
pub struct InMemoryReferralStore {
    referrals: Arc<DashMap<i64, Referral>>,
    next_id: AtomicI64,
}

impl InMemoryReferralStore {
    pub fn new() -> Self {
        Self {
            referrals: Arc::new(DashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryReferralStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReferralStore for InMemoryReferralStore {
    async fn create(&self, referral: NewReferral) -> Result<Referral> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let saved = Referral {
            id,
            patient_name: referral.patient_name,
            insurance: referral.insurance,
            status: referral.status,
            raw_text: referral.raw_text,
            parsed_data: Some(referral.parsed_data),
            created_at: Utc::now(),
        };
        self.referrals.insert(id, saved.clone());
        Ok(saved)
    }

    async fn list(&self) -> Result<Vec<Referral>> {
        let mut referrals: Vec<Referral> = self
            .referrals
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        referrals.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(referrals)
    }

    async fn get(&self, id: i64) -> Result<Option<Referral>> {
        Ok(self.referrals.get(&id).map(|entry| entry.clone()))
    }

    async fn update_status(&self, id: i64, status: ReferralStatus) -> Result<bool> {
        Ok(match self.referrals.get_mut(&id) {
            Some(mut entry) => {
                entry.status = status;
                true
            }
            None => false,
        })
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.referrals.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor;
    use serde_json::json;

    fn new_referral(name: &str) -> NewReferral {
        NewReferral {
            patient_name: name.to_string(),
            insurance: "Medicare".to_string(),
            status: ReferralStatus::New,
            raw_text: format!("Patient: {}", name),
            parsed_data: StoredParse::Parsed(extractor::extract(&format!("Patient: {}", name))),
        }
    }

    #[tokio::test]
    async fn create_assigns_increasing_ids() {
        let store = InMemoryReferralStore::new();
        let first = store.create(new_referral("Ada Park")).await.unwrap();
        let second = store.create(new_referral("Ben Ortiz")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(store.get(2).await.unwrap().unwrap().patient_name, "Ben Ortiz");
        assert!(store.get(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_returns_newest_first() {
        let store = InMemoryReferralStore::new();
        for name in ["Ada Park", "Ben Ortiz", "Cy Young"] {
            store.create(new_referral(name)).await.unwrap();
        }

        let names: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|referral| referral.patient_name)
            .collect();
        assert_eq!(names, vec!["Cy Young", "Ben Ortiz", "Ada Park"]);
    }

    #[tokio::test]
    async fn update_status_touches_only_status() {
        let store = InMemoryReferralStore::new();
        let saved = store.create(new_referral("Ada Park")).await.unwrap();

        assert!(store.update_status(saved.id, ReferralStatus::Approved).await.unwrap());
        assert!(!store.update_status(42, ReferralStatus::Approved).await.unwrap());

        let updated = store.get(saved.id).await.unwrap().unwrap();
        assert_eq!(updated.status, ReferralStatus::Approved);
        assert_eq!(updated.raw_text, saved.raw_text);
        assert_eq!(updated.created_at, saved.created_at);
    }

    #[test]
    fn stored_parse_keeps_unrecognised_text() {
        assert_eq!(
            StoredParse::from_text("not json at all"),
            StoredParse::Opaque("not json at all".to_string())
        );

        let parsed = StoredParse::from_text(
            r#"{"extracted_data":{},"missing_info":["Physician NPI"],"next_steps":[]}"#,
        );
        assert!(matches!(parsed, StoredParse::Parsed(_)));
        assert_eq!(parsed.missing_info(), vec!["Physician NPI"]);
    }

    #[test]
    fn opaque_json_still_exposes_missing_info() {
        let stored = StoredParse::from_value(json!({"missing_info": ["insurance card"]}));
        assert!(matches!(stored, StoredParse::Opaque(_)));
        assert_eq!(stored.missing_info(), vec!["insurance card"]);
    }

    #[test]
    fn stored_parse_deserializes_from_any_json() {
        let stored: StoredParse = serde_json::from_value(json!({"foo": 1})).unwrap();
        assert_eq!(stored, StoredParse::Opaque(r#"{"foo":1}"#.to_string()));

        let stored: StoredParse = serde_json::from_value(json!([1, 2])).unwrap();
        assert!(matches!(stored, StoredParse::Opaque(_)));

        let stored: StoredParse = serde_json::from_value(json!("faxed, unreadable")).unwrap();
        assert_eq!(stored, StoredParse::Opaque("faxed, unreadable".to_string()));

        let stored: StoredParse = serde_json::from_value(
            json!({"extracted_data": {}, "missing_info": [], "next_steps": []}),
        )
        .unwrap();
        assert!(matches!(stored, StoredParse::Parsed(_)));
    }

    #[tokio::test]
    async fn referral_with_opaque_parse_round_trips_through_json() {
        let store = InMemoryReferralStore::new();
        let referral = store
            .create(NewReferral {
                patient_name: "Ada Park".to_string(),
                insurance: "Aetna".to_string(),
                status: ReferralStatus::New,
                raw_text: "Patient: Ada Park".to_string(),
                parsed_data: StoredParse::from_value(json!({"foo": 1})),
            })
            .await
            .unwrap();

        let text = serde_json::to_string(&referral).unwrap();
        let decoded: Referral = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded, referral);
    }

    #[test]
    fn parsed_text_round_trips() {
        let stored = StoredParse::Parsed(extractor::extract("Patient: Ada Park, aetna"));
        let text = stored.to_text().unwrap();
        assert_eq!(StoredParse::from_text(&text), stored);
    }
}
