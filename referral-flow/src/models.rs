use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::{IntakeError, Result};

/// Minimum number of non-whitespace-trimmed characters a referral must carry.
pub const MIN_REFERRAL_TEXT_LEN: usize = 10;

/// Placeholder used when no supplies could be identified.
pub const SUPPLIES_PLACEHOLDER: &str = "see original referral";

const REQUIRED_KEYS: [&str; 3] = ["extracted_data", "missing_info", "next_steps"];

/// Free-form referral text that passed the length check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReferral {
    text: String,
}

impl RawReferral {
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().chars().count() < MIN_REFERRAL_TEXT_LEN {
            return Err(IntakeError::Validation(format!(
                "Text must be at least {} characters",
                MIN_REFERRAL_TEXT_LEN
            )));
        }
        Ok(Self { text })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    #[default]
    Routine,
    Stat,
}

impl Urgency {
    /// Anything that is not recognisably urgent is routine.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "stat" | "urgent" | "emergent" => Urgency::Stat,
            _ => Urgency::Routine,
        }
    }
}

/// Canonical structured form of a referral.
///
/// Deserialization goes through [`serde_json::Value`] and coerces each field,
/// because AI-sourced payloads are only guaranteed to be JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct ExtractedRecord {
    pub patient_name: Option<String>,
    pub dob: Option<String>,
    pub insurance: Option<String>,
    pub policy_number: Option<String>,
    pub referring_physician: Option<String>,
    pub physician_npi: Option<String>,
    pub physician_contact: Option<String>,
    pub diagnosis: Option<String>,
    pub icd_codes: Option<Vec<String>>,
    pub hcpcs_codes: Option<Vec<String>>,
    pub supplies_requested: Vec<String>,
    pub clinical_notes: Option<String>,
    pub delivery_address: Option<String>,
    pub urgency: Urgency,
}

impl Default for ExtractedRecord {
    fn default() -> Self {
        Self {
            patient_name: None,
            dob: None,
            insurance: None,
            policy_number: None,
            referring_physician: None,
            physician_npi: None,
            physician_contact: None,
            diagnosis: None,
            icd_codes: None,
            hcpcs_codes: None,
            supplies_requested: vec![SUPPLIES_PLACEHOLDER.to_string()],
            clinical_notes: None,
            delivery_address: None,
            urgency: Urgency::Routine,
        }
    }
}

impl From<Value> for ExtractedRecord {
    fn from(value: Value) -> Self {
        let Value::Object(fields) = value else {
            return Self::default();
        };

        let supplies_requested = coerce_list(fields.get("supplies_requested"))
            .filter(|supplies| !supplies.is_empty())
            .unwrap_or_else(|| vec![SUPPLIES_PLACEHOLDER.to_string()]);

        let urgency = coerce_text(fields.get("urgency"))
            .map(|label| Urgency::from_label(&label))
            .unwrap_or_default();

        Self {
            patient_name: coerce_text(fields.get("patient_name")),
            dob: coerce_text(fields.get("dob")),
            insurance: coerce_text(fields.get("insurance")),
            policy_number: coerce_text(fields.get("policy_number")),
            referring_physician: coerce_text(fields.get("referring_physician")),
            physician_npi: coerce_text(fields.get("physician_npi")),
            physician_contact: coerce_text(fields.get("physician_contact")),
            diagnosis: coerce_text(fields.get("diagnosis")),
            icd_codes: coerce_list(fields.get("icd_codes")),
            hcpcs_codes: coerce_list(fields.get("hcpcs_codes")),
            supplies_requested,
            clinical_notes: coerce_text(fields.get("clinical_notes")),
            delivery_address: coerce_text(fields.get("delivery_address")),
            urgency,
        }
    }
}

/// Which extraction path produced a [`ParseResult`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionSource {
    #[default]
    Ai,
    Fallback,
}

impl ExtractionSource {
    fn from_label(label: &str) -> Option<Self> {
        match label {
            "ai" => Some(Self::Ai),
            "fallback" => Some(Self::Fallback),
            _ => None,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("{0}")]
pub struct ShapeError(pub String);

/// An extracted record plus the triage lists derived for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct ParseResult {
    pub extracted_data: ExtractedRecord,
    pub missing_info: Vec<String>,
    pub next_steps: Vec<String>,
    #[serde(rename = "_source")]
    pub source: ExtractionSource,
}

impl ParseResult {
    pub fn fallback(
        extracted_data: ExtractedRecord,
        missing_info: Vec<String>,
        next_steps: Vec<String>,
    ) -> Self {
        Self {
            extracted_data,
            missing_info,
            next_steps,
            source: ExtractionSource::Fallback,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == ExtractionSource::Fallback
    }
}

impl TryFrom<Value> for ParseResult {
    type Error = ShapeError;

    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        let Value::Object(mut fields) = value else {
            return Err(ShapeError("expected a JSON object".to_string()));
        };

        let absent = absent_keys(&fields);
        if !absent.is_empty() {
            return Err(ShapeError(format!(
                "missing top-level keys: {}",
                absent.join(", ")
            )));
        }

        let extracted_data = fields
            .remove("extracted_data")
            .map(ExtractedRecord::from)
            .unwrap_or_default();

        let source = fields
            .get("_source")
            .and_then(Value::as_str)
            .and_then(ExtractionSource::from_label)
            .unwrap_or_default();

        Ok(Self {
            extracted_data,
            missing_info: coerce_list(fields.get("missing_info")).unwrap_or_default(),
            next_steps: coerce_list(fields.get("next_steps")).unwrap_or_default(),
            source,
        })
    }
}

fn absent_keys(fields: &Map<String, Value>) -> Vec<&'static str> {
    REQUIRED_KEYS
        .iter()
        .copied()
        .filter(|key| !fields.contains_key(*key))
        .collect()
}

fn coerce_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn coerce_list(value: Option<&Value>) -> Option<Vec<String>> {
    match value? {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::Object(_) => Some(item.to_string()),
                    other => coerce_text(Some(other)),
                })
                .collect(),
        ),
        Value::Null => None,
        other => coerce_text(Some(other)).map(|single| vec![single]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn raw_referral_rejects_short_text() {
        assert!(matches!(
            RawReferral::new("   short   "),
            Err(IntakeError::Validation(_))
        ));
        assert!(RawReferral::new("Patient: Jane Doe").is_ok());
    }

    #[test]
    fn raw_referral_counts_characters_not_bytes() {
        // nine characters, eighteen bytes
        assert!(RawReferral::new("ééééééééé").is_err());
        assert!(RawReferral::new("éééééééééé").is_ok());
    }

    #[test]
    fn extracted_record_coerces_loose_types() {
        let record: ExtractedRecord = serde_json::from_value(json!({
            "patient_name": "  Jane Doe ",
            "physician_npi": 1234567890u64,
            "icd_codes": "L89.154",
            "hcpcs_codes": ["A6212", 42, null, ""],
            "supplies_requested": [],
            "urgency": "URGENT",
            "dob": {"month": 1}
        }))
        .unwrap();

        assert_eq!(record.patient_name.as_deref(), Some("Jane Doe"));
        assert_eq!(record.physician_npi.as_deref(), Some("1234567890"));
        assert_eq!(record.icd_codes, Some(vec!["L89.154".to_string()]));
        assert_eq!(
            record.hcpcs_codes,
            Some(vec!["A6212".to_string(), "42".to_string()])
        );
        assert_eq!(record.supplies_requested, vec![SUPPLIES_PLACEHOLDER]);
        assert_eq!(record.urgency, Urgency::Stat);
        assert_eq!(record.dob, None);
    }

    #[test]
    fn extracted_record_from_non_object_is_default() {
        let record = ExtractedRecord::from(json!("nothing useful"));
        assert_eq!(record, ExtractedRecord::default());
    }

    #[test]
    fn parse_result_requires_all_top_level_keys() {
        let err = ParseResult::try_from(json!({"extracted_data": {}, "missing_info": []}))
            .unwrap_err();
        assert!(err.0.contains("next_steps"));

        assert!(ParseResult::try_from(json!([1, 2, 3])).is_err());
    }

    #[test]
    fn parse_result_defaults_source_to_ai() {
        let parsed: ParseResult = serde_json::from_value(json!({
            "extracted_data": {"insurance": "Aetna PPO"},
            "missing_info": "Signed CMN",
            "next_steps": ["Verify eligibility"]
        }))
        .unwrap();

        assert_eq!(parsed.source, ExtractionSource::Ai);
        assert_eq!(parsed.missing_info, vec!["Signed CMN"]);
        assert_eq!(parsed.extracted_data.insurance.as_deref(), Some("Aetna PPO"));
    }

    #[test]
    fn fallback_source_survives_serialization() {
        let result = ParseResult::fallback(ExtractedRecord::default(), vec![], vec![]);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["_source"], "fallback");
        assert_eq!(value["extracted_data"]["urgency"], "routine");

        let back: ParseResult = serde_json::from_value(value).unwrap();
        assert!(back.is_fallback());
    }
}
