//! Keyword-driven extraction used whenever the AI path is unavailable or fails.
//!
//! Every decision here is an ordered table of `(predicate, effect)` rules; the
//! first matching entry wins unless the table says otherwise. The output is a
//! pure function of the input text.

use tracing::debug;

use crate::models::{ExtractedRecord, ParseResult};

/// Line prefixes (lowercase) that mark the line carrying the patient name.
pub const PATIENT_NAME_MARKERS: &[&str] = &["patient:", "pt:", "name:"];

pub const NO_MISSING_INFO: &str = "review document for completeness";
pub const VERIFY_DELIVERY_ADDRESS: &str = "verify delivery address with patient";
pub const REQUEST_INSURANCE: &str = "call patient to get insurance details";

/// Keywords that identify a carrier, in priority order.
pub struct CarrierRule {
    pub keywords: &'static [&'static str],
    pub carrier: &'static str,
}

pub const CARRIER_RULES: &[CarrierRule] = &[
    CarrierRule {
        keywords: &["medicare"],
        carrier: "Medicare",
    },
    CarrierRule {
        keywords: &["medicaid"],
        carrier: "Medicaid",
    },
    CarrierRule {
        keywords: &["bcbs", "blue cross"],
        carrier: "Blue Cross Blue Shield",
    },
    CarrierRule {
        keywords: &["aetna"],
        carrier: "Aetna",
    },
    CarrierRule {
        keywords: &["united", "uhc"],
        carrier: "UnitedHealthcare",
    },
    CarrierRule {
        keywords: &["cigna"],
        carrier: "Cigna",
    },
];

/// Equipment-specific paperwork reminders. At most one applies.
pub struct EquipmentRule {
    pub keywords: &'static [&'static str],
    pub step: &'static str,
}

pub const EQUIPMENT_RULES: &[EquipmentRule] = &[
    EquipmentRule {
        keywords: &["cpap", "sleep"],
        step: "will need prior auth for CPAP - check payer requirements",
    },
    EquipmentRule {
        keywords: &["oxygen", "o2"],
        step: "oxygen requires CMN - check if included",
    },
    EquipmentRule {
        keywords: &["diabetic", "glucose"],
        step: "confirm diabetic supply coverage limits",
    },
];

/// What the scan found, shared by the missing-info rules.
pub struct Findings<'a> {
    pub lowered: &'a str,
    pub patient_name: Option<&'a str>,
    pub insurance: Option<&'static str>,
}

/// A blocking gap, reported when `is_missing` holds.
pub struct MissingInfoRule {
    pub is_missing: fn(&Findings<'_>) -> bool,
    pub message: &'static str,
}

pub const MISSING_INFO_RULES: &[MissingInfoRule] = &[
    MissingInfoRule {
        is_missing: |findings| findings.patient_name.is_none(),
        message: "patient name unclear",
    },
    MissingInfoRule {
        is_missing: |findings| !contains_any(findings.lowered, &["dob", "birth"]),
        message: "date of birth needed",
    },
    MissingInfoRule {
        is_missing: |findings| findings.insurance.is_none(),
        message: "insurance info missing",
    },
    MissingInfoRule {
        is_missing: |findings| !contains_any(findings.lowered, &["policy", "member", "id #"]),
        message: "policy/member ID needed",
    },
];

/// Best-effort extraction from raw referral text. Never fails.
pub fn extract(text: &str) -> ParseResult {
    let lowered = text.to_lowercase();
    let patient_name = find_patient_name(text);
    let insurance = detect_insurance(&lowered);

    let findings = Findings {
        lowered: &lowered,
        patient_name: patient_name.as_deref(),
        insurance,
    };
    let missing_info = missing_info(&findings);
    let next_steps = next_steps(&lowered, insurance);

    debug!(
        patient_found = patient_name.is_some(),
        insurance = insurance.unwrap_or("none"),
        missing = missing_info.len(),
        "Heuristic extraction complete"
    );

    let extracted_data = ExtractedRecord {
        patient_name,
        insurance: insurance.map(str::to_string),
        ..ExtractedRecord::default()
    };

    ParseResult::fallback(extracted_data, missing_info, next_steps)
}

/// First line carrying a patient marker, the field between its first and
/// second colon, title-cased.
pub fn find_patient_name(text: &str) -> Option<String> {
    let line = text.lines().find(|line| {
        let lowered = line.to_lowercase();
        PATIENT_NAME_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
    })?;

    let (_, rest) = line.split_once(':')?;
    let name = rest.split(':').next().unwrap_or_default().trim();
    if name.is_empty() {
        return None;
    }
    Some(title_case(name))
}

pub fn detect_insurance(lowered: &str) -> Option<&'static str> {
    CARRIER_RULES
        .iter()
        .find(|rule| contains_any(lowered, rule.keywords))
        .map(|rule| rule.carrier)
}

pub fn missing_info(findings: &Findings<'_>) -> Vec<String> {
    let missing: Vec<String> = MISSING_INFO_RULES
        .iter()
        .filter(|rule| (rule.is_missing)(findings))
        .map(|rule| rule.message.to_string())
        .collect();

    if missing.is_empty() {
        vec![NO_MISSING_INFO.to_string()]
    } else {
        missing
    }
}

pub fn next_steps(lowered: &str, insurance: Option<&str>) -> Vec<String> {
    let mut steps = vec![match insurance {
        Some(carrier) => format!("verify {} eligibility before proceeding", carrier),
        None => REQUEST_INSURANCE.to_string(),
    }];

    if let Some(rule) = EQUIPMENT_RULES
        .iter()
        .find(|rule| contains_any(lowered, rule.keywords))
    {
        steps.push(rule.step.to_string());
    }

    steps.push(VERIFY_DELIVERY_ADDRESS.to_string());
    steps
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Uppercase the first letter of every alphabetic run, lowercase the rest.
fn title_case(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut previous_alphabetic = false;
    for ch in input.chars() {
        if ch.is_alphabetic() {
            if previous_alphabetic {
                output.extend(ch.to_lowercase());
            } else {
                output.extend(ch.to_uppercase());
            }
            previous_alphabetic = true;
        } else {
            output.push(ch);
            previous_alphabetic = false;
        }
    }
    output
}
