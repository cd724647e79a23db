use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IntakeError;

/// Workflow state of a persisted referral.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    #[default]
    New,
    PendingInsurance,
    PendingAuth,
    PendingDocs,
    Approved,
    Scheduled,
}

impl ReferralStatus {
    pub const ALL: [ReferralStatus; 6] = [
        ReferralStatus::New,
        ReferralStatus::PendingInsurance,
        ReferralStatus::PendingAuth,
        ReferralStatus::PendingDocs,
        ReferralStatus::Approved,
        ReferralStatus::Scheduled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReferralStatus::New => "new",
            ReferralStatus::PendingInsurance => "pending_insurance",
            ReferralStatus::PendingAuth => "pending_auth",
            ReferralStatus::PendingDocs => "pending_docs",
            ReferralStatus::Approved => "approved",
            ReferralStatus::Scheduled => "scheduled",
        }
    }
}

impl fmt::Display for ReferralStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferralStatus {
    type Err = IntakeError;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        let normalized = label.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| IntakeError::Validation(format!("unknown referral status: {}", label)))
    }
}

/// Substring rules over `missing_info`, first match wins.
struct StatusRule {
    needles: &'static [&'static str],
    status: ReferralStatus,
}

const STATUS_RULES: &[StatusRule] = &[
    StatusRule {
        needles: &["insurance"],
        status: ReferralStatus::PendingInsurance,
    },
    StatusRule {
        needles: &["auth", "cmn"],
        status: ReferralStatus::PendingAuth,
    },
];

/// Pick the workflow status implied by the missing-info list.
///
/// Falls back to `fallback` only when nothing is missing.
pub fn derive_status<S: AsRef<str>>(missing_info: &[S], fallback: ReferralStatus) -> ReferralStatus {
    let lowered: Vec<String> = missing_info
        .iter()
        .map(|entry| entry.as_ref().to_lowercase())
        .collect();

    let matched = STATUS_RULES.iter().find(|rule| {
        lowered
            .iter()
            .any(|entry| rule.needles.iter().any(|needle| entry.contains(needle)))
    });

    match matched {
        Some(rule) => rule.status,
        None if !lowered.is_empty() => ReferralStatus::PendingDocs,
        None => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insurance_wins_over_everything() {
        let missing = ["Signed CMN", "prior AUTH", "Insurance card copy"];
        assert_eq!(
            derive_status(&missing, ReferralStatus::New),
            ReferralStatus::PendingInsurance
        );
    }

    #[test]
    fn auth_and_cmn_map_to_pending_auth() {
        assert_eq!(
            derive_status(&["Prior authorization for CPAP"], ReferralStatus::New),
            ReferralStatus::PendingAuth
        );
        assert_eq!(
            derive_status(&["Signed Certificate of Medical Necessity (CMN)"], ReferralStatus::New),
            ReferralStatus::PendingAuth
        );
    }

    #[test]
    fn other_gaps_map_to_pending_docs() {
        assert_eq!(
            derive_status(&["review document for completeness"], ReferralStatus::New),
            ReferralStatus::PendingDocs
        );
    }

    #[test]
    fn empty_list_keeps_fallback() {
        let none: [&str; 0] = [];
        for status in ReferralStatus::ALL {
            assert_eq!(derive_status(&none, status), status);
        }
    }

    #[test]
    fn heuristic_gaps_without_anything_found() {
        let missing = [
            "patient name unclear",
            "date of birth needed",
            "insurance info missing",
            "policy/member ID needed",
        ];
        assert_eq!(
            derive_status(&missing, ReferralStatus::New),
            ReferralStatus::PendingInsurance
        );
    }

    #[test]
    fn status_labels_parse_case_insensitively() {
        assert_eq!("New".parse::<ReferralStatus>().unwrap(), ReferralStatus::New);
        assert_eq!(
            " PENDING_AUTH ".parse::<ReferralStatus>().unwrap(),
            ReferralStatus::PendingAuth
        );
        match "archived".parse::<ReferralStatus>() {
            Err(IntakeError::Validation(message)) => {
                assert_eq!(message, "unknown referral status: archived")
            }
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn display_matches_serde_label() {
        for status in ReferralStatus::ALL {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, status.to_string());
        }
    }
}
