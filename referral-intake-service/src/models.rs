use referral_flow::ParseResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize)]
pub struct ParseTextRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ParseResponse {
    pub success: bool,
    pub raw_text: String,
    pub parsed_data: ParseResult,
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveReferralRequest {
    pub patient_name: String,
    pub insurance: String,
    pub status: Option<String>,
    pub raw_text: String,
    /// Whatever the client holds; usually a previous parse result.
    pub parsed_data: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SampleReferrals {
    pub clean: String,
    pub messy: String,
    pub missing_insurance: String,
}
