use crate::models::SampleReferrals;

const CLEAN: &str = include_str!("../data/samples/clean.txt");
const MESSY: &str = include_str!("../data/samples/messy.txt");
const MISSING_INSURANCE: &str = include_str!("../data/samples/missing_insurance.txt");

/// Wound-care referral texts for trying the parser by hand.
pub fn sample_referrals() -> SampleReferrals {
    SampleReferrals {
        clean: CLEAN.trim_end().to_string(),
        messy: MESSY.trim_end().to_string(),
        missing_insurance: MISSING_INSURANCE.trim_end().to_string(),
    }
}
