use referral_flow::{NewReferral, ReferralStatus, ReferralStore, Result, StoredParse};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

const SEED_REFERRALS: &str = include_str!("../data/seed_referrals.json");

#[derive(Deserialize)]
struct SeedReferral {
    patient_name: String,
    insurance: String,
    status: ReferralStatus,
    raw_text: String,
    parsed_data: Value,
}

/// Load the demo wound-care/DME referrals into an empty store.
///
/// Returns how many referrals were inserted.
pub async fn seed_if_empty(store: &dyn ReferralStore) -> Result<usize> {
    let existing = store.count().await?;
    if existing > 0 {
        info!(existing, "Referral store already populated, skipping seed");
        return Ok(0);
    }

    let seeds: Vec<SeedReferral> = serde_json::from_str(SEED_REFERRALS)?;
    let total = seeds.len();
    for seed in seeds {
        store
            .create(NewReferral {
                patient_name: seed.patient_name,
                insurance: seed.insurance,
                status: seed.status,
                raw_text: seed.raw_text,
                parsed_data: StoredParse::from_value(seed.parsed_data),
            })
            .await?;
    }

    info!(count = total, "Seeded demo referrals");
    Ok(total)
}
