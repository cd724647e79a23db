use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, postgres::PgPoolOptions};
use tracing::info;

use crate::{
    error::Result,
    storage::{NewReferral, Referral, ReferralStore, StoredParse},
    triage::ReferralStatus,
};

const CREATE_REFERRALS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS referrals (
        id BIGSERIAL PRIMARY KEY,
        patient_name TEXT NOT NULL,
        insurance TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'new',
        raw_text TEXT NOT NULL,
        parsed_data TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
"#;

const SELECT_COLUMNS: &str =
    "SELECT id, patient_name, insurance, status, raw_text, parsed_data, created_at FROM referrals";

#[derive(FromRow)]
struct ReferralRow {
    id: i64,
    patient_name: String,
    insurance: String,
    status: String,
    raw_text: String,
    parsed_data: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReferralRow> for Referral {
    type Error = crate::error::IntakeError;

    fn try_from(row: ReferralRow) -> Result<Self> {
        Ok(Referral {
            id: row.id,
            patient_name: row.patient_name,
            insurance: row.insurance,
            status: row.status.parse()?,
            raw_text: row.raw_text,
            parsed_data: row.parsed_data.as_deref().map(StoredParse::from_text),
            created_at: row.created_at,
        })
    }
}

/// PostgreSQL-backed referral store.
pub struct PostgresReferralStore {
    pool: PgPool,
}

impl PostgresReferralStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: PgPool) -> Result<Self> {
        sqlx::query(CREATE_REFERRALS_TABLE).execute(&pool).await?;
        info!("Referral table ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl ReferralStore for PostgresReferralStore {
    async fn create(&self, referral: NewReferral) -> Result<Referral> {
        let parsed_data = referral.parsed_data.to_text()?;
        let row = sqlx::query_as::<_, ReferralRow>(
            "INSERT INTO referrals (patient_name, insurance, status, raw_text, parsed_data) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, patient_name, insurance, status, raw_text, parsed_data, created_at",
        )
        .bind(&referral.patient_name)
        .bind(&referral.insurance)
        .bind(referral.status.as_str())
        .bind(&referral.raw_text)
        .bind(parsed_data)
        .fetch_one(&self.pool)
        .await?;

        info!(referral_id = row.id, status = %referral.status, "Referral saved");
        Referral::try_from(row)
    }

    async fn list(&self) -> Result<Vec<Referral>> {
        let rows = sqlx::query_as::<_, ReferralRow>(&format!(
            "{SELECT_COLUMNS} ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Referral::try_from).collect()
    }

    async fn get(&self, id: i64) -> Result<Option<Referral>> {
        let row = sqlx::query_as::<_, ReferralRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Referral::try_from).transpose()
    }

    async fn update_status(&self, id: i64, status: ReferralStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE referrals SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM referrals")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor;

    /// Requires: TEST_DATABASE_URL pointing at a scratch PostgreSQL database
    #[tokio::test]
    async fn test_postgres_store_lifecycle() -> anyhow::Result<()> {
        let database_url = match std::env::var("TEST_DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                println!("Skipping test - set TEST_DATABASE_URL environment variable");
                return Ok(());
            }
        };

        let store = PostgresReferralStore::connect(&database_url).await?;
        let text = "Patient: Grace Hall\nDOB 5/5/45\nCigna member 77";
        let saved = store
            .create(NewReferral {
                patient_name: "Grace Hall".to_string(),
                insurance: "Cigna".to_string(),
                status: ReferralStatus::PendingDocs,
                raw_text: text.to_string(),
                parsed_data: StoredParse::Parsed(extractor::extract(text)),
            })
            .await?;

        let loaded = store.get(saved.id).await?.expect("referral should exist");
        assert_eq!(loaded.status, ReferralStatus::PendingDocs);
        assert_eq!(
            loaded.parsed_data,
            Some(StoredParse::Parsed(extractor::extract(text)))
        );

        assert!(store.update_status(saved.id, ReferralStatus::Scheduled).await?);
        assert_eq!(
            store.get(saved.id).await?.map(|r| r.status),
            Some(ReferralStatus::Scheduled)
        );
        assert!(store.list().await?.iter().any(|r| r.id == saved.id));

        Ok(())
    }
}
