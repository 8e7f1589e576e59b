//! PostgreSQL implementation of RollupStore.
//!
//! Rows are keyed by an expression index that folds the nullable advertiser
//! and program columns, so `ON CONFLICT` can target it. Increments lock the
//! row, apply the delta in the domain type and write the full row back.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{AdvertiserId, DomainError, PublisherId, Timestamp};
use crate::domain::rollup::{AttentionRollup, RollupDelta, RollupKey, RollupQuery};
use crate::ports::RollupStore;

pub struct PostgresRollupStore {
    pool: PgPool,
}

impl PostgresRollupStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RollupRow {
    id: i64,
    rollup_date: NaiveDate,
    advertiser_id: Option<Uuid>,
    publisher_id: String,
    program_id: Option<String>,
    pause_opportunities: i64,
    scans: i64,
    verified_conversions: i64,
    asv_samples: i64,
    avg_asv_seconds: f64,
}

impl TryFrom<RollupRow> for AttentionRollup {
    type Error = DomainError;

    fn try_from(row: RollupRow) -> Result<Self, Self::Error> {
        Ok(AttentionRollup {
            key: RollupKey {
                date: row.rollup_date,
                advertiser_id: row.advertiser_id.map(AdvertiserId::from_uuid),
                publisher_id: PublisherId::new(row.publisher_id)?,
                program_id: row.program_id,
            },
            pause_opportunities: row.pause_opportunities.max(0) as u64,
            scans: row.scans.max(0) as u64,
            verified_conversions: row.verified_conversions.max(0) as u64,
            asv_samples: row.asv_samples.max(0) as u64,
            avg_asv_seconds: row.avg_asv_seconds,
        })
    }
}

const SELECT_ROLLUP: &str = r#"
    SELECT id, rollup_date, advertiser_id, publisher_id, program_id, pause_opportunities,
           scans, verified_conversions, asv_samples, avg_asv_seconds
    FROM attention_rollups
"#;

#[async_trait]
impl RollupStore for PostgresRollupStore {
    async fn record(
        &self,
        key: &RollupKey,
        delta: RollupDelta,
    ) -> Result<AttentionRollup, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database("Failed to begin transaction", e))?;

        let advertiser = key.advertiser_id.map(|a| *a.as_uuid());

        sqlx::query(
            r#"
            INSERT INTO attention_rollups (rollup_date, advertiser_id, publisher_id, program_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (
                rollup_date,
                COALESCE(advertiser_id, '00000000-0000-0000-0000-000000000000'::uuid),
                publisher_id,
                COALESCE(program_id, '')
            ) DO NOTHING
            "#,
        )
        .bind(key.date)
        .bind(advertiser)
        .bind(key.publisher_id.as_str())
        .bind(&key.program_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::database("Failed to create rollup", e))?;

        let row: RollupRow = sqlx::query_as(&format!(
            r#"{}
            WHERE rollup_date = $1
              AND advertiser_id IS NOT DISTINCT FROM $2
              AND publisher_id = $3
              AND program_id IS NOT DISTINCT FROM $4
            FOR UPDATE"#,
            SELECT_ROLLUP
        ))
        .bind(key.date)
        .bind(advertiser)
        .bind(key.publisher_id.as_str())
        .bind(&key.program_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DomainError::database("Failed to lock rollup", e))?;

        let row_id = row.id;
        let mut rollup = AttentionRollup::try_from(row)?;
        rollup.apply(delta);

        sqlx::query(
            r#"
            UPDATE attention_rollups SET
                pause_opportunities = $2,
                scans = $3,
                verified_conversions = $4,
                asv_samples = $5,
                avg_asv_seconds = $6,
                a2ar_tier = $7,
                asv_tier = $8,
                aci_level = $9,
                updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(row_id)
        .bind(rollup.pause_opportunities as i64)
        .bind(rollup.scans as i64)
        .bind(rollup.verified_conversions as i64)
        .bind(rollup.asv_samples as i64)
        .bind(rollup.avg_asv_seconds)
        .bind(rollup.a2ar().tier.value() as i16)
        .bind(rollup.asv_tier().value() as i16)
        .bind(rollup.aci().level.value() as i16)
        .bind(Timestamp::now().as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::database("Failed to update rollup", e))?;

        tx.commit()
            .await
            .map_err(|e| DomainError::database("Failed to commit rollup", e))?;

        Ok(rollup)
    }

    async fn query(&self, query: &RollupQuery) -> Result<Vec<AttentionRollup>, DomainError> {
        let rows: Vec<RollupRow> = sqlx::query_as(&format!(
            r#"{}
            WHERE publisher_id = $1
              AND rollup_date BETWEEN $2 AND $3
              AND ($4::text IS NULL OR program_id = $4)
            ORDER BY rollup_date"#,
            SELECT_ROLLUP
        ))
        .bind(query.publisher_id.as_str())
        .bind(query.from)
        .bind(query.to)
        .bind(&query.program_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to query rollups", e))?;

        rows.into_iter().map(AttentionRollup::try_from).collect()
    }
}
