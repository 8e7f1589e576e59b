//! PostgreSQL implementation of ReceiptRepository.
//!
//! Both event kinds share `event_receipts`; kind-specific columns are null
//! for the other kind. `seq` orders impressions by storage time so the
//! canonical impression is simply the highest `seq` for an opportunity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::foundation::{
    CampaignId, DomainError, ErrorCode, EventId, OpportunityId, PublisherId, ReceiptId, Timestamp,
};
use crate::domain::ingest::{
    ConversionReceipt, EventReceipt, EventType, ImpressionReceipt, ReceiptFilter,
};
use crate::domain::metrics::ScanVelocity;
use crate::ports::{InsertOutcome, ReceiptRepository};

pub struct PostgresReceiptRepository {
    pool: PgPool,
}

impl PostgresReceiptRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_RECEIPT: &str = r#"
    SELECT id, event_id, event_type, publisher_id, opportunity_id, event_time, received_at,
           billing_status, payload, campaign_id, creative_id, program_id, qr_displayed_at,
           matched_conversion_id, conversion_result, matched_pause_id, asv_seconds
    FROM event_receipts
"#;

#[derive(Debug, sqlx::FromRow)]
struct ReceiptRow {
    id: Uuid,
    event_id: String,
    event_type: String,
    publisher_id: String,
    opportunity_id: String,
    event_time: DateTime<Utc>,
    received_at: DateTime<Utc>,
    billing_status: String,
    payload: serde_json::Value,
    campaign_id: Option<String>,
    creative_id: Option<String>,
    program_id: Option<String>,
    qr_displayed_at: Option<DateTime<Utc>>,
    matched_conversion_id: Option<Uuid>,
    conversion_result: Option<String>,
    matched_pause_id: Option<Uuid>,
    asv_seconds: Option<f64>,
}

fn corrupt(what: &str) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Invalid receipt row: {}", what),
    )
}

impl TryFrom<ReceiptRow> for EventReceipt {
    type Error = DomainError;

    fn try_from(row: ReceiptRow) -> Result<Self, Self::Error> {
        let event_type: EventType = row
            .event_type
            .parse()
            .map_err(|_| corrupt("unknown event_type"))?;

        let id = ReceiptId::from_uuid(row.id);
        let event_id = EventId::new(row.event_id)?;
        let publisher_id = PublisherId::new(row.publisher_id)?;
        let opportunity_id = OpportunityId::new(row.opportunity_id)?;
        let event_time = Timestamp::from_datetime(row.event_time);
        let received_at = Timestamp::from_datetime(row.received_at);
        let billing_status = row.billing_status.parse()?;

        Ok(match event_type {
            EventType::PauseImpression => EventReceipt::Impression(ImpressionReceipt {
                id,
                event_id,
                publisher_id,
                opportunity_id,
                event_time,
                received_at,
                campaign_id: CampaignId::new(
                    row.campaign_id.ok_or_else(|| corrupt("impression without campaign_id"))?,
                )?,
                creative_id: row.creative_id,
                program_id: row.program_id,
                qr_displayed_at: row.qr_displayed_at.map(Timestamp::from_datetime),
                matched_conversion_id: row.matched_conversion_id.map(ReceiptId::from_uuid),
                billing_status,
                payload: row.payload,
            }),
            EventType::QrConversion => EventReceipt::Conversion(ConversionReceipt {
                id,
                event_id,
                publisher_id,
                opportunity_id,
                event_time,
                received_at,
                result: row
                    .conversion_result
                    .as_deref()
                    .unwrap_or("success")
                    .parse()
                    .map_err(|_| corrupt("unknown conversion_result"))?,
                matched_pause_id: ReceiptId::from_uuid(
                    row.matched_pause_id
                        .ok_or_else(|| corrupt("conversion without matched_pause_id"))?,
                ),
                asv: ScanVelocity::from_seconds(row.asv_seconds.unwrap_or(0.0)),
                billing_status,
                payload: row.payload,
            }),
        })
    }
}

impl PostgresReceiptRepository {
    async fn fetch_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<EventReceipt>, DomainError> {
        let row: Option<ReceiptRow> =
            sqlx::query_as(&format!("{} WHERE event_id = $1", SELECT_RECEIPT))
                .bind(event_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DomainError::database("Failed to load receipt", e))?;

        row.map(EventReceipt::try_from).transpose()
    }

    async fn duplicate_of(&self, event_id: &EventId) -> Result<InsertOutcome, DomainError> {
        let existing = self.fetch_by_event_id(event_id.as_str()).await?.ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Receipt for event {} vanished after conflict", event_id),
            )
        })?;
        Ok(InsertOutcome::Duplicate(existing))
    }
}

async fn insert_conversion(
    tx: &mut Transaction<'_, Postgres>,
    receipt: &ConversionReceipt,
) -> Result<bool, DomainError> {
    let inserted: Option<Uuid> = sqlx::query_scalar(
        r#"
        INSERT INTO event_receipts (
            id, event_id, event_type, publisher_id, opportunity_id, event_time, received_at,
            billing_status, payload, conversion_result, matched_pause_id, asv_seconds, asv_tier
        ) VALUES ($1, $2, 'qr_conversion', $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (event_id) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(receipt.id.as_uuid())
    .bind(receipt.event_id.as_str())
    .bind(receipt.publisher_id.as_str())
    .bind(receipt.opportunity_id.as_str())
    .bind(receipt.event_time.as_datetime())
    .bind(receipt.received_at.as_datetime())
    .bind(receipt.billing_status.as_str())
    .bind(&receipt.payload)
    .bind(receipt.result.as_str())
    .bind(receipt.matched_pause_id.as_uuid())
    .bind(receipt.asv.seconds)
    .bind(receipt.asv.tier.value() as i16)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| DomainError::database("Failed to insert conversion receipt", e))?;

    Ok(inserted.is_some())
}

#[async_trait]
impl ReceiptRepository for PostgresReceiptRepository {
    async fn find_by_id(&self, id: &ReceiptId) -> Result<Option<EventReceipt>, DomainError> {
        let row: Option<ReceiptRow> = sqlx::query_as(&format!("{} WHERE id = $1", SELECT_RECEIPT))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to load receipt", e))?;

        row.map(EventReceipt::try_from).transpose()
    }

    async fn find_by_event_id(
        &self,
        event_id: &EventId,
    ) -> Result<Option<EventReceipt>, DomainError> {
        self.fetch_by_event_id(event_id.as_str()).await
    }

    async fn insert_impression(
        &self,
        receipt: &ImpressionReceipt,
    ) -> Result<InsertOutcome, DomainError> {
        let inserted: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO event_receipts (
                id, event_id, event_type, publisher_id, opportunity_id, event_time, received_at,
                billing_status, payload, campaign_id, creative_id, program_id, qr_displayed_at
            ) VALUES ($1, $2, 'pause_impression', $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (event_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(receipt.id.as_uuid())
        .bind(receipt.event_id.as_str())
        .bind(receipt.publisher_id.as_str())
        .bind(receipt.opportunity_id.as_str())
        .bind(receipt.event_time.as_datetime())
        .bind(receipt.received_at.as_datetime())
        .bind(receipt.billing_status.as_str())
        .bind(&receipt.payload)
        .bind(receipt.campaign_id.as_str())
        .bind(&receipt.creative_id)
        .bind(&receipt.program_id)
        .bind(receipt.qr_displayed_at.as_ref().map(|t| *t.as_datetime()))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to insert impression receipt", e))?;

        match inserted {
            Some(_) => Ok(InsertOutcome::Inserted),
            None => self.duplicate_of(&receipt.event_id).await,
        }
    }

    async fn find_canonical_impression(
        &self,
        publisher_id: &PublisherId,
        opportunity_id: &OpportunityId,
    ) -> Result<Option<ImpressionReceipt>, DomainError> {
        let row: Option<ReceiptRow> = sqlx::query_as(&format!(
            r#"{}
            WHERE publisher_id = $1 AND opportunity_id = $2 AND event_type = 'pause_impression'
            ORDER BY seq DESC
            LIMIT 1"#,
            SELECT_RECEIPT
        ))
        .bind(publisher_id.as_str())
        .bind(opportunity_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to look up impression", e))?;

        match row.map(EventReceipt::try_from).transpose()? {
            Some(EventReceipt::Impression(imp)) => Ok(Some(imp)),
            Some(EventReceipt::Conversion(_)) => Err(corrupt("conversion returned as impression")),
            None => Ok(None),
        }
    }

    async fn record_matched_conversion(
        &self,
        receipt: &ConversionReceipt,
    ) -> Result<InsertOutcome, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database("Failed to begin transaction", e))?;

        if !insert_conversion(&mut tx, receipt).await? {
            drop(tx);
            return self.duplicate_of(&receipt.event_id).await;
        }

        let linked = sqlx::query(
            r#"
            UPDATE event_receipts
            SET matched_conversion_id = $2
            WHERE id = $1 AND event_type = 'pause_impression'
            "#,
        )
        .bind(receipt.matched_pause_id.as_uuid())
        .bind(receipt.id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::database("Failed to link impression", e))?;

        if linked.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::ReceiptNotFound,
                format!("Impression {} not found", receipt.matched_pause_id),
            ));
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::database("Failed to commit conversion", e))?;

        Ok(InsertOutcome::Inserted)
    }

    async fn list(&self, filter: &ReceiptFilter) -> Result<Vec<EventReceipt>, DomainError> {
        let rows: Vec<ReceiptRow> = sqlx::query_as(&format!(
            r#"{}
            WHERE publisher_id = $1
              AND ($2::text IS NULL OR event_type = $2)
              AND ($3::timestamptz IS NULL OR event_time >= $3)
              AND ($4::timestamptz IS NULL OR event_time <= $4)
            ORDER BY event_time DESC, seq DESC
            LIMIT $5"#,
            SELECT_RECEIPT
        ))
        .bind(filter.publisher_id.as_str())
        .bind(filter.event_type.map(|t| t.as_str()))
        .bind(filter.from.as_ref().map(|t| *t.as_datetime()))
        .bind(filter.to.as_ref().map(|t| *t.as_datetime()))
        .bind(i64::from(filter.limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to list receipts", e))?;

        rows.into_iter().map(EventReceipt::try_from).collect()
    }
}
