//! PostgreSQL implementation of CampaignDirectory.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::CampaignTerms;
use crate::domain::foundation::{
    AdvertiserId, CampaignId, Currency, DomainError, ErrorCode, Money,
};
use crate::ports::CampaignDirectory;

pub struct PostgresCampaignDirectory {
    pool: PgPool,
}

impl PostgresCampaignDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CampaignRow {
    campaign_id: String,
    advertiser_id: Uuid,
    fee_minor: i64,
    publisher_share_bps: i32,
    currency: String,
}

impl TryFrom<CampaignRow> for CampaignTerms {
    type Error = DomainError;

    fn try_from(row: CampaignRow) -> Result<Self, Self::Error> {
        let bps = u16::try_from(row.publisher_share_bps).map_err(|_| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid publisher_share_bps: {}", row.publisher_share_bps),
            )
        })?;

        Ok(CampaignTerms::new(
            CampaignId::new(row.campaign_id)?,
            AdvertiserId::from_uuid(row.advertiser_id),
            Money::from_minor(row.fee_minor),
            bps,
            Currency::new(row.currency.trim())?,
        )?)
    }
}

#[async_trait]
impl CampaignDirectory for PostgresCampaignDirectory {
    async fn resolve(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<Option<CampaignTerms>, DomainError> {
        let row: Option<CampaignRow> = sqlx::query_as(
            r#"
            SELECT campaign_id, advertiser_id, fee_minor, publisher_share_bps, currency
            FROM campaigns
            WHERE campaign_id = $1 AND active
            "#,
        )
        .bind(campaign_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to resolve campaign", e))?;

        row.map(CampaignTerms::try_from).transpose()
    }
}
