//! CampaignDirectory port - resolves billing terms for a campaign id.

use async_trait::async_trait;

use crate::domain::billing::CampaignTerms;
use crate::domain::foundation::{CampaignId, DomainError};

#[async_trait]
pub trait CampaignDirectory: Send + Sync {
    /// Returns `None` for unknown or inactive campaigns.
    async fn resolve(&self, campaign_id: &CampaignId)
        -> Result<Option<CampaignTerms>, DomainError>;
}
