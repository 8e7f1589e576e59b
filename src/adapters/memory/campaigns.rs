use async_trait::async_trait;

use super::InMemoryIngestStore;
use crate::domain::billing::CampaignTerms;
use crate::domain::foundation::{CampaignId, DomainError};
use crate::ports::CampaignDirectory;

#[async_trait]
impl CampaignDirectory for InMemoryIngestStore {
    async fn resolve(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<Option<CampaignTerms>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables.campaigns.get(campaign_id).cloned())
    }
}
