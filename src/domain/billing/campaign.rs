//! Campaign terms resolved from an impression's campaign id.

use serde::{Deserialize, Serialize};

use super::RevenueSplit;
use crate::domain::foundation::{AdvertiserId, CampaignId, Currency, Money, ValidationError};

/// Upper bound for a basis-point share.
pub const MAX_SHARE_BPS: u16 = 10_000;

/// What an advertiser pays per verified conversion and how it is split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignTerms {
    pub campaign_id: CampaignId,
    pub advertiser_id: AdvertiserId,
    pub fee: Money,
    /// Publisher share of the fee in basis points.
    pub publisher_share_bps: u16,
    pub currency: Currency,
}

impl CampaignTerms {
    pub fn new(
        campaign_id: CampaignId,
        advertiser_id: AdvertiserId,
        fee: Money,
        publisher_share_bps: u16,
        currency: Currency,
    ) -> Result<Self, ValidationError> {
        if fee.is_negative() {
            return Err(ValidationError::invalid_format("fee", "must not be negative"));
        }
        if publisher_share_bps > MAX_SHARE_BPS {
            return Err(ValidationError::invalid_format(
                "publisher_share_bps",
                format!("must be at most {}", MAX_SHARE_BPS),
            ));
        }
        Ok(Self {
            campaign_id,
            advertiser_id,
            fee,
            publisher_share_bps,
            currency,
        })
    }

    pub fn split(&self) -> RevenueSplit {
        RevenueSplit::compute(self.fee, self.publisher_share_bps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campaign() -> CampaignId {
        CampaignId::new("cmp-1").unwrap()
    }

    #[test]
    fn rejects_negative_fee() {
        let result = CampaignTerms::new(
            campaign(),
            AdvertiserId::new(),
            Money::from_minor(-1),
            5000,
            Currency::usd(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn rejects_share_over_whole() {
        let result = CampaignTerms::new(
            campaign(),
            AdvertiserId::new(),
            Money::from_minor(5),
            10_001,
            Currency::usd(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn split_uses_basis_points() {
        let terms = CampaignTerms::new(
            campaign(),
            AdvertiserId::new(),
            Money::from_minor(500),
            7000,
            Currency::usd(),
        )
        .unwrap();
        let split = terms.split();
        assert_eq!(split.publisher_share, Money::from_minor(350));
        assert_eq!(split.platform_cut, Money::from_minor(150));
    }
}
