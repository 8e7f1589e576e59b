//! Billing records and the revenue split they carry.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    AdvertiserId, BillingRecordId, CampaignId, Currency, Money, PublisherId, ReceiptId, Timestamp,
    WalletId,
};

/// Division of a conversion fee between publisher and platform.
///
/// `publisher_share + platform_cut == fee` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueSplit {
    pub fee: Money,
    pub publisher_share: Money,
    pub platform_cut: Money,
}

impl RevenueSplit {
    /// Publisher share rounds down; the platform keeps the remainder.
    pub fn compute(fee: Money, publisher_share_bps: u16) -> Self {
        let publisher_share = fee.share_bps(publisher_share_bps);
        Self {
            fee,
            publisher_share,
            platform_cut: fee - publisher_share,
        }
    }

    pub fn is_balanced(&self) -> bool {
        self.publisher_share + self.platform_cut == self.fee
    }
}

/// One row per billed conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingRecord {
    pub id: BillingRecordId,
    pub conversion_receipt_id: ReceiptId,
    pub impression_receipt_id: ReceiptId,
    pub campaign_id: CampaignId,
    pub advertiser_id: AdvertiserId,
    pub publisher_id: PublisherId,
    pub wallet_id: WalletId,
    pub split: RevenueSplit,
    pub currency: Currency,
    pub created_at: Timestamp,
}
