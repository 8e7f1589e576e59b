//! Daily attention rollup per advertiser, publisher and program.

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::foundation::{AdvertiserId, PublisherId, Timestamp};
use crate::domain::metrics::{
    AsvTier, AttentionCompositeIndex, AttentionToActionRate, ScanVelocity,
};

/// Identifies one rollup row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RollupKey {
    pub date: NaiveDate,
    /// Absent when the campaign could not be resolved.
    pub advertiser_id: Option<AdvertiserId>,
    pub publisher_id: PublisherId,
    pub program_id: Option<String>,
}

impl RollupKey {
    pub fn for_event(
        event_time: Timestamp,
        advertiser_id: Option<AdvertiserId>,
        publisher_id: PublisherId,
        program_id: Option<String>,
    ) -> Self {
        Self {
            date: event_time.date(),
            advertiser_id,
            publisher_id,
            program_id,
        }
    }
}

/// One increment applied to a rollup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RollupDelta {
    Impression,
    /// A processed conversion. `asv_seconds` is only counted when positive.
    Conversion {
        asv_seconds: Option<f64>,
        verified: bool,
    },
    /// A conversion counted earlier as a scan was billed later.
    Verified,
}

impl RollupDelta {
    pub fn conversion(asv: &ScanVelocity, verified: bool) -> Self {
        RollupDelta::Conversion {
            asv_seconds: asv.is_measurable().then_some(asv.seconds),
            verified,
        }
    }
}

/// Running counters for one [`RollupKey`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttentionRollup {
    pub key: RollupKey,
    pub pause_opportunities: u64,
    pub scans: u64,
    pub verified_conversions: u64,
    /// Number of measurable scan velocities folded into the average.
    pub asv_samples: u64,
    pub avg_asv_seconds: f64,
}

impl AttentionRollup {
    pub fn empty(key: RollupKey) -> Self {
        Self {
            key,
            pause_opportunities: 0,
            scans: 0,
            verified_conversions: 0,
            asv_samples: 0,
            avg_asv_seconds: 0.0,
        }
    }

    pub fn apply(&mut self, delta: RollupDelta) {
        match delta {
            RollupDelta::Impression => self.pause_opportunities += 1,
            RollupDelta::Conversion {
                asv_seconds,
                verified,
            } => {
                self.scans += 1;
                if verified {
                    self.verified_conversions += 1;
                }
                if let Some(seconds) = asv_seconds.filter(|s| *s > 0.0) {
                    let total = self.avg_asv_seconds * self.asv_samples as f64 + seconds;
                    self.asv_samples += 1;
                    self.avg_asv_seconds = total / self.asv_samples as f64;
                }
            }
            RollupDelta::Verified => self.verified_conversions += 1,
        }
    }

    pub fn a2ar(&self) -> AttentionToActionRate {
        AttentionToActionRate::compute(self.verified_conversions, self.pause_opportunities)
    }

    /// Average scan velocity, if any measurable scan was recorded.
    pub fn asv(&self) -> Option<ScanVelocity> {
        (self.asv_samples > 0).then(|| ScanVelocity::from_seconds(self.avg_asv_seconds))
    }

    pub fn asv_tier(&self) -> AsvTier {
        self.asv().map_or(AsvTier::NotApplicable, |v| v.tier)
    }

    pub fn aci(&self) -> AttentionCompositeIndex {
        AttentionCompositeIndex::compute(self.a2ar().tier, self.asv_tier())
    }
}
