//! Window summary over many rollup rows.

use chrono::NaiveDate;
use serde::Serialize;

use super::AttentionRollup;
use crate::domain::foundation::PublisherId;
use crate::domain::metrics::{
    AsvTier, AttentionCompositeIndex, AttentionToActionRate, ScanVelocity,
};

/// Rows selected for a summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollupQuery {
    pub publisher_id: PublisherId,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub program_id: Option<String>,
}

impl RollupQuery {
    pub fn matches(&self, rollup: &AttentionRollup) -> bool {
        rollup.key.publisher_id == self.publisher_id
            && rollup.key.date >= self.from
            && rollup.key.date <= self.to
            && self
                .program_id
                .as_ref()
                .map_or(true, |p| rollup.key.program_id.as_ref() == Some(p))
    }
}

/// Totals and tiers for a date window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttentionSummary {
    pub pause_opportunities: u64,
    pub scans: u64,
    pub verified_conversions: u64,
    pub a2ar: AttentionToActionRate,
    /// Sample-weighted average scan velocity.
    pub asv: Option<ScanVelocity>,
    pub aci: AttentionCompositeIndex,
}

impl AttentionSummary {
    pub fn from_rollups<'a>(rollups: impl IntoIterator<Item = &'a AttentionRollup>) -> Self {
        let mut opportunities = 0u64;
        let mut scans = 0u64;
        let mut verified = 0u64;
        let mut samples = 0u64;
        let mut asv_total = 0.0f64;

        for rollup in rollups {
            opportunities += rollup.pause_opportunities;
            scans += rollup.scans;
            verified += rollup.verified_conversions;
            samples += rollup.asv_samples;
            asv_total += rollup.avg_asv_seconds * rollup.asv_samples as f64;
        }

        let a2ar = AttentionToActionRate::compute(verified, opportunities);
        let asv = (samples > 0).then(|| ScanVelocity::from_seconds(asv_total / samples as f64));
        let aci = AttentionCompositeIndex::compute(
            a2ar.tier,
            asv.map_or(AsvTier::NotApplicable, |v| v.tier),
        );

        Self {
            pause_opportunities: opportunities,
            scans,
            verified_conversions: verified,
            a2ar,
            asv,
            aci,
        }
    }
}
