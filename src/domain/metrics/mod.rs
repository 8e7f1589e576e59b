//! Metrics module - attention quality tiers.
//!
//! - `asv` - scan velocity per correlated pair
//! - `a2ar` - conversion rate over an aggregation window
//! - `aci` - composite of the two tiers

mod a2ar;
mod aci;
mod asv;

pub use a2ar::{A2arTier, AttentionToActionRate};
pub use aci::{AciLevel, AttentionCompositeIndex};
pub use asv::{AsvTier, ScanVelocity};

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn asv_tier_never_improves_as_delay_grows(a in 0.001f64..500.0, b in 0.001f64..500.0) {
            let (fast, slow) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(AsvTier::classify(fast) >= AsvTier::classify(slow));
        }

        #[test]
        fn a2ar_tier_never_drops_as_rate_grows(a in 0.0f64..10.0, b in 0.0f64..10.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(A2arTier::classify(lo) <= A2arTier::classify(hi));
        }

        #[test]
        fn aci_score_stays_in_range(conv in 0u64..200, opp in 0u64..5000, delta in -10.0f64..120.0) {
            let a2ar = AttentionToActionRate::compute(conv, opp);
            let asv = ScanVelocity::from_seconds(delta);
            let aci = AttentionCompositeIndex::compute(a2ar.tier, asv.tier);
            if asv.tier == AsvTier::NotApplicable {
                prop_assert_eq!(aci.score, 0);
            } else {
                prop_assert!((2..=10).contains(&aci.score));
                prop_assert!(aci.level != AciLevel::NotApplicable);
            }
        }
    }
}
