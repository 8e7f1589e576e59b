//! Attention-to-Action Rate: verified conversions per hundred pause opportunities.

use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum A2arTier {
    Low,
    Fair,
    Average,
    Strong,
    Exceptional,
}

impl A2arTier {
    /// Classifies a percentage. Lower bounds are inclusive.
    pub fn classify(rate_percent: f64) -> Self {
        if rate_percent.is_nan() || rate_percent < 0.5 {
            A2arTier::Low
        } else if rate_percent < 0.8 {
            A2arTier::Fair
        } else if rate_percent < 1.6 {
            A2arTier::Average
        } else if rate_percent < 2.6 {
            A2arTier::Strong
        } else {
            A2arTier::Exceptional
        }
    }

    pub fn value(&self) -> u8 {
        match self {
            A2arTier::Low => 1,
            A2arTier::Fair => 2,
            A2arTier::Average => 3,
            A2arTier::Strong => 4,
            A2arTier::Exceptional => 5,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            A2arTier::Low => "Low",
            A2arTier::Fair => "Fair",
            A2arTier::Average => "Average",
            A2arTier::Strong => "Strong",
            A2arTier::Exceptional => "Exceptional",
        }
    }
}

impl Serialize for A2arTier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.value())
    }
}

/// A computed attention-to-action rate over some aggregation window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttentionToActionRate {
    pub rate_percent: f64,
    pub tier: A2arTier,
    pub label: &'static str,
}

impl AttentionToActionRate {
    /// Computes the rate; zero opportunities yields 0%.
    pub fn compute(verified_conversions: u64, pause_opportunities: u64) -> Self {
        let rate_percent = if pause_opportunities == 0 {
            0.0
        } else {
            verified_conversions as f64 / pause_opportunities as f64 * 100.0
        };
        let tier = A2arTier::classify(rate_percent);
        Self {
            rate_percent,
            tier,
            label: tier.label(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_examples() {
        let low = AttentionToActionRate::compute(3, 1000);
        assert!((low.rate_percent - 0.3).abs() < 1e-9);
        assert_eq!(low.tier, A2arTier::Low);

        let strong = AttentionToActionRate::compute(20, 1000);
        assert!((strong.rate_percent - 2.0).abs() < 1e-9);
        assert_eq!(strong.tier, A2arTier::Strong);
    }

    #[test]
    fn zero_opportunities_is_zero_percent_low() {
        let rate = AttentionToActionRate::compute(5, 0);
        assert_eq!(rate.rate_percent, 0.0);
        assert_eq!(rate.tier, A2arTier::Low);
    }

    #[test]
    fn boundaries_are_lower_inclusive() {
        assert_eq!(A2arTier::classify(0.4999), A2arTier::Low);
        assert_eq!(A2arTier::classify(0.5), A2arTier::Fair);
        assert_eq!(A2arTier::classify(0.8), A2arTier::Average);
        assert_eq!(A2arTier::classify(1.6), A2arTier::Strong);
        assert_eq!(A2arTier::classify(2.6), A2arTier::Exceptional);
        assert_eq!(A2arTier::classify(250.0), A2arTier::Exceptional);
    }
}
