//! Attention Composite Index: combines the A2AR and ASV tiers.

use serde::{Serialize, Serializer};

use super::{A2arTier, AsvTier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AciLevel {
    NotApplicable,
    Low,
    Fair,
    Average,
    Strong,
    Exceptional,
}

impl AciLevel {
    /// Maps a tier sum (2..=10) to a level; anything else is N/A.
    pub fn from_sum(sum: u8) -> Self {
        match sum {
            9 | 10 => AciLevel::Exceptional,
            8 => AciLevel::Strong,
            6 | 7 => AciLevel::Average,
            4 | 5 => AciLevel::Fair,
            2 | 3 => AciLevel::Low,
            _ => AciLevel::NotApplicable,
        }
    }

    pub fn value(&self) -> u8 {
        match self {
            AciLevel::NotApplicable => 0,
            AciLevel::Low => 1,
            AciLevel::Fair => 2,
            AciLevel::Average => 3,
            AciLevel::Strong => 4,
            AciLevel::Exceptional => 5,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AciLevel::NotApplicable => "N/A",
            AciLevel::Low => "Low",
            AciLevel::Fair => "Fair",
            AciLevel::Average => "Average",
            AciLevel::Strong => "Strong",
            AciLevel::Exceptional => "Exceptional",
        }
    }
}

impl Serialize for AciLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.value())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttentionCompositeIndex {
    /// Raw tier sum; 0 when either input tier is N/A.
    pub score: u8,
    pub level: AciLevel,
    pub label: &'static str,
}

impl AttentionCompositeIndex {
    pub fn compute(a2ar: A2arTier, asv: AsvTier) -> Self {
        let score = if asv == AsvTier::NotApplicable {
            0
        } else {
            a2ar.value() + asv.value()
        };
        let level = AciLevel::from_sum(score);
        Self {
            score,
            level,
            label: level.label(),
        }
    }
}
