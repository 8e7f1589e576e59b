//! Billing status state machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{StateMachine, ValidationError};

/// Billing state carried by every event receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingStatus {
    /// Recorded; no billing decision yet.
    Pending,

    /// Matched to billable campaign terms; a charge is in progress.
    Billable,

    /// Charged. Terminal.
    Billed,

    /// Will never be charged (failed scan or insufficient funds). Terminal.
    NonBillable,
}

impl BillingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingStatus::Pending => "pending",
            BillingStatus::Billable => "billable",
            BillingStatus::Billed => "billed",
            BillingStatus::NonBillable => "non_billable",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, BillingStatus::Pending)
    }
}

impl StateMachine for BillingStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use BillingStatus::*;
        matches!(
            (self, target),
            (Pending, Billable) | (Pending, NonBillable) | (Billable, Billed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use BillingStatus::*;
        match self {
            Pending => vec![Billable, NonBillable],
            Billable => vec![Billed],
            Billed | NonBillable => vec![],
        }
    }
}

impl fmt::Display for BillingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BillingStatus::Pending),
            "billable" => Ok(BillingStatus::Billable),
            "billed" => Ok(BillingStatus::Billed),
            "non_billable" => Ok(BillingStatus::NonBillable),
            other => Err(ValidationError::invalid_format(
                "billing_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}
