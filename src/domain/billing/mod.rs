//! Billing module - wallets, ledger lines and settlement.
//!
//! # Invariants
//!
//! - wallet balance is never negative
//! - every ledger line satisfies `after = before + amount`
//! - the sum of a wallet's ledger lines equals its balance
//! - a conversion is charged at most once

mod billing_record;
mod campaign;
mod settlement;
mod status;
mod wallet;

pub use billing_record::{BillingRecord, RevenueSplit};
pub use campaign::{CampaignTerms, MAX_SHARE_BPS};
pub use settlement::{decide_settlement, NonBillableReason, SettlementOutcome, SettlementRequest};
pub use status::BillingStatus;
pub use wallet::{LedgerError, Reconciliation, TransactionKind, Wallet, WalletTransaction};
