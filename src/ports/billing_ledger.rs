//! BillingLedger port - the only writer of wallet balances.
//!
//! # Atomicity
//!
//! `settle` performs, in one transaction:
//!
//! 1. lock the conversion receipt and stop if it is no longer `pending`
//! 2. resolve or open the advertiser wallet and lock it
//! 3. run [`decide_settlement`](crate::domain::billing::decide_settlement)
//! 4. write the balance, ledger line, billing record and receipt statuses
//!
//! A crash at any point leaves either all of step 4 or none of it.

use async_trait::async_trait;

use crate::domain::billing::{
    BillingRecord, Reconciliation, SettlementOutcome, SettlementRequest, Wallet,
    WalletTransaction,
};
use crate::domain::foundation::{
    AdvertiserId, Currency, DomainError, Money, ReceiptId, WalletId,
};

#[async_trait]
pub trait BillingLedger: Send + Sync {
    /// Charges one matched conversion at most once.
    ///
    /// # Errors
    ///
    /// - `ReceiptNotFound` if the conversion receipt does not exist
    /// - `DatabaseError` on persistence failure
    async fn settle(&self, request: &SettlementRequest) -> Result<SettlementOutcome, DomainError>;

    /// Adds funds, opening the wallet if needed.
    async fn credit(
        &self,
        advertiser_id: &AdvertiserId,
        currency: &Currency,
        amount: Money,
    ) -> Result<WalletTransaction, DomainError>;

    async fn find_wallet(
        &self,
        advertiser_id: &AdvertiserId,
        currency: &Currency,
    ) -> Result<Option<Wallet>, DomainError>;

    /// Ledger lines for a wallet, oldest first.
    async fn transactions(&self, wallet_id: &WalletId)
        -> Result<Vec<WalletTransaction>, DomainError>;

    async fn find_billing_record(
        &self,
        conversion_receipt_id: &ReceiptId,
    ) -> Result<Option<BillingRecord>, DomainError>;

    /// Compares the wallet balance with the sum of its ledger lines.
    ///
    /// # Errors
    ///
    /// - `WalletNotFound` if the wallet does not exist
    async fn reconcile(&self, wallet_id: &WalletId) -> Result<Reconciliation, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn billing_ledger_is_object_safe() {
        fn _accepts_dyn(_ledger: &dyn BillingLedger) {}
    }
}
