//! Advertiser wallets and their append-only ledger.
//!
//! A wallet balance is never negative and is only changed through
//! [`Wallet::debit`] and [`Wallet::credit`], each of which yields the ledger
//! line that must be persisted alongside the new balance.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::foundation::{
    AdvertiserId, Currency, DomainError, ErrorCode, Money, ReceiptId, Timestamp, ValidationError,
    WalletId, WalletTransactionId,
};

/// Ledger mutation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: Money, required: Money },

    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(Money),

    #[error("Balance overflow")]
    Overflow,
}

impl From<LedgerError> for DomainError {
    fn from(err: LedgerError) -> Self {
        let code = match err {
            LedgerError::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
            LedgerError::NonPositiveAmount(_) => ErrorCode::ValidationFailed,
            LedgerError::Overflow => ErrorCode::LedgerInvariantViolated,
        };
        DomainError::new(code, err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Debit,
    Credit,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Debit => "debit",
            TransactionKind::Credit => "credit",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debit" => Ok(TransactionKind::Debit),
            "credit" => Ok(TransactionKind::Credit),
            other => Err(ValidationError::invalid_format(
                "kind",
                format!("unknown transaction kind '{}'", other),
            )),
        }
    }
}

/// One advertiser balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub advertiser_id: AdvertiserId,
    pub currency: Currency,
    pub balance: Money,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Wallet {
    /// Opens an empty wallet.
    pub fn open(advertiser_id: AdvertiserId, currency: Currency, now: Timestamp) -> Self {
        Self {
            id: WalletId::new(),
            advertiser_id,
            currency,
            balance: Money::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn can_afford(&self, amount: Money) -> bool {
        self.balance >= amount
    }

    /// Removes `amount`; the ledger line carries `-amount`.
    pub fn debit(
        &mut self,
        amount: Money,
        reference: Option<ReceiptId>,
        now: Timestamp,
    ) -> Result<WalletTransaction, LedgerError> {
        if amount.is_negative() || amount == Money::ZERO {
            return Err(LedgerError::NonPositiveAmount(amount));
        }
        if !self.can_afford(amount) {
            return Err(LedgerError::InsufficientFunds {
                balance: self.balance,
                required: amount,
            });
        }
        let after = self
            .balance
            .checked_add(-amount)
            .ok_or(LedgerError::Overflow)?;
        Ok(self.apply(TransactionKind::Debit, -amount, after, reference, now))
    }

    /// Adds `amount`; the ledger line carries `+amount`.
    pub fn credit(
        &mut self,
        amount: Money,
        reference: Option<ReceiptId>,
        now: Timestamp,
    ) -> Result<WalletTransaction, LedgerError> {
        if amount.is_negative() || amount == Money::ZERO {
            return Err(LedgerError::NonPositiveAmount(amount));
        }
        let after = self
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        Ok(self.apply(TransactionKind::Credit, amount, after, reference, now))
    }

    fn apply(
        &mut self,
        kind: TransactionKind,
        amount: Money,
        after: Money,
        reference: Option<ReceiptId>,
        now: Timestamp,
    ) -> WalletTransaction {
        let before = self.balance;
        self.balance = after;
        self.updated_at = now;
        WalletTransaction {
            id: WalletTransactionId::new(),
            wallet_id: self.id,
            kind,
            amount,
            balance_before: before,
            balance_after: self.balance,
            reference_receipt_id: reference,
            created_at: now,
        }
    }
}

/// Append-only ledger line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: WalletTransactionId,
    pub wallet_id: WalletId,
    pub kind: TransactionKind,
    /// Signed: negative for debits.
    pub amount: Money,
    pub balance_before: Money,
    pub balance_after: Money,
    pub reference_receipt_id: Option<ReceiptId>,
    pub created_at: Timestamp,
}

impl WalletTransaction {
    /// `after = before + amount`.
    pub fn is_consistent(&self) -> bool {
        self.balance_before + self.amount == self.balance_after
    }
}

/// Balance versus ledger comparison for one wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub wallet_id: WalletId,
    pub balance: Money,
    pub ledger_sum: Money,
    pub line_count: usize,
    /// Lines where `after != before + amount`.
    pub inconsistent_lines: Vec<WalletTransactionId>,
}

impl Reconciliation {
    pub fn compute(wallet: &Wallet, lines: &[WalletTransaction]) -> Self {
        Self {
            wallet_id: wallet.id,
            balance: wallet.balance,
            ledger_sum: lines.iter().map(|line| line.amount).sum(),
            line_count: lines.len(),
            inconsistent_lines: lines
                .iter()
                .filter(|line| !line.is_consistent())
                .map(|line| line.id)
                .collect(),
        }
    }

    pub fn is_balanced(&self) -> bool {
        self.balance == self.ledger_sum && self.inconsistent_lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn funded(amount: i64) -> (Wallet, Vec<WalletTransaction>) {
        let mut wallet = Wallet::open(AdvertiserId::new(), Currency::usd(), Timestamp::now());
        let line = wallet
            .credit(Money::from_minor(amount), None, Timestamp::now())
            .unwrap();
        (wallet, vec![line])
    }

    #[test]
    fn debit_writes_matching_ledger_line() {
        let (mut wallet, _) = funded(100);
        let receipt = ReceiptId::new();

        let line = wallet
            .debit(Money::from_minor(5), Some(receipt), Timestamp::now())
            .unwrap();

        assert_eq!(wallet.balance, Money::from_minor(95));
        assert_eq!(line.balance_before, Money::from_minor(100));
        assert_eq!(line.balance_after, Money::from_minor(95));
        assert_eq!(line.amount, Money::from_minor(-5));
        assert_eq!(line.kind, TransactionKind::Debit);
        assert_eq!(line.reference_receipt_id, Some(receipt));
        assert!(line.is_consistent());
    }

    #[test]
    fn debit_beyond_balance_leaves_wallet_unchanged() {
        let (mut wallet, _) = funded(2);
        let err = wallet
            .debit(Money::from_minor(5), None, Timestamp::now())
            .unwrap_err();

        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                balance: Money::from_minor(2),
                required: Money::from_minor(5),
            }
        );
        assert_eq!(wallet.balance, Money::from_minor(2));
    }

    #[test]
    fn exact_balance_can_be_spent() {
        let (mut wallet, _) = funded(5);
        wallet.debit(Money::from_minor(5), None, Timestamp::now()).unwrap();
        assert_eq!(wallet.balance, Money::ZERO);
    }

    #[test]
    fn zero_and_negative_amounts_rejected() {
        let (mut wallet, _) = funded(5);
        assert!(matches!(
            wallet.debit(Money::ZERO, None, Timestamp::now()),
            Err(LedgerError::NonPositiveAmount(_))
        ));
        assert!(matches!(
            wallet.credit(Money::from_minor(-3), None, Timestamp::now()),
            Err(LedgerError::NonPositiveAmount(_))
        ));
    }

    #[test]
    fn credit_overflow_leaves_wallet_unchanged() {
        let (mut wallet, _) = funded(i64::MAX - 1);

        let err = wallet
            .credit(Money::from_minor(2), None, Timestamp::now())
            .unwrap_err();

        assert_eq!(err, LedgerError::Overflow);
        assert_eq!(wallet.balance, Money::from_minor(i64::MAX - 1));
        assert!(wallet.credit(Money::from_minor(1), None, Timestamp::now()).is_ok());
    }

    #[test]
    fn reconciliation_balances_after_mixed_activity() {
        let (mut wallet, mut lines) = funded(100);
        lines.push(wallet.debit(Money::from_minor(5), None, Timestamp::now()).unwrap());
        lines.push(wallet.debit(Money::from_minor(7), None, Timestamp::now()).unwrap());
        lines.push(wallet.credit(Money::from_minor(20), None, Timestamp::now()).unwrap());

        let report = Reconciliation::compute(&wallet, &lines);
        assert_eq!(report.balance, Money::from_minor(108));
        assert_eq!(report.ledger_sum, Money::from_minor(108));
        assert_eq!(report.line_count, 4);
        assert!(report.is_balanced());
    }

    #[test]
    fn reconciliation_detects_drift() {
        let (mut wallet, lines) = funded(100);
        wallet.balance = Money::from_minor(90);
        assert!(!Reconciliation::compute(&wallet, &lines).is_balanced());
    }

    #[test]
    fn insufficient_funds_maps_to_domain_code() {
        let err: DomainError = LedgerError::InsufficientFunds {
            balance: Money::ZERO,
            required: Money::from_minor(1),
        }
        .into();
        assert_eq!(err.code, ErrorCode::InsufficientFunds);
    }
}
