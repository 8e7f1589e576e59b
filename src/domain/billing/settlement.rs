//! Settlement decision for one matched conversion.
//!
//! Ledger adapters lock the conversion row and the wallet, hand both to
//! [`decide_settlement`], then persist whatever the outcome describes within
//! the same transaction.

use serde::Serialize;

use super::{BillingRecord, BillingStatus, CampaignTerms, Wallet, WalletTransaction};
use crate::domain::foundation::{
    BillingRecordId, DomainError, ErrorCode, Money, PublisherId, ReceiptId, StateMachine,
    Timestamp,
};
use crate::domain::ingest::ConversionResult;

/// Everything needed to charge one conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementRequest {
    pub conversion_receipt_id: ReceiptId,
    pub impression_receipt_id: ReceiptId,
    pub publisher_id: PublisherId,
    pub terms: CampaignTerms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum NonBillableReason {
    InsufficientFunds { balance: Money, fee: Money },
    ConversionFailed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettlementOutcome {
    /// Charged. `transaction` is absent only for zero-fee campaigns.
    Billed {
        record: BillingRecord,
        transaction: Option<WalletTransaction>,
    },
    /// Recorded as never chargeable; no wallet mutation.
    NonBillable(NonBillableReason),
    /// The conversion already left `pending`; nothing was written.
    AlreadySettled(BillingStatus),
}

impl SettlementOutcome {
    /// Status the conversion ends in after this outcome is persisted.
    pub fn conversion_status(&self) -> BillingStatus {
        match self {
            SettlementOutcome::Billed { .. } => BillingStatus::Billed,
            SettlementOutcome::NonBillable(_) => BillingStatus::NonBillable,
            SettlementOutcome::AlreadySettled(status) => *status,
        }
    }

    pub fn is_billed(&self) -> bool {
        matches!(self, SettlementOutcome::Billed { .. })
    }
}

/// Decides and applies the charge to `wallet` in memory.
///
/// On `Billed` the wallet balance has already been reduced; the caller must
/// persist the new balance together with the ledger line and record.
pub fn decide_settlement(
    request: &SettlementRequest,
    conversion_status: BillingStatus,
    conversion_result: ConversionResult,
    wallet: &mut Wallet,
    now: Timestamp,
) -> Result<SettlementOutcome, DomainError> {
    if !conversion_status.is_pending() {
        return Ok(SettlementOutcome::AlreadySettled(conversion_status));
    }

    if !conversion_result.is_success() {
        conversion_status.transition_to(BillingStatus::NonBillable)?;
        return Ok(SettlementOutcome::NonBillable(
            NonBillableReason::ConversionFailed,
        ));
    }

    if wallet.currency != request.terms.currency {
        return Err(DomainError::new(
            ErrorCode::LedgerInvariantViolated,
            format!(
                "wallet currency {} does not match campaign currency {}",
                wallet.currency, request.terms.currency
            ),
        ));
    }

    let fee = request.terms.fee;
    if !wallet.can_afford(fee) {
        conversion_status.transition_to(BillingStatus::NonBillable)?;
        return Ok(SettlementOutcome::NonBillable(
            NonBillableReason::InsufficientFunds {
                balance: wallet.balance,
                fee,
            },
        ));
    }

    conversion_status
        .transition_to(BillingStatus::Billable)?
        .transition_to(BillingStatus::Billed)?;

    let transaction = if fee == Money::ZERO {
        None
    } else {
        Some(wallet.debit(fee, Some(request.conversion_receipt_id), now)?)
    };

    let record = BillingRecord {
        id: BillingRecordId::new(),
        conversion_receipt_id: request.conversion_receipt_id,
        impression_receipt_id: request.impression_receipt_id,
        campaign_id: request.terms.campaign_id.clone(),
        advertiser_id: request.terms.advertiser_id,
        publisher_id: request.publisher_id.clone(),
        wallet_id: wallet.id,
        split: request.terms.split(),
        currency: request.terms.currency.clone(),
        created_at: now,
    };

    Ok(SettlementOutcome::Billed {
        record,
        transaction,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{AdvertiserId, CampaignId, Currency};

    fn request(fee: i64) -> SettlementRequest {
        SettlementRequest {
            conversion_receipt_id: ReceiptId::new(),
            impression_receipt_id: ReceiptId::new(),
            publisher_id: PublisherId::new("pub_acme").unwrap(),
            terms: CampaignTerms::new(
                CampaignId::new("cmp-1").unwrap(),
                AdvertiserId::new(),
                Money::from_minor(fee),
                5000,
                Currency::usd(),
            )
            .unwrap(),
        }
    }

    fn wallet_with(balance: i64, advertiser: AdvertiserId) -> Wallet {
        let mut wallet = Wallet::open(advertiser, Currency::usd(), Timestamp::now());
        if balance > 0 {
            wallet
                .credit(Money::from_minor(balance), None, Timestamp::now())
                .unwrap();
        }
        wallet
    }

    #[test]
    fn funded_wallet_is_billed() {
        let req = request(5);
        let mut wallet = wallet_with(100, req.terms.advertiser_id);

        let outcome = decide_settlement(
            &req,
            BillingStatus::Pending,
            ConversionResult::Success,
            &mut wallet,
            Timestamp::now(),
        )
        .unwrap();

        assert_eq!(wallet.balance, Money::from_minor(95));
        match outcome {
            SettlementOutcome::Billed {
                record,
                transaction,
            } => {
                let line = transaction.unwrap();
                assert_eq!(line.balance_before, Money::from_minor(100));
                assert_eq!(line.balance_after, Money::from_minor(95));
                assert_eq!(line.amount, Money::from_minor(-5));
                assert_eq!(record.split.fee, Money::from_minor(5));
                assert!(record.split.is_balanced());
                assert_eq!(record.conversion_receipt_id, req.conversion_receipt_id);
                assert_eq!(record.wallet_id, wallet.id);
            }
            other => panic!("expected billed, got {:?}", other),
        }
    }

    #[test]
    fn short_wallet_is_non_billable_and_untouched() {
        let req = request(5);
        let mut wallet = wallet_with(2, req.terms.advertiser_id);

        let outcome = decide_settlement(
            &req,
            BillingStatus::Pending,
            ConversionResult::Success,
            &mut wallet,
            Timestamp::now(),
        )
        .unwrap();

        assert_eq!(
            outcome,
            SettlementOutcome::NonBillable(NonBillableReason::InsufficientFunds {
                balance: Money::from_minor(2),
                fee: Money::from_minor(5),
            })
        );
        assert_eq!(outcome.conversion_status(), BillingStatus::NonBillable);
        assert_eq!(wallet.balance, Money::from_minor(2));
    }

    #[test]
    fn settled_conversion_is_not_charged_twice() {
        let req = request(5);
        let mut wallet = wallet_with(100, req.terms.advertiser_id);

        let outcome = decide_settlement(
            &req,
            BillingStatus::Billed,
            ConversionResult::Success,
            &mut wallet,
            Timestamp::now(),
        )
        .unwrap();

        assert_eq!(outcome, SettlementOutcome::AlreadySettled(BillingStatus::Billed));
        assert_eq!(wallet.balance, Money::from_minor(100));
    }

    #[test]
    fn failed_scan_is_never_charged() {
        let req = request(5);
        let mut wallet = wallet_with(100, req.terms.advertiser_id);

        let outcome = decide_settlement(
            &req,
            BillingStatus::Pending,
            ConversionResult::Failure,
            &mut wallet,
            Timestamp::now(),
        )
        .unwrap();

        assert_eq!(
            outcome,
            SettlementOutcome::NonBillable(NonBillableReason::ConversionFailed)
        );
        assert_eq!(wallet.balance, Money::from_minor(100));
    }

    #[test]
    fn zero_fee_bills_without_ledger_line() {
        let req = request(0);
        let mut wallet = wallet_with(0, req.terms.advertiser_id);

        let outcome = decide_settlement(
            &req,
            BillingStatus::Pending,
            ConversionResult::Success,
            &mut wallet,
            Timestamp::now(),
        )
        .unwrap();

        assert!(matches!(
            outcome,
            SettlementOutcome::Billed {
                transaction: None,
                ..
            }
        ));
    }

    #[test]
    fn currency_mismatch_is_an_error() {
        let req = request(5);
        let mut wallet = Wallet::open(
            req.terms.advertiser_id,
            Currency::new("EUR").unwrap(),
            Timestamp::now(),
        );

        let err = decide_settlement(
            &req,
            BillingStatus::Pending,
            ConversionResult::Success,
            &mut wallet,
            Timestamp::now(),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::LedgerInvariantViolated);
    }
}
