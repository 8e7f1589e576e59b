use async_trait::async_trait;

use super::{InMemoryIngestStore, Tables};
use crate::domain::billing::{
    decide_settlement, BillingRecord, BillingStatus, Reconciliation, SettlementOutcome,
    SettlementRequest, Wallet, WalletTransaction,
};
use crate::domain::foundation::{
    AdvertiserId, Currency, DomainError, ErrorCode, Money, ReceiptId, Timestamp, WalletId,
};
use crate::domain::ingest::EventReceipt;
use crate::ports::BillingLedger;

impl Tables {
    fn wallet_index(&mut self, advertiser_id: &AdvertiserId, currency: &Currency) -> usize {
        if let Some(i) = self
            .wallets
            .iter()
            .position(|w| &w.advertiser_id == advertiser_id && &w.currency == currency)
        {
            return i;
        }
        self.wallets
            .push(Wallet::open(*advertiser_id, currency.clone(), Timestamp::now()));
        self.wallets.len() - 1
    }

    fn set_status(&mut self, receipt_id: &ReceiptId, status: BillingStatus) {
        if let Some(i) = self.receipt_index(receipt_id) {
            match &mut self.receipts[i] {
                EventReceipt::Impression(r) => r.billing_status = status,
                EventReceipt::Conversion(r) => r.billing_status = status,
            }
        }
    }
}

#[async_trait]
impl BillingLedger for InMemoryIngestStore {
    async fn settle(&self, request: &SettlementRequest) -> Result<SettlementOutcome, DomainError> {
        let mut tables = self.tables.write().await;

        let (status, result) = tables
            .receipt_index(&request.conversion_receipt_id)
            .and_then(|i| match &tables.receipts[i] {
                EventReceipt::Conversion(c) => Some((c.billing_status, c.result)),
                EventReceipt::Impression(_) => None,
            })
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::ReceiptNotFound,
                    format!("Conversion {} not found", request.conversion_receipt_id),
                )
            })?;

        if !status.is_pending() {
            return Ok(SettlementOutcome::AlreadySettled(status));
        }

        let wallet_index =
            tables.wallet_index(&request.terms.advertiser_id, &request.terms.currency);
        // Work on a copy so a failed decision leaves the table untouched.
        let mut wallet = tables.wallets[wallet_index].clone();
        let outcome = decide_settlement(request, status, result, &mut wallet, Timestamp::now())?;

        match &outcome {
            SettlementOutcome::Billed {
                record,
                transaction,
            } => {
                tables.wallets[wallet_index] = wallet;
                if let Some(line) = transaction {
                    tables.transactions.push(line.clone());
                }
                tables.billing_records.push(record.clone());
                tables.set_status(&request.conversion_receipt_id, BillingStatus::Billed);
                tables.set_status(&request.impression_receipt_id, BillingStatus::Billed);
            }
            SettlementOutcome::NonBillable(_) => {
                tables.set_status(&request.conversion_receipt_id, BillingStatus::NonBillable);
            }
            SettlementOutcome::AlreadySettled(_) => {}
        }

        Ok(outcome)
    }

    async fn credit(
        &self,
        advertiser_id: &AdvertiserId,
        currency: &Currency,
        amount: Money,
    ) -> Result<WalletTransaction, DomainError> {
        let mut tables = self.tables.write().await;
        let index = tables.wallet_index(advertiser_id, currency);

        let line = tables.wallets[index].credit(amount, None, Timestamp::now())?;
        tables.transactions.push(line.clone());
        Ok(line)
    }

    async fn find_wallet(
        &self,
        advertiser_id: &AdvertiserId,
        currency: &Currency,
    ) -> Result<Option<Wallet>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables
            .wallets
            .iter()
            .find(|w| &w.advertiser_id == advertiser_id && &w.currency == currency)
            .cloned())
    }

    async fn transactions(
        &self,
        wallet_id: &WalletId,
    ) -> Result<Vec<WalletTransaction>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables
            .transactions
            .iter()
            .filter(|t| &t.wallet_id == wallet_id)
            .cloned()
            .collect())
    }

    async fn find_billing_record(
        &self,
        conversion_receipt_id: &ReceiptId,
    ) -> Result<Option<BillingRecord>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables
            .billing_records
            .iter()
            .find(|r| &r.conversion_receipt_id == conversion_receipt_id)
            .cloned())
    }

    async fn reconcile(&self, wallet_id: &WalletId) -> Result<Reconciliation, DomainError> {
        let tables = self.tables.read().await;
        let wallet = tables
            .wallets
            .iter()
            .find(|w| &w.id == wallet_id)
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::WalletNotFound,
                    format!("Wallet {} not found", wallet_id),
                )
            })?;
        let lines: Vec<WalletTransaction> = tables
            .transactions
            .iter()
            .filter(|t| &t.wallet_id == wallet_id)
            .cloned()
            .collect();

        Ok(Reconciliation::compute(wallet, &lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{CampaignTerms, NonBillableReason};
    use crate::domain::foundation::{CampaignId, EventId, OpportunityId, PublisherId};
    use crate::domain::ingest::{
        ConversionEvent, ConversionReceipt, ConversionResult, ImpressionEvent, ImpressionReceipt,
    };
    use crate::ports::ReceiptRepository;
    use serde_json::json;

    struct Fixture {
        store: InMemoryIngestStore,
        advertiser: AdvertiserId,
        request: SettlementRequest,
    }

    async fn matched_conversion(result: ConversionResult, fee: i64) -> Fixture {
        let store = InMemoryIngestStore::new();
        let publisher = PublisherId::new("pub_acme").unwrap();
        let advertiser = AdvertiserId::new();
        let now = Timestamp::now();

        let impression = ImpressionReceipt::record(
            publisher.clone(),
            ImpressionEvent {
                event_id: EventId::new("evt-imp").unwrap(),
                event_time: now,
                opportunity_id: OpportunityId::new("opp-1").unwrap(),
                campaign_id: CampaignId::new("cmp-1").unwrap(),
                creative_id: None,
                program_id: None,
                qr_displayed_at: None,
                payload: json!({}),
            },
            now,
        );
        store.insert_impression(&impression).await.unwrap();

        let conversion = ConversionReceipt::matched(
            publisher.clone(),
            ConversionEvent {
                event_id: EventId::new("evt-conv").unwrap(),
                event_time: now.plus_secs(7),
                opportunity_id: OpportunityId::new("opp-1").unwrap(),
                result,
                payload: json!({}),
            },
            &impression,
            now,
        );
        store.record_matched_conversion(&conversion).await.unwrap();

        let terms = CampaignTerms::new(
            CampaignId::new("cmp-1").unwrap(),
            advertiser,
            Money::from_minor(fee),
            7_000,
            Currency::usd(),
        )
        .unwrap();

        Fixture {
            store,
            advertiser,
            request: SettlementRequest {
                conversion_receipt_id: conversion.id,
                impression_receipt_id: impression.id,
                publisher_id: publisher,
                terms,
            },
        }
    }

    async fn status_of(store: &InMemoryIngestStore, event_id: &str) -> BillingStatus {
        store
            .find_by_event_id(&EventId::new(event_id).unwrap())
            .await
            .unwrap()
            .unwrap()
            .billing_status()
    }

    #[tokio::test]
    async fn settle_debits_wallet_and_marks_both_receipts_billed() {
        let fx = matched_conversion(ConversionResult::Success, 5).await;
        fx.store
            .credit(&fx.advertiser, &Currency::usd(), Money::from_minor(100))
            .await
            .unwrap();

        let outcome = fx.store.settle(&fx.request).await.unwrap();
        assert!(outcome.is_billed());

        let wallet = fx
            .store
            .find_wallet(&fx.advertiser, &Currency::usd())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(wallet.balance, Money::from_minor(95));

        let lines = fx.store.transactions(&wallet.id).await.unwrap();
        let debit = lines.last().unwrap();
        assert_eq!(debit.balance_before, Money::from_minor(100));
        assert_eq!(debit.balance_after, Money::from_minor(95));
        assert_eq!(debit.amount, Money::from_minor(-5));

        let record = fx
            .store
            .find_billing_record(&fx.request.conversion_receipt_id)
            .await
            .unwrap()
            .unwrap();
        assert!(record.split.is_balanced());
        assert_eq!(record.split.fee, Money::from_minor(5));

        assert_eq!(status_of(&fx.store, "evt-conv").await, BillingStatus::Billed);
        assert_eq!(status_of(&fx.store, "evt-imp").await, BillingStatus::Billed);
    }

    #[tokio::test]
    async fn insufficient_funds_leaves_wallet_untouched() {
        let fx = matched_conversion(ConversionResult::Success, 5).await;
        fx.store
            .credit(&fx.advertiser, &Currency::usd(), Money::from_minor(2))
            .await
            .unwrap();

        let outcome = fx.store.settle(&fx.request).await.unwrap();
        assert_eq!(
            outcome,
            SettlementOutcome::NonBillable(NonBillableReason::InsufficientFunds {
                balance: Money::from_minor(2),
                fee: Money::from_minor(5),
            })
        );

        let wallet = fx
            .store
            .find_wallet(&fx.advertiser, &Currency::usd())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(wallet.balance, Money::from_minor(2));
        assert_eq!(fx.store.transaction_count().await, 1);
        assert_eq!(fx.store.billing_record_count().await, 0);
        assert_eq!(
            status_of(&fx.store, "evt-conv").await,
            BillingStatus::NonBillable
        );
        assert_eq!(status_of(&fx.store, "evt-imp").await, BillingStatus::Pending);
    }

    #[tokio::test]
    async fn second_settlement_is_a_no_op() {
        let fx = matched_conversion(ConversionResult::Success, 5).await;
        fx.store
            .credit(&fx.advertiser, &Currency::usd(), Money::from_minor(100))
            .await
            .unwrap();

        fx.store.settle(&fx.request).await.unwrap();
        let again = fx.store.settle(&fx.request).await.unwrap();

        assert_eq!(
            again,
            SettlementOutcome::AlreadySettled(BillingStatus::Billed)
        );
        assert_eq!(fx.store.billing_record_count().await, 1);
        let wallet = fx
            .store
            .find_wallet(&fx.advertiser, &Currency::usd())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(wallet.balance, Money::from_minor(95));
    }

    #[tokio::test]
    async fn failed_scan_is_never_charged() {
        let fx = matched_conversion(ConversionResult::Failure, 5).await;
        fx.store
            .credit(&fx.advertiser, &Currency::usd(), Money::from_minor(100))
            .await
            .unwrap();

        let outcome = fx.store.settle(&fx.request).await.unwrap();
        assert!(!outcome.is_billed());
        assert_eq!(fx.store.billing_record_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_conversion_is_not_found() {
        let fx = matched_conversion(ConversionResult::Success, 5).await;
        let mut request = fx.request.clone();
        request.conversion_receipt_id = ReceiptId::new();

        let err = fx.store.settle(&request).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ReceiptNotFound);
    }

    #[tokio::test]
    async fn ledger_reconciles_after_mixed_activity() {
        let fx = matched_conversion(ConversionResult::Success, 5).await;
        fx.store
            .credit(&fx.advertiser, &Currency::usd(), Money::from_minor(40))
            .await
            .unwrap();
        fx.store
            .credit(&fx.advertiser, &Currency::usd(), Money::from_minor(60))
            .await
            .unwrap();
        fx.store.settle(&fx.request).await.unwrap();

        let wallet = fx
            .store
            .find_wallet(&fx.advertiser, &Currency::usd())
            .await
            .unwrap()
            .unwrap();
        let report = fx.store.reconcile(&wallet.id).await.unwrap();

        assert!(report.is_balanced());
        assert_eq!(report.ledger_sum, Money::from_minor(95));
        assert_eq!(report.line_count, 3);
    }

    #[tokio::test]
    async fn reconcile_unknown_wallet_fails() {
        let store = InMemoryIngestStore::new();
        let err = store.reconcile(&WalletId::new()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::WalletNotFound);
    }
}
