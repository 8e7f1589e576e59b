//! PostgreSQL implementation of BillingLedger.
//!
//! Settlement runs in one transaction holding row locks on the conversion
//! receipt and the wallet. Concurrent settlements of the same conversion
//! serialize on the receipt lock; the loser sees a non-pending status and
//! writes nothing. `billing_records.conversion_receipt_id` is unique as a
//! second guard.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::billing::{
    decide_settlement, BillingRecord, BillingStatus, Reconciliation, RevenueSplit,
    SettlementOutcome, SettlementRequest, Wallet, WalletTransaction,
};
use crate::domain::foundation::{
    AdvertiserId, BillingRecordId, CampaignId, Currency, DomainError, ErrorCode, Money,
    PublisherId, ReceiptId, Timestamp, WalletId, WalletTransactionId,
};
use crate::domain::ingest::ConversionResult;
use crate::ports::BillingLedger;

pub struct PostgresBillingLedger {
    pool: PgPool,
}

impl PostgresBillingLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WalletRow {
    id: Uuid,
    advertiser_id: Uuid,
    currency: String,
    balance_minor: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WalletRow> for Wallet {
    type Error = DomainError;

    fn try_from(row: WalletRow) -> Result<Self, Self::Error> {
        Ok(Wallet {
            id: WalletId::from_uuid(row.id),
            advertiser_id: AdvertiserId::from_uuid(row.advertiser_id),
            currency: Currency::new(row.currency.trim())?,
            balance: Money::from_minor(row.balance_minor),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    wallet_id: Uuid,
    kind: String,
    amount_minor: i64,
    balance_before_minor: i64,
    balance_after_minor: i64,
    reference_receipt_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for WalletTransaction {
    type Error = DomainError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(WalletTransaction {
            id: WalletTransactionId::from_uuid(row.id),
            wallet_id: WalletId::from_uuid(row.wallet_id),
            kind: row.kind.parse()?,
            amount: Money::from_minor(row.amount_minor),
            balance_before: Money::from_minor(row.balance_before_minor),
            balance_after: Money::from_minor(row.balance_after_minor),
            reference_receipt_id: row.reference_receipt_id.map(ReceiptId::from_uuid),
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BillingRecordRow {
    id: Uuid,
    conversion_receipt_id: Uuid,
    impression_receipt_id: Uuid,
    campaign_id: String,
    advertiser_id: Uuid,
    publisher_id: String,
    wallet_id: Uuid,
    fee_minor: i64,
    publisher_share_minor: i64,
    platform_cut_minor: i64,
    currency: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<BillingRecordRow> for BillingRecord {
    type Error = DomainError;

    fn try_from(row: BillingRecordRow) -> Result<Self, Self::Error> {
        Ok(BillingRecord {
            id: BillingRecordId::from_uuid(row.id),
            conversion_receipt_id: ReceiptId::from_uuid(row.conversion_receipt_id),
            impression_receipt_id: ReceiptId::from_uuid(row.impression_receipt_id),
            campaign_id: CampaignId::new(row.campaign_id)?,
            advertiser_id: AdvertiserId::from_uuid(row.advertiser_id),
            publisher_id: PublisherId::new(row.publisher_id)?,
            wallet_id: WalletId::from_uuid(row.wallet_id),
            split: RevenueSplit {
                fee: Money::from_minor(row.fee_minor),
                publisher_share: Money::from_minor(row.publisher_share_minor),
                platform_cut: Money::from_minor(row.platform_cut_minor),
            },
            currency: Currency::new(row.currency.trim())?,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ConversionLockRow {
    billing_status: String,
    conversion_result: Option<String>,
}

const SELECT_WALLET: &str = r#"
    SELECT id, advertiser_id, currency, balance_minor, created_at, updated_at
    FROM wallets
"#;

/// Opens the wallet if absent, then locks and loads it.
async fn lock_wallet(
    tx: &mut Transaction<'_, Postgres>,
    advertiser_id: &AdvertiserId,
    currency: &Currency,
) -> Result<Wallet, DomainError> {
    let fresh = Wallet::open(*advertiser_id, currency.clone(), Timestamp::now());

    sqlx::query(
        r#"
        INSERT INTO wallets (id, advertiser_id, currency, balance_minor, created_at, updated_at)
        VALUES ($1, $2, $3, 0, $4, $4)
        ON CONFLICT (advertiser_id, currency) DO NOTHING
        "#,
    )
    .bind(fresh.id.as_uuid())
    .bind(advertiser_id.as_uuid())
    .bind(currency.as_str())
    .bind(fresh.created_at.as_datetime())
    .execute(&mut **tx)
    .await
    .map_err(|e| DomainError::database("Failed to open wallet", e))?;

    let row: WalletRow = sqlx::query_as(&format!(
        "{} WHERE advertiser_id = $1 AND currency = $2 FOR UPDATE",
        SELECT_WALLET
    ))
    .bind(advertiser_id.as_uuid())
    .bind(currency.as_str())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| DomainError::database("Failed to lock wallet", e))?;

    Wallet::try_from(row)
}

async fn write_ledger_line(
    tx: &mut Transaction<'_, Postgres>,
    wallet: &Wallet,
    line: &WalletTransaction,
) -> Result<(), DomainError> {
    sqlx::query("UPDATE wallets SET balance_minor = $2, updated_at = $3 WHERE id = $1")
        .bind(wallet.id.as_uuid())
        .bind(wallet.balance.minor())
        .bind(wallet.updated_at.as_datetime())
        .execute(&mut **tx)
        .await
        .map_err(|e| DomainError::database("Failed to update wallet balance", e))?;

    sqlx::query(
        r#"
        INSERT INTO wallet_transactions (
            id, wallet_id, kind, amount_minor, balance_before_minor, balance_after_minor,
            reference_receipt_id, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(line.id.as_uuid())
    .bind(line.wallet_id.as_uuid())
    .bind(line.kind.as_str())
    .bind(line.amount.minor())
    .bind(line.balance_before.minor())
    .bind(line.balance_after.minor())
    .bind(line.reference_receipt_id.map(|id| *id.as_uuid()))
    .bind(line.created_at.as_datetime())
    .execute(&mut **tx)
    .await
    .map_err(|e| DomainError::database("Failed to append ledger line", e))?;

    Ok(())
}

async fn set_status(
    tx: &mut Transaction<'_, Postgres>,
    receipt_id: &ReceiptId,
    status: BillingStatus,
) -> Result<(), DomainError> {
    sqlx::query("UPDATE event_receipts SET billing_status = $2 WHERE id = $1")
        .bind(receipt_id.as_uuid())
        .bind(status.as_str())
        .execute(&mut **tx)
        .await
        .map_err(|e| DomainError::database("Failed to update billing status", e))?;
    Ok(())
}

#[async_trait]
impl BillingLedger for PostgresBillingLedger {
    async fn settle(&self, request: &SettlementRequest) -> Result<SettlementOutcome, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database("Failed to begin transaction", e))?;

        let locked: Option<ConversionLockRow> = sqlx::query_as(
            r#"
            SELECT billing_status, conversion_result
            FROM event_receipts
            WHERE id = $1 AND event_type = 'qr_conversion'
            FOR UPDATE
            "#,
        )
        .bind(request.conversion_receipt_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| DomainError::database("Failed to lock conversion", e))?;

        let locked = locked.ok_or_else(|| {
            DomainError::new(
                ErrorCode::ReceiptNotFound,
                format!("Conversion {} not found", request.conversion_receipt_id),
            )
        })?;

        let status: BillingStatus = locked.billing_status.parse()?;
        if !status.is_pending() {
            return Ok(SettlementOutcome::AlreadySettled(status));
        }
        let result = match locked.conversion_result.as_deref() {
            Some("failure") => ConversionResult::Failure,
            _ => ConversionResult::Success,
        };

        let mut wallet =
            lock_wallet(&mut tx, &request.terms.advertiser_id, &request.terms.currency).await?;
        let now = Timestamp::now();
        let outcome = decide_settlement(request, status, result, &mut wallet, now)?;

        match &outcome {
            SettlementOutcome::Billed {
                record,
                transaction,
            } => {
                if let Some(line) = transaction {
                    write_ledger_line(&mut tx, &wallet, line).await?;
                }

                sqlx::query(
                    r#"
                    INSERT INTO billing_records (
                        id, conversion_receipt_id, impression_receipt_id, campaign_id,
                        advertiser_id, publisher_id, wallet_id, fee_minor,
                        publisher_share_minor, platform_cut_minor, currency, created_at
                    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                    "#,
                )
                .bind(record.id.as_uuid())
                .bind(record.conversion_receipt_id.as_uuid())
                .bind(record.impression_receipt_id.as_uuid())
                .bind(record.campaign_id.as_str())
                .bind(record.advertiser_id.as_uuid())
                .bind(record.publisher_id.as_str())
                .bind(record.wallet_id.as_uuid())
                .bind(record.split.fee.minor())
                .bind(record.split.publisher_share.minor())
                .bind(record.split.platform_cut.minor())
                .bind(record.currency.as_str())
                .bind(record.created_at.as_datetime())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::database("Failed to insert billing record", e))?;

                set_status(&mut tx, &request.conversion_receipt_id, BillingStatus::Billed).await?;
                set_status(&mut tx, &request.impression_receipt_id, BillingStatus::Billed).await?;
            }
            SettlementOutcome::NonBillable(_) => {
                set_status(
                    &mut tx,
                    &request.conversion_receipt_id,
                    BillingStatus::NonBillable,
                )
                .await?;
            }
            SettlementOutcome::AlreadySettled(_) => {}
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::database("Failed to commit settlement", e))?;

        Ok(outcome)
    }

    async fn credit(
        &self,
        advertiser_id: &AdvertiserId,
        currency: &Currency,
        amount: Money,
    ) -> Result<WalletTransaction, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database("Failed to begin transaction", e))?;

        let mut wallet = lock_wallet(&mut tx, advertiser_id, currency).await?;
        let line = wallet.credit(amount, None, Timestamp::now())?;
        write_ledger_line(&mut tx, &wallet, &line).await?;

        tx.commit()
            .await
            .map_err(|e| DomainError::database("Failed to commit credit", e))?;

        Ok(line)
    }

    async fn find_wallet(
        &self,
        advertiser_id: &AdvertiserId,
        currency: &Currency,
    ) -> Result<Option<Wallet>, DomainError> {
        let row: Option<WalletRow> = sqlx::query_as(&format!(
            "{} WHERE advertiser_id = $1 AND currency = $2",
            SELECT_WALLET
        ))
        .bind(advertiser_id.as_uuid())
        .bind(currency.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to load wallet", e))?;

        row.map(Wallet::try_from).transpose()
    }

    async fn transactions(
        &self,
        wallet_id: &WalletId,
    ) -> Result<Vec<WalletTransaction>, DomainError> {
        let rows: Vec<TransactionRow> = sqlx::query_as(
            r#"
            SELECT id, wallet_id, kind, amount_minor, balance_before_minor, balance_after_minor,
                   reference_receipt_id, created_at
            FROM wallet_transactions
            WHERE wallet_id = $1
            ORDER BY seq
            "#,
        )
        .bind(wallet_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to load ledger lines", e))?;

        rows.into_iter().map(WalletTransaction::try_from).collect()
    }

    async fn find_billing_record(
        &self,
        conversion_receipt_id: &ReceiptId,
    ) -> Result<Option<BillingRecord>, DomainError> {
        let row: Option<BillingRecordRow> = sqlx::query_as(
            r#"
            SELECT id, conversion_receipt_id, impression_receipt_id, campaign_id, advertiser_id,
                   publisher_id, wallet_id, fee_minor, publisher_share_minor, platform_cut_minor,
                   currency, created_at
            FROM billing_records
            WHERE conversion_receipt_id = $1
            "#,
        )
        .bind(conversion_receipt_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to load billing record", e))?;

        row.map(BillingRecord::try_from).transpose()
    }

    async fn reconcile(&self, wallet_id: &WalletId) -> Result<Reconciliation, DomainError> {
        let row: Option<WalletRow> = sqlx::query_as(&format!("{} WHERE id = $1", SELECT_WALLET))
            .bind(wallet_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to load wallet", e))?;

        let wallet = row.map(Wallet::try_from).transpose()?.ok_or_else(|| {
            DomainError::new(
                ErrorCode::WalletNotFound,
                format!("Wallet {} not found", wallet_id),
            )
        })?;
        let lines = self.transactions(wallet_id).await?;

        Ok(Reconciliation::compute(&wallet, &lines))
    }
}
