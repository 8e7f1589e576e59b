//! In-memory adapters for tests and local development.
//!
//! One [`InMemoryIngestStore`] implements every persistence port over a
//! single lock-protected table set. Settlement holds the write lock for its
//! whole duration, which gives the same all-or-nothing behaviour as the
//! PostgreSQL transaction.

mod campaigns;
mod credentials;
mod ledger;
mod receipts;
mod rollups;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::billing::{BillingRecord, CampaignTerms, Wallet, WalletTransaction};
use crate::domain::foundation::{CampaignId, PublisherId, ReceiptId};
use crate::domain::ingest::EventReceipt;
use crate::domain::publisher::PublisherCredential;
use crate::domain::rollup::{AttentionRollup, RollupKey};

#[derive(Debug, Default)]
struct Tables {
    credentials: HashMap<PublisherId, PublisherCredential>,
    campaigns: HashMap<CampaignId, CampaignTerms>,
    /// Insertion order doubles as storage sequence.
    receipts: Vec<EventReceipt>,
    receipts_by_event: HashMap<String, usize>,
    wallets: Vec<Wallet>,
    transactions: Vec<WalletTransaction>,
    billing_records: Vec<BillingRecord>,
    rollups: HashMap<RollupKey, AttentionRollup>,
}

impl Tables {
    fn receipt_index(&self, id: &ReceiptId) -> Option<usize> {
        self.receipts.iter().position(|r| r.id() == *id)
    }
}

/// Shared in-memory store. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIngestStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryIngestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a publisher credential.
    pub async fn add_credential(&self, credential: PublisherCredential) {
        let mut tables = self.tables.write().await;
        tables
            .credentials
            .insert(credential.publisher_id.clone(), credential);
    }

    /// Registers or replaces campaign terms.
    pub async fn add_campaign(&self, terms: CampaignTerms) {
        let mut tables = self.tables.write().await;
        tables.campaigns.insert(terms.campaign_id.clone(), terms);
    }

    pub async fn receipt_count(&self) -> usize {
        self.tables.read().await.receipts.len()
    }

    pub async fn billing_record_count(&self) -> usize {
        self.tables.read().await.billing_records.len()
    }

    pub async fn transaction_count(&self) -> usize {
        self.tables.read().await.transactions.len()
    }
}
