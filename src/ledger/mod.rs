//! Token ledger collaborator
//!
//! Holds user token balances and an append-only transaction record.
//! The engine consumes this seam to debit entry fees and credit
//! prizes; `find_prize_transaction` is the idempotency probe that
//! makes a crashed prize distribution resumable without double
//! crediting.

mod memory;
mod mongo;

pub use memory::MemoryLedger;
pub use mongo::MongoLedger;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Result;

/// Collection name for user balances
pub const BALANCE_COLLECTION: &str = "user_balances";

/// Collection name for ledger transactions
pub const TRANSACTION_COLLECTION: &str = "ledger_transactions";

/// What a ledger transaction was for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    EntryFee,
    Prize,
    Refund,
}

/// Immutable record of one balance movement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerTransaction {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    /// Signed token amount: negative for debits, positive for credits
    pub amount: i64,
    pub kind: TransactionKind,
    /// Entity the movement relates to (an entry id for fees/prizes)
    pub related_id: Option<String>,
    pub competition_id: Option<String>,
    /// 1-based prize position, present on prize transactions
    pub position: Option<i32>,
    pub note: Option<String>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl LedgerTransaction {
    /// Entry-fee debit record
    pub fn entry_fee(
        user_id: &str,
        amount: i64,
        competition_id: &str,
        entry_id: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            amount: -amount,
            kind: TransactionKind::EntryFee,
            related_id: Some(entry_id.to_string()),
            competition_id: Some(competition_id.to_string()),
            position: None,
            note: Some("competition entry fee".to_string()),
            created_at: now,
        }
    }

    /// Prize credit record, tagged with competition/entry/position so
    /// a retry can identify winners that were already paid
    pub fn prize(
        user_id: &str,
        amount: i64,
        competition_id: &str,
        entry_id: &str,
        position: i32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            amount,
            kind: TransactionKind::Prize,
            related_id: Some(entry_id.to_string()),
            competition_id: Some(competition_id.to_string()),
            position: Some(position),
            note: Some(format!("competition prize, position {}", position)),
            created_at: now,
        }
    }

    /// Compensating credit after a failed entry creation
    pub fn refund(
        user_id: &str,
        amount: i64,
        competition_id: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            amount,
            kind: TransactionKind::Refund,
            related_id: None,
            competition_id: Some(competition_id.to_string()),
            position: None,
            note: Some("entry fee refund".to_string()),
            created_at: now,
        }
    }
}

/// Balance store with atomic movements
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Current balance, 0 for unknown users
    async fn balance(&self, user_id: &str) -> Result<i64>;

    /// Atomically subtract `amount` if the balance covers it; fails
    /// with `InsufficientFunds` otherwise, leaving the balance intact
    async fn debit(&self, user_id: &str, amount: i64) -> Result<()>;

    /// Atomically add `amount` to the balance
    async fn credit(&self, user_id: &str, amount: i64) -> Result<()>;

    /// Append an immutable transaction record
    async fn record_transaction(&self, tx: &LedgerTransaction) -> Result<()>;

    /// Look up an existing prize transaction for (competition, entry).
    /// Used to skip already-credited winners on retry.
    async fn find_prize_transaction(
        &self,
        competition_id: &str,
        entry_id: &str,
    ) -> Result<Option<LedgerTransaction>>;
}
