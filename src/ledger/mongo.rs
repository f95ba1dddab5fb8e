//! MongoDB-backed ledger
//!
//! Balances live in one document per user; debits use a conditional
//! `$inc` guarded by `balance >= amount` so two concurrent debits can
//! never overdraw. Transactions are append-only.

use async_trait::async_trait;
use bson::doc;
use chrono::Utc;
use mongodb::Collection;
use serde::{Deserialize, Serialize};

use super::{Ledger, LedgerTransaction, TransactionKind, BALANCE_COLLECTION, TRANSACTION_COLLECTION};
use crate::db::MongoClient;
use crate::types::{CompetitionError, Result};

#[derive(Debug, Serialize, Deserialize)]
struct BalanceDoc {
    #[serde(rename = "_id")]
    user_id: String,
    balance: i64,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    updated_at: chrono::DateTime<Utc>,
}

/// Ledger over MongoDB collections
pub struct MongoLedger {
    balances: Collection<BalanceDoc>,
    transactions: Collection<LedgerTransaction>,
}

impl MongoLedger {
    pub fn new(client: &MongoClient) -> Self {
        Self {
            balances: client.collection(BALANCE_COLLECTION),
            transactions: client.collection(TRANSACTION_COLLECTION),
        }
    }
}

#[async_trait]
impl Ledger for MongoLedger {
    async fn balance(&self, user_id: &str) -> Result<i64> {
        let found = self.balances.find_one(doc! { "_id": user_id }).await?;
        Ok(found.map(|b| b.balance).unwrap_or(0))
    }

    async fn debit(&self, user_id: &str, amount: i64) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }

        let result = self
            .balances
            .update_one(
                doc! { "_id": user_id, "balance": { "$gte": amount } },
                doc! {
                    "$inc": { "balance": -amount },
                    "$set": { "updated_at": bson::DateTime::from_chrono(Utc::now()) },
                },
            )
            .await?;

        if result.matched_count == 0 {
            let available = self.balance(user_id).await?;
            return Err(CompetitionError::InsufficientFunds {
                required: amount,
                available,
            });
        }

        Ok(())
    }

    async fn credit(&self, user_id: &str, amount: i64) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }

        self.balances
            .update_one(
                doc! { "_id": user_id },
                doc! {
                    "$inc": { "balance": amount },
                    "$set": { "updated_at": bson::DateTime::from_chrono(Utc::now()) },
                },
            )
            .upsert(true)
            .await?;

        Ok(())
    }

    async fn record_transaction(&self, tx: &LedgerTransaction) -> Result<()> {
        self.transactions.insert_one(tx).await?;
        Ok(())
    }

    async fn find_prize_transaction(
        &self,
        competition_id: &str,
        entry_id: &str,
    ) -> Result<Option<LedgerTransaction>> {
        let kind = bson::to_bson(&TransactionKind::Prize)?;
        let found = self
            .transactions
            .find_one(doc! {
                "competition_id": competition_id,
                "related_id": entry_id,
                "kind": kind,
            })
            .await?;
        Ok(found)
    }
}
