//! In-memory ledger
//!
//! Backs unit tests and dev mode when MongoDB is unreachable. All
//! state sits behind one mutex so the debit guard has the same
//! atomicity as the conditional update in the MongoDB implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Ledger, LedgerTransaction, TransactionKind};
use crate::types::{CompetitionError, Result};

#[derive(Default)]
struct Inner {
    balances: HashMap<String, i64>,
    transactions: Vec<LedgerTransaction>,
}

/// Ledger over process memory
#[derive(Default)]
pub struct MemoryLedger {
    inner: Mutex<Inner>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user balance (test/dev helper)
    pub async fn deposit(&self, user_id: &str, amount: i64) {
        let mut inner = self.inner.lock().await;
        *inner.balances.entry(user_id.to_string()).or_insert(0) += amount;
    }

    /// All recorded transactions (test helper)
    pub async fn transactions(&self) -> Vec<LedgerTransaction> {
        self.inner.lock().await.transactions.clone()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn balance(&self, user_id: &str) -> Result<i64> {
        let inner = self.inner.lock().await;
        Ok(inner.balances.get(user_id).copied().unwrap_or(0))
    }

    async fn debit(&self, user_id: &str, amount: i64) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }

        let mut inner = self.inner.lock().await;
        let balance = inner.balances.entry(user_id.to_string()).or_insert(0);
        if *balance < amount {
            return Err(CompetitionError::InsufficientFunds {
                required: amount,
                available: *balance,
            });
        }
        *balance -= amount;
        Ok(())
    }

    async fn credit(&self, user_id: &str, amount: i64) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }

        let mut inner = self.inner.lock().await;
        *inner.balances.entry(user_id.to_string()).or_insert(0) += amount;
        Ok(())
    }

    async fn record_transaction(&self, tx: &LedgerTransaction) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.transactions.push(tx.clone());
        Ok(())
    }

    async fn find_prize_transaction(
        &self,
        competition_id: &str,
        entry_id: &str,
    ) -> Result<Option<LedgerTransaction>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .transactions
            .iter()
            .find(|tx| {
                tx.kind == TransactionKind::Prize
                    && tx.competition_id.as_deref() == Some(competition_id)
                    && tx.related_id.as_deref() == Some(entry_id)
            })
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_debit_respects_balance() {
        let ledger = MemoryLedger::new();
        ledger.deposit("alice", 30).await;

        assert!(ledger.debit("alice", 10).await.is_ok());
        assert_eq!(ledger.balance("alice").await.unwrap(), 20);

        let err = ledger.debit("alice", 25).await.unwrap_err();
        assert!(matches!(
            err,
            CompetitionError::InsufficientFunds {
                required: 25,
                available: 20
            }
        ));
        assert_eq!(ledger.balance("alice").await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_prize_transaction_lookup() {
        let ledger = MemoryLedger::new();
        let tx = LedgerTransaction::prize("bob", 50, "comp-1", "entry-1", 1, chrono::Utc::now());
        ledger.record_transaction(&tx).await.unwrap();

        let found = ledger
            .find_prize_transaction("comp-1", "entry-1")
            .await
            .unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().position, Some(1));

        assert!(ledger
            .find_prize_transaction("comp-1", "entry-2")
            .await
            .unwrap()
            .is_none());
    }
}
