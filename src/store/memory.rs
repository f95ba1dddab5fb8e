//! In-memory competition store
//!
//! Backs unit tests and dev mode. One mutex guards all state, so the
//! end-of-day claim has the same find-and-flip atomicity as the
//! MongoDB `find_one_and_update`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::CompetitionStore;
use crate::db::{CompetitionDoc, CompetitionStatus, EntryDoc, VoteDoc, Winners};
use crate::types::{CompetitionError, Result};

#[derive(Default)]
struct Inner {
    competitions: HashMap<String, CompetitionDoc>,
    entries: HashMap<String, EntryDoc>,
    votes: HashMap<String, VoteDoc>,
}

/// Competition store over process memory
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct competition mutation (test helper)
    pub async fn put_competition(&self, doc: CompetitionDoc) {
        let mut inner = self.inner.lock().await;
        inner.competitions.insert(doc.id.clone(), doc);
    }

    /// Direct entry read (test helper)
    pub async fn get_entry(&self, id: &str) -> Option<EntryDoc> {
        self.inner.lock().await.entries.get(id).cloned()
    }
}

#[async_trait]
impl CompetitionStore for MemoryStore {
    async fn insert_competition(&self, doc: &CompetitionDoc) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.competitions.values().any(|c| c.date == doc.date) {
            return Err(CompetitionError::DuplicateCompetition);
        }
        inner.competitions.insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn find_competition(&self, id: &str) -> Result<Option<CompetitionDoc>> {
        Ok(self.inner.lock().await.competitions.get(id).cloned())
    }

    async fn find_competition_by_date(&self, date: &str) -> Result<Option<CompetitionDoc>> {
        let inner = self.inner.lock().await;
        Ok(inner.competitions.values().find(|c| c.date == date).cloned())
    }

    async fn activate_due(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        let mut transitioned = 0;
        for comp in inner.competitions.values_mut() {
            if comp.status == CompetitionStatus::Upcoming && comp.start_time <= now {
                comp.status = CompetitionStatus::Active;
                comp.updated_at = now;
                transitioned += 1;
            }
        }
        Ok(transitioned)
    }

    async fn claim_due_competition(&self, now: DateTime<Utc>) -> Result<Option<CompetitionDoc>> {
        let mut inner = self.inner.lock().await;
        let claimed = inner.competitions.values_mut().find(|c| {
            c.status == CompetitionStatus::Active && c.end_time <= now && !c.prizes_distributed
        });

        match claimed {
            Some(comp) => {
                comp.prizes_distributed = true;
                comp.updated_at = now;
                Ok(Some(comp.clone()))
            }
            None => Ok(None),
        }
    }

    async fn find_unfinalized_competition(
        &self,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<CompetitionDoc>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .competitions
            .values()
            .find(|c| {
                c.status == CompetitionStatus::Active
                    && c.prizes_distributed
                    && c.updated_at < stale_before
            })
            .cloned())
    }

    async fn finalize_competition(
        &self,
        id: &str,
        winners: &Winners,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let comp = inner
            .competitions
            .get_mut(id)
            .ok_or_else(|| CompetitionError::NotFound(format!("competition {}", id)))?;
        comp.status = CompetitionStatus::Completed;
        comp.winners = winners.clone();
        comp.updated_at = now;
        Ok(())
    }

    async fn apply_entry_fee(
        &self,
        competition_id: &str,
        fee: i64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(comp) = inner.competitions.get_mut(competition_id) {
            comp.prize_pool += fee;
            comp.total_entries += 1;
            comp.updated_at = now;
        }
        Ok(())
    }

    async fn insert_entry(&self, doc: &EntryDoc) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let exists = inner
            .entries
            .values()
            .any(|e| e.competition_id == doc.competition_id && e.user_id == doc.user_id);
        if exists {
            return Err(CompetitionError::DuplicateEntry);
        }
        inner.entries.insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn find_entry(&self, id: &str) -> Result<Option<EntryDoc>> {
        Ok(self.inner.lock().await.entries.get(id).cloned())
    }

    async fn find_entry_by_user(
        &self,
        competition_id: &str,
        user_id: &str,
    ) -> Result<Option<EntryDoc>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .entries
            .values()
            .find(|e| e.competition_id == competition_id && e.user_id == user_id)
            .cloned())
    }

    async fn top_entries(&self, competition_id: &str, limit: i64) -> Result<Vec<EntryDoc>> {
        let inner = self.inner.lock().await;
        let mut entries: Vec<EntryDoc> = inner
            .entries
            .values()
            .filter(|e| {
                e.competition_id == competition_id
                    && e.status == crate::db::EntryStatus::Active
            })
            .cloned()
            .collect();

        entries.sort_by(|a, b| {
            b.votes_count
                .cmp(&a.votes_count)
                .then(a.created_at.cmp(&b.created_at))
        });
        entries.truncate(limit as usize);
        Ok(entries)
    }

    async fn set_entry_rank(&self, entry_id: &str, rank: i32, now: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(entry) = inner.entries.get_mut(entry_id) {
            entry.rank = Some(rank);
            entry.updated_at = now;
        }
        Ok(())
    }

    async fn insert_vote(&self, doc: &VoteDoc) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let exists = inner.votes.values().any(|v| {
            v.competition_id == doc.competition_id
                && v.entry_id == doc.entry_id
                && v.user_id == doc.user_id
        });
        if exists {
            return Err(CompetitionError::DuplicateVote);
        }
        inner.votes.insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn find_vote(
        &self,
        competition_id: &str,
        entry_id: &str,
        user_id: &str,
    ) -> Result<Option<VoteDoc>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .votes
            .values()
            .find(|v| {
                v.competition_id == competition_id
                    && v.entry_id == entry_id
                    && v.user_id == user_id
            })
            .cloned())
    }

    async fn delete_vote(&self, vote_id: &str) -> Result<()> {
        self.inner.lock().await.votes.remove(vote_id);
        Ok(())
    }

    async fn increment_vote_counts(
        &self,
        competition_id: &str,
        entry_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(entry) = inner.entries.get_mut(entry_id) {
            entry.votes_count += 1;
            entry.updated_at = now;
        }
        if let Some(comp) = inner.competitions.get_mut(competition_id) {
            comp.total_votes += 1;
            comp.updated_at = now;
        }
        Ok(())
    }

    async fn count_votes_by_fingerprint(
        &self,
        competition_id: &str,
        fingerprint: &str,
    ) -> Result<u64> {
        let inner = self.inner.lock().await;
        Ok(inner
            .votes
            .values()
            .filter(|v| {
                v.competition_id == competition_id && v.device_fingerprint == fingerprint
            })
            .count() as u64)
    }

    async fn count_votes_by_ip(&self, competition_id: &str, ip: &str) -> Result<u64> {
        let inner = self.inner.lock().await;
        Ok(inner
            .votes
            .values()
            .filter(|v| v.competition_id == competition_id && v.ip_address.as_deref() == Some(ip))
            .count() as u64)
    }
}
