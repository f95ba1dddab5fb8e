//! Persistence collaborator for competitions, entries, and votes
//!
//! The engine talks to this seam, never to MongoDB directly. The
//! contract mirrors what the document store can do atomically:
//! conditional single-document updates (the end-of-day claim) and
//! counter increments. Hot counters (`votes_count`, `total_votes`,
//! `prize_pool`) are only ever moved through increment operations,
//! never read-modify-write.

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::{CompetitionDoc, EntryDoc, VoteDoc, Winners};
use crate::types::Result;

/// Document store operations the engine requires
#[async_trait]
pub trait CompetitionStore: Send + Sync {
    /// Insert a competition; fails with `DuplicateCompetition` if one
    /// already exists for the same date
    async fn insert_competition(&self, doc: &CompetitionDoc) -> Result<()>;

    async fn find_competition(&self, id: &str) -> Result<Option<CompetitionDoc>>;

    async fn find_competition_by_date(&self, date: &str) -> Result<Option<CompetitionDoc>>;

    /// Transition every upcoming competition whose start time has
    /// passed to active. Returns how many were transitioned.
    async fn activate_due(&self, now: DateTime<Utc>) -> Result<u64>;

    /// Atomic end-of-day claim: find the single competition with
    /// status=active, end_time <= now, prizes_distributed=false and
    /// flip prizes_distributed to true in the same operation. Returns
    /// the claimed competition, or None when no competition matched
    /// (nothing due, or another process already claimed it).
    async fn claim_due_competition(&self, now: DateTime<Utc>) -> Result<Option<CompetitionDoc>>;

    /// A competition that was claimed (prizes_distributed=true) but
    /// never finalized (status still active) - evidence of a crashed
    /// distribution run that must be resumed. Only competitions not
    /// touched since `stale_before` qualify, so a distribution that is
    /// merely in flight on another process is not picked up.
    async fn find_unfinalized_competition(
        &self,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<CompetitionDoc>>;

    /// Mark a competition completed and persist its winners as one
    /// atomic document update
    async fn finalize_competition(
        &self,
        id: &str,
        winners: &Winners,
        now: DateTime<Utc>,
    ) -> Result<()>;

    /// Fold one paid entry fee into the prize pool and entry counter
    async fn apply_entry_fee(&self, competition_id: &str, fee: i64, now: DateTime<Utc>)
        -> Result<()>;

    /// Insert an entry; fails with `DuplicateEntry` if the user
    /// already has one in this competition
    async fn insert_entry(&self, doc: &EntryDoc) -> Result<()>;

    async fn find_entry(&self, id: &str) -> Result<Option<EntryDoc>>;

    async fn find_entry_by_user(
        &self,
        competition_id: &str,
        user_id: &str,
    ) -> Result<Option<EntryDoc>>;

    /// Active entries ordered by votes_count descending, ties broken
    /// by earlier created_at (earlier submission wins)
    async fn top_entries(&self, competition_id: &str, limit: i64) -> Result<Vec<EntryDoc>>;

    async fn set_entry_rank(&self, entry_id: &str, rank: i32, now: DateTime<Utc>) -> Result<()>;

    /// Insert a vote; fails with `DuplicateVote` if the user already
    /// voted for this entry
    async fn insert_vote(&self, doc: &VoteDoc) -> Result<()>;

    async fn find_vote(
        &self,
        competition_id: &str,
        entry_id: &str,
        user_id: &str,
    ) -> Result<Option<VoteDoc>>;

    /// Remove a vote (compensation path after a failed counter update)
    async fn delete_vote(&self, vote_id: &str) -> Result<()>;

    /// Atomically bump the entry's votes_count and the competition's
    /// total_votes for one accepted vote
    async fn increment_vote_counts(
        &self,
        competition_id: &str,
        entry_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()>;

    async fn count_votes_by_fingerprint(
        &self,
        competition_id: &str,
        fingerprint: &str,
    ) -> Result<u64>;

    async fn count_votes_by_ip(&self, competition_id: &str, ip: &str) -> Result<u64>;
}
