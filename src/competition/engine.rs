//! Competition lifecycle engine
//!
//! ## Overview
//!
//! Owns the state machine for a daily competition:
//! 1. Idempotent creation for today (retroactive) and tomorrow
//!    (pre-created with a creation-relative entry window)
//! 2. Bulk upcoming -> active transition once a start time passes
//! 3. End-of-day winner selection and prize distribution, fenced by an
//!    atomic claim on the `prizes_distributed` flag
//! 4. Entry acceptance: window check, fee debit, compensating credit
//!    if the entry loses a uniqueness race
//!
//! ## Exactly-once distribution
//!
//! The claim (find active + due + undistributed, flip the flag, one
//! atomic operation) happens before any prize is credited, so
//! concurrent scheduler ticks or manual invocations settle on a single
//! winner-paying run. A run that crashes mid-distribution leaves the
//! competition claimed but not completed; the next invocation resumes
//! it, skipping winners whose prize transaction (or rank) already
//! exists.
//!
//! Every operation has an `*_at` variant taking an explicit instant so
//! tests can drive the clock directly.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::prizes::split_prize_pool;
use crate::db::schemas::date_key;
use crate::db::{CompetitionDoc, EntryDoc, WinnerSlot, Winners};
use crate::ledger::{Ledger, LedgerTransaction};
use crate::store::CompetitionStore;
use crate::types::{CompetitionError, Result};

/// A claimed distribution untouched for this long is considered
/// crashed and eligible for resume.
const RESUME_GRACE_MINUTES: i64 = 5;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Entry fee in tokens for newly created competitions
    pub entry_fee: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { entry_fee: 10 }
    }
}

/// Entry submission request
#[derive(Debug, Clone)]
pub struct SubmitEntry {
    pub competition_id: String,
    pub user_id: String,
    pub pet_name: String,
    pub description: Option<String>,
    pub photo_url: String,
}

/// One resolved winner of a completed competition
#[derive(Debug, Clone)]
pub struct RankedWinner {
    /// 1-based prize position
    pub position: i32,
    pub entry: EntryDoc,
    pub prize: i64,
}

/// A completed competition with its winner entries resolved for
/// display
#[derive(Debug, Clone)]
pub struct CompletedCompetition {
    pub competition: CompetitionDoc,
    pub winners: Vec<RankedWinner>,
}

/// Competition lifecycle engine
pub struct CompetitionEngine {
    store: Arc<dyn CompetitionStore>,
    ledger: Arc<dyn Ledger>,
    config: EngineConfig,
}

impl CompetitionEngine {
    pub fn new(
        store: Arc<dyn CompetitionStore>,
        ledger: Arc<dyn Ledger>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            config,
        }
    }

    /// Ensure a competition exists for today's UTC date. Safe to call
    /// any number of times per day; returns the existing competition
    /// unchanged when one is already there.
    pub async fn create_daily_competition(&self) -> Result<CompetitionDoc> {
        self.create_daily_competition_at(Utc::now()).await
    }

    pub async fn create_daily_competition_at(&self, now: DateTime<Utc>) -> Result<CompetitionDoc> {
        let date = date_key(now.date_naive());
        if let Some(existing) = self.store.find_competition_by_date(&date).await? {
            debug!(date = %date, "Daily competition already exists");
            return Ok(existing);
        }

        let doc = CompetitionDoc::for_today(now, self.config.entry_fee);
        match self.store.insert_competition(&doc).await {
            Ok(()) => {
                info!(date = %doc.date, entry_fee = doc.entry_fee, "Created daily competition");
                Ok(doc)
            }
            Err(CompetitionError::DuplicateCompetition) => {
                // Lost a creation race; the winner's document is the one
                self.store
                    .find_competition_by_date(&date)
                    .await?
                    .ok_or_else(|| {
                        CompetitionError::Internal(format!(
                            "competition for {} vanished after duplicate insert",
                            date
                        ))
                    })
            }
            Err(e) => Err(e),
        }
    }

    /// Ensure a competition exists for tomorrow's UTC date, status
    /// upcoming. Its entry window opens one hour after whenever this
    /// runs - preserved deliberately so users can start entering soon
    /// after the nightly tick, instead of at a fixed clock time.
    pub async fn create_tomorrow_competition(&self) -> Result<CompetitionDoc> {
        self.create_tomorrow_competition_at(Utc::now()).await
    }

    pub async fn create_tomorrow_competition_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<CompetitionDoc> {
        let date = date_key(now.date_naive() + Duration::days(1));
        if let Some(existing) = self.store.find_competition_by_date(&date).await? {
            debug!(date = %date, "Tomorrow's competition already exists");
            return Ok(existing);
        }

        let doc = CompetitionDoc::for_tomorrow(now, self.config.entry_fee);
        match self.store.insert_competition(&doc).await {
            Ok(()) => {
                info!(
                    date = %doc.date,
                    entry_opens = %doc.entry_start_time,
                    "Created tomorrow's competition"
                );
                Ok(doc)
            }
            Err(CompetitionError::DuplicateCompetition) => self
                .store
                .find_competition_by_date(&date)
                .await?
                .ok_or_else(|| {
                    CompetitionError::Internal(format!(
                        "competition for {} vanished after duplicate insert",
                        date
                    ))
                }),
            Err(e) => Err(e),
        }
    }

    /// Transition every upcoming competition whose start time has
    /// passed to active. Pure and idempotent; a missed nightly run
    /// self-heals on the next hourly tick.
    pub async fn update_competition_statuses(&self) -> Result<()> {
        self.update_competition_statuses_at(Utc::now()).await
    }

    pub async fn update_competition_statuses_at(&self, now: DateTime<Utc>) -> Result<()> {
        let transitioned = self.store.activate_due(now).await?;
        if transitioned > 0 {
            info!(count = transitioned, "Activated due competitions");
        }
        Ok(())
    }

    /// End the due competition, if any: select winners, distribute
    /// prizes, and mark it completed. Returns `None` when no
    /// competition is active-and-due or another process already
    /// claimed it - repeated and overlapping invocations are safe.
    pub async fn end_competition_and_select_winners(
        &self,
    ) -> Result<Option<CompletedCompetition>> {
        self.end_competition_and_select_winners_at(Utc::now()).await
    }

    pub async fn end_competition_and_select_winners_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<CompletedCompetition>> {
        // A claimed-but-unfinalized competition is a crashed run; pick
        // it up before claiming anything new. The staleness bound keeps
        // a distribution that is merely in flight elsewhere out of
        // reach.
        let stale_before = now - Duration::minutes(RESUME_GRACE_MINUTES);
        if let Some(orphan) = self.store.find_unfinalized_competition(stale_before).await? {
            warn!(date = %orphan.date, "Resuming interrupted prize distribution");
            return Ok(Some(self.distribute_prizes(orphan, now).await?));
        }

        let Some(claimed) = self.store.claim_due_competition(now).await? else {
            debug!("No competition due for ending");
            return Ok(None);
        };

        info!(
            date = %claimed.date,
            prize_pool = claimed.prize_pool,
            total_entries = claimed.total_entries,
            total_votes = claimed.total_votes,
            "Ending competition"
        );
        Ok(Some(self.distribute_prizes(claimed, now).await?))
    }

    /// Credit prizes to the ranked entries and finalize the
    /// competition document. Idempotent per winner: a prize is skipped
    /// when its tagged ledger transaction (or the entry's rank)
    /// already exists, so a resumed run never pays twice.
    async fn distribute_prizes(
        &self,
        competition: CompetitionDoc,
        now: DateTime<Utc>,
    ) -> Result<CompletedCompetition> {
        let entries = self.store.top_entries(&competition.id, 3).await?;

        if entries.is_empty() {
            let winners = Winners::default();
            self.store
                .finalize_competition(&competition.id, &winners, now)
                .await?;
            info!(date = %competition.date, "Competition completed with no entries");
            return Ok(CompletedCompetition {
                competition: Self::completed_view(competition, winners, now),
                winners: Vec::new(),
            });
        }

        let prizes = split_prize_pool(competition.prize_pool, entries.len());
        let mut winners = Winners::default();
        let mut ranked = Vec::new();

        // Rank order: first before second before third
        for (idx, (entry, prize)) in entries.iter().zip(prizes.iter()).enumerate() {
            let position = (idx + 1) as i32;
            let prize = *prize;
            if prize == 0 {
                continue;
            }

            let already_credited = entry.rank.is_some()
                || self
                    .ledger
                    .find_prize_transaction(&competition.id, &entry.id)
                    .await?
                    .is_some();

            if already_credited {
                info!(
                    entry_id = %entry.id,
                    position,
                    "Winner already credited, skipping"
                );
            } else {
                self.ledger.credit(&entry.user_id, prize).await?;
                self.ledger
                    .record_transaction(&LedgerTransaction::prize(
                        &entry.user_id,
                        prize,
                        &competition.id,
                        &entry.id,
                        position,
                        now,
                    ))
                    .await?;
                info!(
                    user_id = %entry.user_id,
                    entry_id = %entry.id,
                    position,
                    prize,
                    "Prize credited"
                );
            }

            self.store.set_entry_rank(&entry.id, position, now).await?;

            winners.set(
                position,
                WinnerSlot {
                    entry_id: entry.id.clone(),
                    user_id: entry.user_id.clone(),
                    votes: entry.votes_count,
                    prize,
                },
            );

            let mut resolved = entry.clone();
            resolved.rank = Some(position);
            ranked.push(RankedWinner {
                position,
                entry: resolved,
                prize,
            });
        }

        self.store
            .finalize_competition(&competition.id, &winners, now)
            .await?;
        info!(
            date = %competition.date,
            winners = ranked.len(),
            "Competition completed"
        );

        Ok(CompletedCompetition {
            competition: Self::completed_view(competition, winners, now),
            winners: ranked,
        })
    }

    fn completed_view(
        mut competition: CompetitionDoc,
        winners: Winners,
        now: DateTime<Utc>,
    ) -> CompetitionDoc {
        competition.status = crate::db::CompetitionStatus::Completed;
        competition.winners = winners;
        competition.updated_at = now;
        competition
    }

    /// Submit an entry: window check, one entry per user, fee debited
    /// atomically with creation. Rejections are side-effect free and
    /// carry a distinguishable reason.
    pub async fn submit_entry(&self, request: SubmitEntry) -> Result<EntryDoc> {
        self.submit_entry_at(request, Utc::now()).await
    }

    pub async fn submit_entry_at(
        &self,
        request: SubmitEntry,
        now: DateTime<Utc>,
    ) -> Result<EntryDoc> {
        let competition = self
            .store
            .find_competition(&request.competition_id)
            .await?
            .ok_or_else(|| {
                CompetitionError::NotFound(format!("competition {}", request.competition_id))
            })?;

        if competition.is_terminal() {
            return Err(CompetitionError::CompetitionNotOpen(
                competition.status.to_string(),
            ));
        }
        if !competition.entry_window_open(now) {
            return Err(CompetitionError::EntryWindowClosed);
        }
        if self
            .store
            .find_entry_by_user(&competition.id, &request.user_id)
            .await?
            .is_some()
        {
            return Err(CompetitionError::DuplicateEntry);
        }

        let entry = EntryDoc::new(
            &competition.id,
            &request.user_id,
            &request.pet_name,
            request.description.clone(),
            &request.photo_url,
            competition.entry_fee,
            now,
        );

        // Debit first; the unique index is the authoritative duplicate
        // guard, so a lost race below is compensated.
        self.ledger
            .debit(&request.user_id, competition.entry_fee)
            .await?;
        self.ledger
            .record_transaction(&LedgerTransaction::entry_fee(
                &request.user_id,
                competition.entry_fee,
                &competition.id,
                &entry.id,
                now,
            ))
            .await?;

        if let Err(e) = self.store.insert_entry(&entry).await {
            warn!(
                user_id = %request.user_id,
                competition_id = %competition.id,
                "Entry insert failed after debit, crediting fee back"
            );
            self.ledger
                .credit(&request.user_id, competition.entry_fee)
                .await?;
            self.ledger
                .record_transaction(&LedgerTransaction::refund(
                    &request.user_id,
                    competition.entry_fee,
                    &competition.id,
                    now,
                ))
                .await?;
            return Err(e);
        }

        self.store
            .apply_entry_fee(&competition.id, competition.entry_fee, now)
            .await?;

        info!(
            user_id = %request.user_id,
            competition_id = %competition.id,
            entry_id = %entry.id,
            fee = competition.entry_fee,
            "Entry accepted"
        );
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::CompetitionStatus;
    use crate::ledger::MemoryLedger;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn engine() -> (Arc<MemoryStore>, Arc<MemoryLedger>, CompetitionEngine) {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(MemoryLedger::new());
        let engine = CompetitionEngine::new(
            store.clone(),
            ledger.clone(),
            EngineConfig { entry_fee: 10 },
        );
        (store, ledger, engine)
    }

    fn submit(competition_id: &str, user_id: &str) -> SubmitEntry {
        SubmitEntry {
            competition_id: competition_id.to_string(),
            user_id: user_id.to_string(),
            pet_name: format!("pet-of-{}", user_id),
            description: None,
            photo_url: format!("https://photos.example/{}.jpg", user_id),
        }
    }

    #[tokio::test]
    async fn test_daily_creation_is_idempotent() {
        let (_, _, engine) = engine();
        let now = at(2025, 6, 15, 9, 0);

        let first = engine.create_daily_competition_at(now).await.unwrap();
        let second = engine
            .create_daily_competition_at(now + Duration::hours(2))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.created_at, first.created_at);
    }

    #[tokio::test]
    async fn test_tomorrow_creation_is_idempotent_and_upcoming() {
        let (_, _, engine) = engine();
        let now = at(2025, 6, 15, 12, 0);

        let first = engine.create_tomorrow_competition_at(now).await.unwrap();
        assert_eq!(first.status, CompetitionStatus::Upcoming);
        assert_eq!(first.date, "2025-06-16");
        assert_eq!(first.entry_start_time, now + Duration::hours(1));

        let second = engine
            .create_tomorrow_competition_at(now + Duration::minutes(30))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        // The existing window is returned unchanged
        assert_eq!(second.entry_start_time, first.entry_start_time);
    }

    #[tokio::test]
    async fn test_statuses_transition_when_due() {
        let (store, _, engine) = engine();
        let created = at(2025, 6, 15, 12, 0);
        let comp = engine.create_tomorrow_competition_at(created).await.unwrap();

        engine
            .update_competition_statuses_at(at(2025, 6, 15, 23, 0))
            .await
            .unwrap();
        let still = store.find_competition(&comp.id).await.unwrap().unwrap();
        assert_eq!(still.status, CompetitionStatus::Upcoming);

        engine
            .update_competition_statuses_at(at(2025, 6, 16, 0, 0))
            .await
            .unwrap();
        let active = store.find_competition(&comp.id).await.unwrap().unwrap();
        assert_eq!(active.status, CompetitionStatus::Active);
    }

    #[tokio::test]
    async fn test_submit_entry_debits_and_accumulates_pool() {
        let (store, ledger, engine) = engine();
        let now = at(2025, 6, 15, 10, 0);
        let comp = engine.create_daily_competition_at(now).await.unwrap();

        ledger.deposit("alice", 25).await;
        let entry = engine
            .submit_entry_at(submit(&comp.id, "alice"), now)
            .await
            .unwrap();

        assert_eq!(entry.entry_fee_paid, 10);
        assert_eq!(ledger.balance("alice").await.unwrap(), 15);

        let comp = store.find_competition(&comp.id).await.unwrap().unwrap();
        assert_eq!(comp.prize_pool, 10);
        assert_eq!(comp.total_entries, 1);
    }

    #[tokio::test]
    async fn test_submit_entry_rejected_outside_window() {
        let (_, ledger, engine) = engine();
        let now = at(2025, 6, 15, 10, 0);
        let comp = engine.create_daily_competition_at(now).await.unwrap();

        ledger.deposit("bob", 100).await;
        // Entry window closes one hour before end of day
        let err = engine
            .submit_entry_at(submit(&comp.id, "bob"), at(2025, 6, 15, 23, 30))
            .await
            .unwrap_err();
        assert!(matches!(err, CompetitionError::EntryWindowClosed));
        // No debit happened
        assert_eq!(ledger.balance("bob").await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_submit_entry_rejected_without_funds() {
        let (_, ledger, engine) = engine();
        let now = at(2025, 6, 15, 10, 0);
        let comp = engine.create_daily_competition_at(now).await.unwrap();

        ledger.deposit("carol", 5).await;
        let err = engine
            .submit_entry_at(submit(&comp.id, "carol"), now)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CompetitionError::InsufficientFunds {
                required: 10,
                available: 5
            }
        ));
    }

    #[tokio::test]
    async fn test_duplicate_entry_rejected() {
        let (_, ledger, engine) = engine();
        let now = at(2025, 6, 15, 10, 0);
        let comp = engine.create_daily_competition_at(now).await.unwrap();

        ledger.deposit("dave", 50).await;
        engine
            .submit_entry_at(submit(&comp.id, "dave"), now)
            .await
            .unwrap();
        let err = engine
            .submit_entry_at(submit(&comp.id, "dave"), now)
            .await
            .unwrap_err();
        assert!(matches!(err, CompetitionError::DuplicateEntry));
        // Only one fee debited
        assert_eq!(ledger.balance("dave").await.unwrap(), 40);
    }

    #[tokio::test]
    async fn test_end_is_noop_when_nothing_due() {
        let (_, _, engine) = engine();
        let now = at(2025, 6, 15, 10, 0);
        engine.create_daily_competition_at(now).await.unwrap();

        // Still mid-day: nothing is due
        let result = engine
            .end_competition_and_select_winners_at(at(2025, 6, 15, 12, 0))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_end_with_no_entries_completes_without_prizes() {
        let (store, ledger, engine) = engine();
        let now = at(2025, 6, 15, 10, 0);
        let comp = engine.create_daily_competition_at(now).await.unwrap();

        let completed = engine
            .end_competition_and_select_winners_at(at(2025, 6, 16, 0, 0))
            .await
            .unwrap()
            .unwrap();

        assert!(completed.winners.is_empty());
        let comp = store.find_competition(&comp.id).await.unwrap().unwrap();
        assert_eq!(comp.status, CompetitionStatus::Completed);
        assert!(comp.prizes_distributed);
        assert!(comp.winners.is_empty());
        assert!(ledger.transactions().await.is_empty());
    }

    #[tokio::test]
    async fn test_tie_break_prefers_earlier_entry() {
        let (store, ledger, engine) = engine();
        let base = at(2025, 6, 15, 10, 0);
        let comp = engine.create_daily_competition_at(base).await.unwrap();

        ledger.deposit("early", 10).await;
        ledger.deposit("late", 10).await;
        let early = engine
            .submit_entry_at(submit(&comp.id, "early"), base)
            .await
            .unwrap();
        let late = engine
            .submit_entry_at(submit(&comp.id, "late"), base + Duration::minutes(5))
            .await
            .unwrap();

        // Equal votes for both
        for _ in 0..3 {
            store
                .increment_vote_counts(&comp.id, &early.id, base)
                .await
                .unwrap();
            store
                .increment_vote_counts(&comp.id, &late.id, base)
                .await
                .unwrap();
        }

        let completed = engine
            .end_competition_and_select_winners_at(at(2025, 6, 16, 0, 0))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(completed.winners[0].entry.id, early.id);
        assert_eq!(completed.winners[1].entry.id, late.id);
        // Pool of 20 split 67/33
        assert_eq!(completed.winners[0].prize, 13);
        assert_eq!(completed.winners[1].prize, 7);
    }

    #[tokio::test]
    async fn test_resume_skips_already_credited_winner() {
        let (store, ledger, engine) = engine();
        let base = at(2025, 6, 15, 10, 0);
        let comp = engine.create_daily_competition_at(base).await.unwrap();

        ledger.deposit("a", 10).await;
        ledger.deposit("b", 10).await;
        let entry_a = engine
            .submit_entry_at(submit(&comp.id, "a"), base)
            .await
            .unwrap();
        engine
            .submit_entry_at(submit(&comp.id, "b"), base + Duration::minutes(1))
            .await
            .unwrap();
        store
            .increment_vote_counts(&comp.id, &entry_a.id, base)
            .await
            .unwrap();

        // Simulate a crashed distribution: claimed long ago, first
        // winner already credited and recorded, never finalized.
        let end = at(2025, 6, 16, 0, 0);
        let mut crashed = store.find_competition(&comp.id).await.unwrap().unwrap();
        crashed.prizes_distributed = true;
        crashed.updated_at = end - Duration::hours(1);
        store.put_competition(crashed).await;
        ledger.credit("a", 13).await.unwrap();
        ledger
            .record_transaction(&LedgerTransaction::prize("a", 13, &comp.id, &entry_a.id, 1, end))
            .await
            .unwrap();

        let completed = engine
            .end_competition_and_select_winners_at(end)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(completed.competition.status, CompetitionStatus::Completed);
        // First winner not credited again: 10 - 10 fee + 13 prize
        assert_eq!(ledger.balance("a").await.unwrap(), 13);
        // Second winner was credited by the resumed run: 7 of pool 20
        assert_eq!(ledger.balance("b").await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_concurrent_end_distributes_once() {
        let (store, ledger, engine) = engine();
        let base = at(2025, 6, 15, 10, 0);
        let comp = engine.create_daily_competition_at(base).await.unwrap();

        ledger.deposit("solo", 10).await;
        let entry = engine
            .submit_entry_at(submit(&comp.id, "solo"), base)
            .await
            .unwrap();
        store
            .increment_vote_counts(&comp.id, &entry.id, base)
            .await
            .unwrap();

        let engine = Arc::new(engine);
        let end = at(2025, 6, 16, 0, 0);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.end_competition_and_select_winners_at(end).await
            }));
        }

        let mut distributions = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_some() {
                distributions += 1;
            }
        }

        assert_eq!(distributions, 1);
        // Whole pool credited exactly once: 10 - 10 fee + 10 prize
        assert_eq!(ledger.balance("solo").await.unwrap(), 10);
        let prize_txs = ledger
            .transactions()
            .await
            .iter()
            .filter(|t| t.kind == crate::ledger::TransactionKind::Prize)
            .count();
        assert_eq!(prize_txs, 1);
    }
}
