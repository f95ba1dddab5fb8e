//! Vote integrity guard
//!
//! Enforces one vote per user per entry and flags suspicious voting
//! patterns (many votes sharing a device fingerprint or IP within one
//! competition). Detection is advisory, not preventive: a flagged vote
//! is stored, counts toward ranking, and feeds a manual review queue
//! elsewhere - it is never rejected for being flagged.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::db::schemas::device_fingerprint;
use crate::db::{DeviceInfo, EntryStatus, VoteDoc};
use crate::store::CompetitionStore;
use crate::types::{CompetitionError, Result};

/// Vote guard configuration
#[derive(Debug, Clone)]
pub struct VoteGuardConfig {
    /// Prior votes sharing a fingerprint (or IP) in one competition
    /// before new votes get flagged
    pub fraud_vote_threshold: u64,
}

impl Default for VoteGuardConfig {
    fn default() -> Self {
        Self {
            fraud_vote_threshold: 5,
        }
    }
}

/// Vote submission request
#[derive(Debug, Clone)]
pub struct CastVote {
    pub competition_id: String,
    pub entry_id: String,
    pub user_id: String,
    /// Client-derived fingerprint; derived server-side from the
    /// device info when absent
    pub device_fingerprint: Option<String>,
    pub device_info: Option<DeviceInfo>,
    pub ip_address: Option<String>,
}

/// Vote integrity guard
pub struct VoteGuard {
    store: Arc<dyn CompetitionStore>,
    config: VoteGuardConfig,
}

impl VoteGuard {
    pub fn new(store: Arc<dyn CompetitionStore>, config: VoteGuardConfig) -> Self {
        Self { store, config }
    }

    /// Cast a vote. The vote row, the entry's votes_count, and the
    /// competition's total_votes move as one unit: a failed counter
    /// update rolls the inserted vote back before the error surfaces.
    pub async fn cast_vote(&self, request: CastVote) -> Result<VoteDoc> {
        self.cast_vote_at(request, Utc::now()).await
    }

    pub async fn cast_vote_at(&self, request: CastVote, now: DateTime<Utc>) -> Result<VoteDoc> {
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
        if !competition.voting_open(now) {
            return Err(CompetitionError::VotingWindowClosed);
        }

        let entry = self
            .store
            .find_entry(&request.entry_id)
            .await?
            .ok_or_else(|| CompetitionError::NotFound(format!("entry {}", request.entry_id)))?;

        if entry.competition_id != competition.id {
            return Err(CompetitionError::NotFound(format!(
                "entry {} not in competition {}",
                entry.id, competition.id
            )));
        }
        if entry.status != EntryStatus::Active {
            return Err(CompetitionError::EntryInactive);
        }

        if self
            .store
            .find_vote(&competition.id, &entry.id, &request.user_id)
            .await?
            .is_some()
        {
            return Err(CompetitionError::DuplicateVote);
        }

        let fingerprint = match &request.device_fingerprint {
            Some(fp) => fp.clone(),
            None => {
                let info = request.device_info.clone().unwrap_or_default();
                device_fingerprint(&info, &request.user_id, &entry.id)
            }
        };

        let flag_reason = self
            .fraud_flag(&competition.id, &fingerprint, request.ip_address.as_deref())
            .await?;

        let mut vote = VoteDoc::new(
            &competition.id,
            &entry.id,
            &request.user_id,
            fingerprint,
            request.device_info.clone(),
            request.ip_address.clone(),
            now,
        );
        if let Some(reason) = flag_reason {
            warn!(
                competition_id = %competition.id,
                entry_id = %entry.id,
                user_id = %request.user_id,
                reason = %reason,
                "Vote flagged for review"
            );
            vote.flagged_for_review = true;
            vote.flag_reason = Some(reason);
        }

        // The unique index is the authoritative duplicate guard; the
        // pre-check above only produced a friendlier early error.
        self.store.insert_vote(&vote).await?;

        if let Err(e) = self
            .store
            .increment_vote_counts(&competition.id, &entry.id, now)
            .await
        {
            if let Err(cleanup) = self.store.delete_vote(&vote.id).await {
                warn!(
                    vote_id = %vote.id,
                    error = %cleanup,
                    "Failed to roll back vote after counter update failure"
                );
            }
            return Err(e);
        }

        info!(
            competition_id = %competition.id,
            entry_id = %entry.id,
            user_id = %request.user_id,
            flagged = vote.flagged_for_review,
            "Vote recorded"
        );
        Ok(vote)
    }

    /// Advisory fraud heuristic: how many prior votes in this
    /// competition share the fingerprint or the IP
    async fn fraud_flag(
        &self,
        competition_id: &str,
        fingerprint: &str,
        ip_address: Option<&str>,
    ) -> Result<Option<String>> {
        let same_device = self
            .store
            .count_votes_by_fingerprint(competition_id, fingerprint)
            .await?;
        if same_device >= self.config.fraud_vote_threshold {
            return Ok(Some(format!(
                "{} prior votes share this device fingerprint",
                same_device
            )));
        }

        if let Some(ip) = ip_address {
            let same_ip = self.store.count_votes_by_ip(competition_id, ip).await?;
            if same_ip >= self.config.fraud_vote_threshold {
                return Ok(Some(format!("{} prior votes share this IP address", same_ip)));
            }
        }

        Ok(None)
    }
}
