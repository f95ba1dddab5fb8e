//! MongoDB-backed competition store
//!
//! The end-of-day claim maps to `find_one_and_update` so the filter
//! check and the fencing-flag flip happen in one server-side
//! operation. Counters move via `$inc` only.

use async_trait::async_trait;
use bson::doc;
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use mongodb::options::ReturnDocument;
use mongodb::Collection;

use super::CompetitionStore;
use crate::db::mongo::is_duplicate_key;
use crate::db::{
    CompetitionDoc, EntryDoc, MongoClient, VoteDoc, Winners, COMPETITION_COLLECTION,
    ENTRY_COLLECTION, VOTE_COLLECTION,
};
use crate::types::{CompetitionError, Result};

/// Competition store over MongoDB collections
pub struct MongoStore {
    competitions: Collection<CompetitionDoc>,
    entries: Collection<EntryDoc>,
    votes: Collection<VoteDoc>,
}

impl MongoStore {
    pub fn new(client: &MongoClient) -> Self {
        Self {
            competitions: client.collection(COMPETITION_COLLECTION),
            entries: client.collection(ENTRY_COLLECTION),
            votes: client.collection(VOTE_COLLECTION),
        }
    }
}

#[async_trait]
impl CompetitionStore for MongoStore {
    async fn insert_competition(&self, doc: &CompetitionDoc) -> Result<()> {
        match self.competitions.insert_one(doc).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(CompetitionError::DuplicateCompetition),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_competition(&self, id: &str) -> Result<Option<CompetitionDoc>> {
        Ok(self.competitions.find_one(doc! { "_id": id }).await?)
    }

    async fn find_competition_by_date(&self, date: &str) -> Result<Option<CompetitionDoc>> {
        Ok(self.competitions.find_one(doc! { "date": date }).await?)
    }

    async fn activate_due(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = self
            .competitions
            .update_many(
                doc! {
                    "status": "upcoming",
                    "start_time": { "$lte": bson::DateTime::from_chrono(now) },
                },
                doc! {
                    "$set": {
                        "status": "active",
                        "updated_at": bson::DateTime::from_chrono(now),
                    },
                },
            )
            .await?;
        Ok(result.modified_count)
    }

    async fn claim_due_competition(&self, now: DateTime<Utc>) -> Result<Option<CompetitionDoc>> {
        let claimed = self
            .competitions
            .find_one_and_update(
                doc! {
                    "status": "active",
                    "end_time": { "$lte": bson::DateTime::from_chrono(now) },
                    "prizes_distributed": false,
                },
                doc! {
                    "$set": {
                        "prizes_distributed": true,
                        "updated_at": bson::DateTime::from_chrono(now),
                    },
                },
            )
            .return_document(ReturnDocument::After)
            .await?;
        Ok(claimed)
    }

    async fn find_unfinalized_competition(
        &self,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<CompetitionDoc>> {
        Ok(self
            .competitions
            .find_one(doc! {
                "status": "active",
                "prizes_distributed": true,
                "updated_at": { "$lt": bson::DateTime::from_chrono(stale_before) },
            })
            .await?)
    }

    async fn finalize_competition(
        &self,
        id: &str,
        winners: &Winners,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let winners_bson = bson::to_bson(winners)?;
        let result = self
            .competitions
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$set": {
                        "status": "completed",
                        "winners": winners_bson,
                        "updated_at": bson::DateTime::from_chrono(now),
                    },
                },
            )
            .await?;

        if result.matched_count == 0 {
            return Err(CompetitionError::NotFound(format!("competition {}", id)));
        }
        Ok(())
    }

    async fn apply_entry_fee(
        &self,
        competition_id: &str,
        fee: i64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.competitions
            .update_one(
                doc! { "_id": competition_id },
                doc! {
                    "$inc": { "prize_pool": fee, "total_entries": 1 },
                    "$set": { "updated_at": bson::DateTime::from_chrono(now) },
                },
            )
            .await?;
        Ok(())
    }

    async fn insert_entry(&self, doc: &EntryDoc) -> Result<()> {
        match self.entries.insert_one(doc).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(CompetitionError::DuplicateEntry),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_entry(&self, id: &str) -> Result<Option<EntryDoc>> {
        Ok(self.entries.find_one(doc! { "_id": id }).await?)
    }

    async fn find_entry_by_user(
        &self,
        competition_id: &str,
        user_id: &str,
    ) -> Result<Option<EntryDoc>> {
        Ok(self
            .entries
            .find_one(doc! { "competition_id": competition_id, "user_id": user_id })
            .await?)
    }

    async fn top_entries(&self, competition_id: &str, limit: i64) -> Result<Vec<EntryDoc>> {
        let cursor = self
            .entries
            .find(doc! { "competition_id": competition_id, "status": "active" })
            .sort(doc! { "votes_count": -1, "created_at": 1 })
            .limit(limit)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn set_entry_rank(&self, entry_id: &str, rank: i32, now: DateTime<Utc>) -> Result<()> {
        self.entries
            .update_one(
                doc! { "_id": entry_id },
                doc! {
                    "$set": {
                        "rank": rank,
                        "updated_at": bson::DateTime::from_chrono(now),
                    },
                },
            )
            .await?;
        Ok(())
    }

    async fn insert_vote(&self, doc: &VoteDoc) -> Result<()> {
        match self.votes.insert_one(doc).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(CompetitionError::DuplicateVote),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_vote(
        &self,
        competition_id: &str,
        entry_id: &str,
        user_id: &str,
    ) -> Result<Option<VoteDoc>> {
        Ok(self
            .votes
            .find_one(doc! {
                "competition_id": competition_id,
                "entry_id": entry_id,
                "user_id": user_id,
            })
            .await?)
    }

    async fn delete_vote(&self, vote_id: &str) -> Result<()> {
        self.votes.delete_one(doc! { "_id": vote_id }).await?;
        Ok(())
    }

    async fn increment_vote_counts(
        &self,
        competition_id: &str,
        entry_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.entries
            .update_one(
                doc! { "_id": entry_id },
                doc! {
                    "$inc": { "votes_count": 1 },
                    "$set": { "updated_at": bson::DateTime::from_chrono(now) },
                },
            )
            .await?;

        self.competitions
            .update_one(
                doc! { "_id": competition_id },
                doc! {
                    "$inc": { "total_votes": 1 },
                    "$set": { "updated_at": bson::DateTime::from_chrono(now) },
                },
            )
            .await?;

        Ok(())
    }

    async fn count_votes_by_fingerprint(
        &self,
        competition_id: &str,
        fingerprint: &str,
    ) -> Result<u64> {
        Ok(self
            .votes
            .count_documents(doc! {
                "competition_id": competition_id,
                "device_fingerprint": fingerprint,
            })
            .await?)
    }

    async fn count_votes_by_ip(&self, competition_id: &str, ip: &str) -> Result<u64> {
        Ok(self
            .votes
            .count_documents(doc! {
                "competition_id": competition_id,
                "ip_address": ip,
            })
            .await?)
    }
}
