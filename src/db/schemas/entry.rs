//! Competition entry schema
//!
//! One entry per (competition, user) pair. `entry_fee_paid` is a
//! snapshot of the fee at submission time and never changes, even if
//! the competition's configured fee changes later.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::bson_datetime_opt;

/// Collection name for competition entries
pub const ENTRY_COLLECTION: &str = "competition_entries";

/// Entry status. Entries are never hard-deleted by the engine;
/// cancellation (with refund bookkeeping) is an admin operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Active,
    Cancelled,
}

/// Competition entry document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryDoc {
    #[serde(rename = "_id")]
    pub id: String,
    pub competition_id: String,
    pub user_id: String,
    pub pet_name: String,
    pub description: Option<String>,
    pub photo_url: String,
    pub status: EntryStatus,
    /// Count of votes referencing this entry; maintained by atomic
    /// increments alongside vote writes, never negative
    pub votes_count: i64,
    pub entry_fee_paid: i64,
    pub refunded: bool,
    #[serde(default, with = "bson_datetime_opt")]
    pub refunded_at: Option<DateTime<Utc>>,
    /// 1, 2, or 3 for prize winners, assigned at competition
    /// completion; absent otherwise
    pub rank: Option<i32>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl EntryDoc {
    pub fn new(
        competition_id: &str,
        user_id: &str,
        pet_name: &str,
        description: Option<String>,
        photo_url: &str,
        entry_fee_paid: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            competition_id: competition_id.to_string(),
            user_id: user_id.to_string(),
            pet_name: pet_name.to_string(),
            description,
            photo_url: photo_url.to_string(),
            status: EntryStatus::Active,
            votes_count: 0,
            entry_fee_paid,
            refunded: false,
            refunded_at: None,
            rank: None,
            created_at: now,
            updated_at: now,
        }
    }
}
