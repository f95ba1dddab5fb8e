//! Competition vote schema
//!
//! One vote per (competition, entry, user) triple, enforced by a
//! unique index. A user may still vote for several distinct entries in
//! the same competition. Fraud flags are advisory: a flagged vote
//! counts toward ranking and is surfaced to a manual review queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Collection name for competition votes
pub const VOTE_COLLECTION: &str = "competition_votes";

/// Informational device description captured with a vote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub platform: Option<String>,
    pub model: Option<String>,
    pub os_version: Option<String>,
}

/// Competition vote document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteDoc {
    #[serde(rename = "_id")]
    pub id: String,
    pub competition_id: String,
    pub entry_id: String,
    pub user_id: String,
    /// Hash derived from device + voter + entry context, used to
    /// detect same-device vote abuse
    pub device_fingerprint: String,
    pub device_info: Option<DeviceInfo>,
    pub ip_address: Option<String>,
    pub is_valid: bool,
    pub flagged_for_review: bool,
    pub flag_reason: Option<String>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl VoteDoc {
    pub fn new(
        competition_id: &str,
        entry_id: &str,
        user_id: &str,
        device_fingerprint: String,
        device_info: Option<DeviceInfo>,
        ip_address: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            competition_id: competition_id.to_string(),
            entry_id: entry_id.to_string(),
            user_id: user_id.to_string(),
            device_fingerprint,
            device_info,
            ip_address,
            is_valid: true,
            flagged_for_review: false,
            flag_reason: None,
            created_at: now,
        }
    }
}

/// Derive a device fingerprint from device + voter + entry context.
/// Used when the client did not compute one itself.
pub fn device_fingerprint(device_info: &DeviceInfo, user_id: &str, entry_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(device_info.platform.as_deref().unwrap_or("unknown"));
    hasher.update(b"|");
    hasher.update(device_info.model.as_deref().unwrap_or("unknown"));
    hasher.update(b"|");
    hasher.update(device_info.os_version.as_deref().unwrap_or("unknown"));
    hasher.update(b"|");
    hasher.update(user_id);
    hasher.update(b"|");
    hasher.update(entry_id);
    hex::encode(hasher.finalize())
}
