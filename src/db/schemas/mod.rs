//! Database schemas for Pawdium
//!
//! Defines MongoDB document structures for competitions, entries, and
//! votes. Datetimes are stored as native BSON datetimes.

mod competition;
mod entry;
mod vote;

pub use competition::{
    date_key, CompetitionDoc, CompetitionStatus, WinnerSlot, Winners, COMPETITION_COLLECTION,
};
pub use entry::{EntryDoc, EntryStatus, ENTRY_COLLECTION};
pub use vote::{device_fingerprint, DeviceInfo, VoteDoc, VOTE_COLLECTION};

/// Serde helper for `Option<chrono::DateTime<Utc>>` fields stored as
/// BSON datetimes (the non-optional case is covered by bson's own
/// `chrono_datetime_as_bson_datetime`).
pub(crate) mod bson_datetime_opt {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => bson::DateTime::from_chrono(*dt).serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt = Option::<bson::DateTime>::deserialize(deserializer)?;
        Ok(opt.map(|dt| dt.to_chrono()))
    }
}
