//! Database layer for Pawdium
//!
//! Provides MongoDB storage for competitions, entries, votes, and the
//! token ledger collections.

pub mod mongo;
pub mod schemas;

pub use mongo::MongoClient;
pub use schemas::{
    CompetitionDoc, CompetitionStatus, DeviceInfo, EntryDoc, EntryStatus, VoteDoc, WinnerSlot,
    Winners, COMPETITION_COLLECTION, ENTRY_COLLECTION, VOTE_COLLECTION,
};
