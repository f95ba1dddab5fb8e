//! MongoDB client wrapper
//!
//! Connection handling and index bootstrap. The unique indexes here
//! are load-bearing: they are the authoritative guards behind the
//! one-competition-per-date, one-entry-per-user, and
//! one-vote-per-entry-per-user invariants - application-level
//! pre-checks only exist to produce friendlier errors.

use std::time::Duration;

use mongodb::bson::doc;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use super::schemas::{COMPETITION_COLLECTION, ENTRY_COLLECTION, VOTE_COLLECTION};
use crate::types::Result;

/// MongoDB client for Pawdium collections
#[derive(Clone)]
pub struct MongoClient {
    database: Database,
}

impl MongoClient {
    /// Connect and verify the server is reachable
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        let mut options = ClientOptions::parse(uri).await?;
        options.app_name = Some("pawdium".to_string());
        options.server_selection_timeout = Some(Duration::from_secs(5));

        let client = Client::with_options(options)?;
        let database = client.database(db_name);

        // Fail fast if the server is unreachable
        database.run_command(doc! { "ping": 1 }).await?;

        Ok(Self { database })
    }

    /// Typed collection accessor
    pub fn collection<T: Serialize + DeserializeOwned + Send + Sync>(
        &self,
        name: &str,
    ) -> Collection<T> {
        self.database.collection(name)
    }

    /// Create the indexes the engine's invariants rely on. Safe to run
    /// on every startup; MongoDB treats existing indexes as a no-op.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let unique = IndexOptions::builder().unique(true).build();

        let competitions: Collection<bson::Document> = self.collection(COMPETITION_COLLECTION);
        competitions
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "date": 1 })
                    .options(unique.clone())
                    .build(),
            )
            .await?;
        competitions
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "status": 1, "end_time": 1 })
                    .build(),
            )
            .await?;

        let entries: Collection<bson::Document> = self.collection(ENTRY_COLLECTION);
        entries
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "competition_id": 1, "user_id": 1 })
                    .options(unique.clone())
                    .build(),
            )
            .await?;
        entries
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "competition_id": 1, "status": 1, "votes_count": -1, "created_at": 1 })
                    .build(),
            )
            .await?;

        let votes: Collection<bson::Document> = self.collection(VOTE_COLLECTION);
        votes
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "competition_id": 1, "entry_id": 1, "user_id": 1 })
                    .options(unique)
                    .build(),
            )
            .await?;
        votes
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "competition_id": 1, "device_fingerprint": 1 })
                    .build(),
            )
            .await?;
        votes
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "competition_id": 1, "ip_address": 1 })
                    .build(),
            )
            .await?;

        info!("MongoDB indexes ensured");
        Ok(())
    }
}

/// Whether a MongoDB error is a unique-index violation
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11000,
        ErrorKind::Command(command_error) => command_error.code == 11000,
        _ => false,
    }
}
