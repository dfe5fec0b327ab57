//! Storage backends.
//!
//! A [`Store`] only knows how to reach its database and bind statements in
//! that database's dialect. Business rules (hashing, uniform login failures,
//! ordering guarantees) live in [`crate::backend::PersistenceBackend`].

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::config::StoreConfig;
use crate::error::StoreError;

pub mod models;
pub mod postgres;
pub mod schema;
pub mod sqlite;

pub use models::{
    AuthenticatedUser, Features, NewPrediction, NewUser, Outcome, Prediction, PredictionId, User,
    UserId,
};
pub use postgres::PgStore;
pub use schema::Dialect;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait Store: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Round-trips a trivial query to prove the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn init_schema(&self) -> Result<(), StoreError>;

    /// Inserts a user row as given. Uniqueness is left to the store's constraints.
    async fn insert_user(&self, user: &NewUser) -> Result<UserId, StoreError>;
    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;
    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn delete_user(&self, id: UserId) -> Result<bool, StoreError>;

    async fn insert_prediction(&self, prediction: &NewPrediction)
        -> Result<PredictionId, StoreError>;
    /// Newest first, ties broken by descending id.
    async fn predictions_for_user(&self, user_id: UserId) -> Result<Vec<Prediction>, StoreError>;

    fn stream_users(&self) -> BoxStream<'_, Result<User, StoreError>>;
    fn stream_predictions(&self) -> BoxStream<'_, Result<Prediction, StoreError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Creates the SQLite file or Postgres database when missing.
    ReadWrite,
    /// Requires the database to exist already; SQLite is opened read-only.
    ReadOnly,
}

/// Opens the store described by `config` for reading and writing.
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn Store>, StoreError> {
    connect_with_mode(config, OpenMode::ReadWrite).await
}

pub async fn connect_with_mode(
    config: &StoreConfig,
    mode: OpenMode,
) -> Result<Arc<dyn Store>, StoreError> {
    match config {
        StoreConfig::Sqlite {
            path,
            max_connections,
        } => Ok(Arc::new(
            SqliteStore::open_with_mode(path, *max_connections, mode).await?,
        )),
        StoreConfig::Postgres { .. } => {
            Ok(Arc::new(PgStore::connect_with_mode(config, mode).await?))
        }
    }
}
