//! Record store adapter
//!
//! Translates the four CRUD operations into single document-store calls.
//! Each operation either fully succeeds or fails; nothing is retried.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Patch, Record, Resource};

#[cfg(test)]
pub mod memory;
pub mod mongo;

pub use mongo::MongoStore;

/// Errors raised by a record store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The identifier cannot name a record in this store
    #[error("invalid record id: {0}")]
    InvalidId(String),

    #[error("no record with id {0}")]
    NotFound(String),

    /// The record could not be encoded as a document
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// A stored document does not fit the record shape
    #[error("corrupt stored document: {0}")]
    CorruptDocument(String),

    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
}

impl From<mongodb::bson::ser::Error> for StoreError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        Self::InvalidDocument(err.to_string())
    }
}

impl From<mongodb::bson::de::Error> for StoreError {
    fn from(err: mongodb::bson::de::Error) -> Self {
        Self::CorruptDocument(err.to_string())
    }
}

/// CRUD operations over one collection of `T` records
#[async_trait]
pub trait RecordStore<T: Resource>: Send + Sync {
    /// Persist a new record built verbatim from `payload`
    async fn create(&self, payload: T) -> Result<Record<T>, StoreError>;

    /// Every record in the collection, in store order
    async fn list_all(&self) -> Result<Vec<Record<T>>, StoreError>;

    /// Overwrite the fields present in `patch` and clear the ones it unsets,
    /// keeping the rest
    async fn update_by_id(&self, id: &str, patch: Patch<T>) -> Result<Record<T>, StoreError>;

    /// Remove a record, returning what was removed
    async fn delete_by_id(&self, id: &str) -> Result<Record<T>, StoreError>;
}
