//! Persistence collaborator abstraction.
//!
//! The engine never talks to a transport directly. Everything it needs from
//! the backend is the call contract below; failures surface as `Err` values
//! and are absorbed by the sync outbox.

mod file;
mod memory;

pub use file::FilePersistence;
pub use memory::{CallCounts, MemoryPersistence};

use crate::shapes::ShapeId;
use crate::sync::{RecordPatch, ShapeRecord};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Persistence errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("Shape not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Rejected by backend: {0}")]
    Rejected(String),
    #[error("Persistence error: {0}")]
    Other(String),
}

/// Result type for persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Boxed future for async operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Backend that stores shape records and file tags.
///
/// Arguments are owned so implementations can move them into the returned
/// future.
pub trait Persistence: Send + Sync {
    /// Store a new record and return it as stored.
    fn create_shape(&self, record: ShapeRecord) -> BoxFuture<'_, PersistenceResult<ShapeRecord>>;

    /// Merge changed fields into a stored record and return the result.
    fn update_shape(
        &self,
        id: ShapeId,
        patch: RecordPatch,
    ) -> BoxFuture<'_, PersistenceResult<ShapeRecord>>;

    /// Remove a record. Removing an unknown id succeeds.
    fn delete_shape(&self, id: ShapeId) -> BoxFuture<'_, PersistenceResult<()>>;

    /// Every record belonging to any of the given media files.
    fn get_shapes_by_file_ids(
        &self,
        file_ids: Vec<String>,
    ) -> BoxFuture<'_, PersistenceResult<Vec<ShapeRecord>>>;

    /// Set the same tag list on every listed file.
    fn update_multiple_file_tags(
        &self,
        file_ids: Vec<String>,
        tag_ids: Vec<String>,
    ) -> BoxFuture<'_, PersistenceResult<()>>;
}
