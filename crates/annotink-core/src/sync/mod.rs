//! Synchronization between the local stores and the persistence backend.
//!
//! Local stores are the source of truth for rendering and change
//! synchronously. Each committed change is queued in the [`Outbox`] and
//! sent later by [`Outbox::dispatch`].

mod bridge;
mod cache;
mod outbox;
mod record;

pub use bridge::SyncBridge;
pub use cache::FileShapeCache;
pub use outbox::{DispatchReport, Intent, Outbox, OutboxEntry};
pub use record::{RecordPatch, ShapeRecord, DEFAULT_FRAME};

use crate::media::{MediaAnnotations, MediaKind};
use crate::storage::{Persistence, PersistenceResult};

/// Fetch a file's persisted shapes, laid out for its media kind.
pub async fn fetch_annotations(
    persistence: &dyn Persistence,
    kind: MediaKind,
    file_id: &str,
) -> PersistenceResult<MediaAnnotations> {
    let records = persistence
        .get_shapes_by_file_ids(vec![file_id.to_string()])
        .await?;
    log::debug!("fetched {} records for {}", records.len(), file_id);
    Ok(MediaAnnotations::from_records(kind, records))
}
