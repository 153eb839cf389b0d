//! In-memory persistence implementation.

use super::{BoxFuture, Persistence, PersistenceError, PersistenceResult};
use crate::shapes::ShapeId;
use crate::sync::{RecordPatch, ShapeRecord};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::RwLock;

/// Number of calls received per operation, failed ones included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub fetch: usize,
    pub tag: usize,
}

#[derive(Default)]
struct Counters {
    create: AtomicUsize,
    update: AtomicUsize,
    delete: AtomicUsize,
    fetch: AtomicUsize,
    tag: AtomicUsize,
}

/// In-memory persistence for testing and ephemeral sessions.
///
/// `fail_next(n)` makes the next `n` calls fail with
/// [`PersistenceError::Rejected`], whatever the operation.
#[derive(Default)]
pub struct MemoryPersistence {
    records: RwLock<BTreeMap<ShapeId, ShapeRecord>>,
    file_tags: RwLock<BTreeMap<String, Vec<String>>>,
    failures: AtomicU32,
    calls: Counters,
}

fn lock_error(e: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::Other(format!("Lock error: {}", e))
}

impl MemoryPersistence {
    /// Create a new empty memory persistence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with records, bypassing call counting.
    pub fn seed(&self, records: impl IntoIterator<Item = ShapeRecord>) -> PersistenceResult<()> {
        let mut stored = self.records.write().map_err(lock_error)?;
        for record in records {
            stored.insert(record.id, record);
        }
        Ok(())
    }

    pub fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            create: self.calls.create.load(Ordering::SeqCst),
            update: self.calls.update.load(Ordering::SeqCst),
            delete: self.calls.delete.load(Ordering::SeqCst),
            fetch: self.calls.fetch.load(Ordering::SeqCst),
            tag: self.calls.tag.load(Ordering::SeqCst),
        }
    }

    /// Snapshot of every stored record.
    pub fn records(&self) -> Vec<ShapeRecord> {
        self.records
            .read()
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn record(&self, id: ShapeId) -> Option<ShapeRecord> {
        self.records.read().ok()?.get(&id).cloned()
    }

    pub fn file_tags(&self, file_id: &str) -> Option<Vec<String>> {
        self.file_tags.read().ok()?.get(file_id).cloned()
    }

    /// Consume one injected failure, if any remain.
    fn injected_failure(&self, op: &str) -> PersistenceResult<()> {
        let took = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if took {
            Err(PersistenceError::Rejected(format!("injected failure on {}", op)))
        } else {
            Ok(())
        }
    }
}

impl Persistence for MemoryPersistence {
    fn create_shape(&self, record: ShapeRecord) -> BoxFuture<'_, PersistenceResult<ShapeRecord>> {
        Box::pin(async move {
            self.calls.create.fetch_add(1, Ordering::SeqCst);
            self.injected_failure("create")?;
            let mut records = self.records.write().map_err(lock_error)?;
            records.insert(record.id, record.clone());
            Ok(record)
        })
    }

    fn update_shape(
        &self,
        id: ShapeId,
        patch: RecordPatch,
    ) -> BoxFuture<'_, PersistenceResult<ShapeRecord>> {
        Box::pin(async move {
            self.calls.update.fetch_add(1, Ordering::SeqCst);
            self.injected_failure("update")?;
            let mut records = self.records.write().map_err(lock_error)?;
            let record = records
                .get_mut(&id)
                .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?;
            patch.apply_to(record);
            Ok(record.clone())
        })
    }

    fn delete_shape(&self, id: ShapeId) -> BoxFuture<'_, PersistenceResult<()>> {
        Box::pin(async move {
            self.calls.delete.fetch_add(1, Ordering::SeqCst);
            self.injected_failure("delete")?;
            let mut records = self.records.write().map_err(lock_error)?;
            records.remove(&id);
            Ok(())
        })
    }

    fn get_shapes_by_file_ids(
        &self,
        file_ids: Vec<String>,
    ) -> BoxFuture<'_, PersistenceResult<Vec<ShapeRecord>>> {
        Box::pin(async move {
            self.calls.fetch.fetch_add(1, Ordering::SeqCst);
            self.injected_failure("fetch")?;
            let records = self.records.read().map_err(lock_error)?;
            Ok(records
                .values()
                .filter(|r| file_ids.contains(&r.file_id))
                .cloned()
                .collect())
        })
    }

    fn update_multiple_file_tags(
        &self,
        file_ids: Vec<String>,
        tag_ids: Vec<String>,
    ) -> BoxFuture<'_, PersistenceResult<()>> {
        Box::pin(async move {
            self.calls.tag.fetch_add(1, Ordering::SeqCst);
            self.injected_failure("tag")?;
            let mut tags = self.file_tags.write().map_err(lock_error)?;
            for file_id in file_ids {
                tags.insert(file_id, tag_ids.clone());
            }
            Ok(())
        })
    }
}
