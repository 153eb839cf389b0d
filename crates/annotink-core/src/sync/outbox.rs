//! Durable queue of pending persistence calls.
//!
//! Every committed mutation becomes an [`OutboxEntry`]. [`Outbox::dispatch`]
//! drains due entries in order, retries failures with exponential backoff
//! and parks entries that keep failing in a dead-letter list. Later entries
//! for a shape wait while an earlier one for the same shape is failing, and
//! follow it into the dead-letter list when it is parked, so the backend
//! sees each shape's calls in the order they were made.

use super::record::{RecordPatch, ShapeRecord};
use crate::config::SyncConfig;
use crate::shapes::ShapeId;
use crate::storage::{Persistence, PersistenceResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::time::Instant;

/// A persistence call waiting to be made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Intent {
    CreateShape(ShapeRecord),
    #[serde(rename_all = "camelCase")]
    UpdateShape { id: ShapeId, patch: RecordPatch },
    DeleteShape { id: ShapeId },
    #[serde(rename_all = "camelCase")]
    TagFiles {
        file_ids: Vec<String>,
        tag_ids: Vec<String>,
    },
}

impl Intent {
    /// The shape this call is about; `None` for file tagging.
    pub fn shape_id(&self) -> Option<ShapeId> {
        match self {
            Intent::CreateShape(record) => Some(record.id),
            Intent::UpdateShape { id, .. } | Intent::DeleteShape { id } => Some(*id),
            Intent::TagFiles { .. } => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Intent::CreateShape(_) => "create",
            Intent::UpdateShape { .. } => "update",
            Intent::DeleteShape { .. } => "delete",
            Intent::TagFiles { .. } => "tag",
        }
    }

    async fn execute(&self, persistence: &dyn Persistence) -> PersistenceResult<()> {
        match self.clone() {
            Intent::CreateShape(record) => persistence.create_shape(record).await.map(drop),
            Intent::UpdateShape { id, patch } => persistence.update_shape(id, patch).await.map(drop),
            Intent::DeleteShape { id } => persistence.delete_shape(id).await,
            Intent::TagFiles { file_ids, tag_ids } => {
                persistence.update_multiple_file_tags(file_ids, tag_ids).await
            }
        }
    }
}

/// One queued intent with its retry bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntry {
    pub seq: u64,
    pub intent: Intent,
    /// Failed attempts so far.
    pub attempts: u32,
    pub last_error: Option<String>,
    /// Earliest time of the next attempt. Not persisted; a reloaded entry
    /// is due immediately.
    #[serde(skip)]
    pub not_before: Option<Instant>,
}

impl OutboxEntry {
    fn is_due(&self, now: Instant) -> bool {
        self.not_before.is_none_or(|t| t <= now)
    }
}

/// Outcome of one [`Outbox::dispatch`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Sequence numbers of entries the backend accepted.
    pub acknowledged: Vec<u64>,
    /// Entries that failed and were rescheduled.
    pub failed: usize,
    /// Entries moved to the dead-letter list during this pass.
    pub dead_lettered: usize,
    /// Entries still inside their backoff window.
    pub deferred: usize,
    /// Entries waiting behind an earlier entry for the same shape.
    pub held: usize,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.dead_lettered == 0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outbox {
    next_seq: u64,
    pending: VecDeque<OutboxEntry>,
    dead_letters: Vec<OutboxEntry>,
    #[serde(skip)]
    config: SyncConfig,
}

impl Outbox {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &OutboxEntry> {
        self.pending.iter()
    }

    pub fn dead_letters(&self) -> &[OutboxEntry] {
        &self.dead_letters
    }

    /// Put every dead letter back into the queue with its attempt count
    /// reset, in original sequence order. Returns how many were requeued.
    pub fn requeue_dead_letters(&mut self) -> usize {
        let count = self.dead_letters.len();
        for mut entry in self.dead_letters.drain(..) {
            entry.attempts = 0;
            entry.not_before = None;
            self.pending.push_back(entry);
        }
        self.pending.make_contiguous().sort_by_key(|e| e.seq);
        count
    }

    /// Earliest time a backed-off entry becomes due.
    pub fn next_attempt_at(&self) -> Option<Instant> {
        self.pending.iter().filter_map(|e| e.not_before).min()
    }

    /// Queue an intent. Returns the sequence number of the entry that now
    /// carries it, or `None` if it cancelled out a create that was never
    /// sent.
    ///
    /// An intent folds into the latest entry for the same shape when that
    /// entry has never been attempted: an update merges into a pending
    /// create or update, and a delete drops every unsent entry for the
    /// shape (and itself, if one of those was the create).
    pub fn enqueue(&mut self, intent: Intent) -> Option<u64> {
        if let Some(id) = intent.shape_id() {
            match &intent {
                Intent::UpdateShape { patch, .. } => {
                    if let Some(seq) = self.fold_update(id, patch) {
                        return Some(seq);
                    }
                }
                Intent::DeleteShape { .. } => {
                    let before = self.pending.len();
                    let mut dropped_create = false;
                    self.pending.retain(|e| {
                        let unsent = e.attempts == 0 && e.intent.shape_id() == Some(id);
                        if unsent && matches!(e.intent, Intent::CreateShape(_)) {
                            dropped_create = true;
                        }
                        !unsent
                    });
                    if before != self.pending.len() {
                        log::debug!("outbox dropped {} unsent entries for {}", before - self.pending.len(), id);
                    }
                    if dropped_create {
                        return None;
                    }
                }
                _ => {}
            }
        }
        Some(self.push(intent))
    }

    fn fold_update(&mut self, id: ShapeId, patch: &RecordPatch) -> Option<u64> {
        let last = self
            .pending
            .iter_mut()
            .rev()
            .find(|e| e.intent.shape_id() == Some(id))?;
        if last.attempts > 0 {
            return None;
        }
        match &mut last.intent {
            Intent::CreateShape(record) => patch.apply_to(record),
            Intent::UpdateShape { patch: queued, .. } => queued.merge(patch.clone()),
            _ => return None,
        }
        Some(last.seq)
    }

    fn push(&mut self, intent: Intent) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        log::debug!("outbox #{} queued {}", seq, intent.label());
        self.pending.push_back(OutboxEntry {
            seq,
            intent,
            attempts: 0,
            last_error: None,
            not_before: None,
        });
        seq
    }

    /// Send every due entry, in order.
    pub async fn dispatch(&mut self, persistence: &dyn Persistence, now: Instant) -> DispatchReport {
        let mut report = DispatchReport::default();
        let mut blocked: HashSet<ShapeId> = HashSet::new();
        // Shapes with a parked entry; their later entries are parked too.
        let mut parked: HashSet<ShapeId> = self
            .dead_letters
            .iter()
            .filter_map(|e| e.intent.shape_id())
            .collect();
        let mut remaining = VecDeque::with_capacity(self.pending.len());

        while let Some(mut entry) = self.pending.pop_front() {
            let shape = entry.intent.shape_id();
            if shape.is_some_and(|id| parked.contains(&id)) {
                log::warn!(
                    "outbox #{} {} parked behind a dead letter for the same shape",
                    entry.seq,
                    entry.intent.label()
                );
                report.dead_lettered += 1;
                self.dead_letters.push(entry);
                continue;
            }
            if shape.is_some_and(|id| blocked.contains(&id)) {
                report.held += 1;
                remaining.push_back(entry);
                continue;
            }
            if !entry.is_due(now) {
                report.deferred += 1;
                blocked.extend(shape);
                remaining.push_back(entry);
                continue;
            }

            match entry.intent.execute(persistence).await {
                Ok(()) => {
                    log::info!("outbox #{} {} acknowledged", entry.seq, entry.intent.label());
                    report.acknowledged.push(entry.seq);
                }
                Err(e) => {
                    entry.attempts += 1;
                    entry.last_error = Some(e.to_string());
                    if entry.attempts >= self.config.max_attempts {
                        log::error!(
                            "outbox #{} {} dead-lettered after {} attempts: {}",
                            entry.seq,
                            entry.intent.label(),
                            entry.attempts,
                            e
                        );
                        report.dead_lettered += 1;
                        parked.extend(shape);
                        self.dead_letters.push(entry);
                    } else {
                        let delay = self.config.backoff(entry.attempts);
                        log::warn!(
                            "outbox #{} {} failed (attempt {}), retrying in {:?}: {}",
                            entry.seq,
                            entry.intent.label(),
                            entry.attempts,
                            delay,
                            e
                        );
                        entry.not_before = Some(now + delay);
                        report.failed += 1;
                        blocked.extend(shape);
                        remaining.push_back(entry);
                    }
                }
            }
        }

        self.pending = remaining;
        report
    }

    /// Serialize pending entries and dead letters.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Restore a saved outbox. Every entry is due immediately.
    pub fn from_json(json: &str, config: SyncConfig) -> Result<Self, serde_json::Error> {
        let mut outbox: Self = serde_json::from_str(json)?;
        outbox.config = config;
        Ok(outbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::FileContext;
    use crate::scale::Scale;
    use crate::shapes::{BoxGeometry, Rectangle, Shape, ShapeMeta, StrokeColor};
    use crate::storage::MemoryPersistence;
    use pollster::block_on;
    use std::time::Duration;

    fn config() -> SyncConfig {
        SyncConfig {
            retry_base_ms: 100,
            retry_max_ms: 1000,
            max_attempts: 3,
        }
    }

    fn record() -> ShapeRecord {
        let meta = ShapeMeta::new(&FileContext::new("o", "p", "f"), StrokeColor::black(), 2.0);
        let shape: Shape = Rectangle::new(meta, BoxGeometry::new(0.0, 0.0, 5.0, 5.0)).into();
        Scale::identity().shape_to_record(&shape, 1)
    }

    fn rename(id: ShapeId, name: &str) -> Intent {
        Intent::UpdateShape {
            id,
            patch: RecordPatch {
                name: Some(name.into()),
                ..RecordPatch::default()
            },
        }
    }

    #[test]
    fn test_update_folds_into_unsent_create() {
        let mut outbox = Outbox::new(config());
        let rec = record();
        let id = rec.id;
        let seq = outbox.enqueue(Intent::CreateShape(rec));
        assert_eq!(outbox.enqueue(rename(id, "car")), seq);
        assert_eq!(outbox.len(), 1);
        match &outbox.pending().next().unwrap().intent {
            Intent::CreateShape(r) => assert_eq!(r.name, "car"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_delete_cancels_unsent_create() {
        let mut outbox = Outbox::new(config());
        let rec = record();
        let id = rec.id;
        outbox.enqueue(Intent::CreateShape(rec));
        outbox.enqueue(rename(id, "car"));
        assert_eq!(outbox.enqueue(Intent::DeleteShape { id }), None);
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_dispatch_acknowledges_in_order() {
        let storage = MemoryPersistence::new();
        let mut outbox = Outbox::new(config());
        let rec = record();
        let id = rec.id;
        outbox.enqueue(Intent::CreateShape(rec));
        outbox.enqueue(Intent::TagFiles {
            file_ids: vec!["f".into()],
            tag_ids: vec!["t".into()],
        });

        let report = block_on(outbox.dispatch(&storage, Instant::now()));
        assert_eq!(report.acknowledged, vec![0, 1]);
        assert!(report.is_clean());
        assert!(outbox.is_empty());
        assert!(storage.record(id).is_some());

        // Sent entries are no longer folded into.
        outbox.enqueue(rename(id, "car"));
        block_on(outbox.dispatch(&storage, Instant::now()));
        assert_eq!(storage.record(id).unwrap().name, "car");
    }

    #[test]
    fn test_failure_backs_off_and_holds_same_shape() {
        let storage = MemoryPersistence::new();
        let mut outbox = Outbox::new(config());
        let rec = record();
        let id = rec.id;
        let other = record();
        outbox.enqueue(Intent::CreateShape(rec));
        outbox.enqueue(Intent::CreateShape(other.clone()));

        let now = Instant::now();
        storage.fail_next(1);
        let report = block_on(outbox.dispatch(&storage, now));
        assert_eq!(report.failed, 1);
        assert_eq!(report.acknowledged, vec![1]);

        // A later update for the failing shape waits behind its create.
        outbox.enqueue(rename(id, "car"));
        let report = block_on(outbox.dispatch(&storage, now + Duration::from_millis(50)));
        assert_eq!(report.deferred, 1);
        assert_eq!(report.held, 1);
        assert!(storage.record(id).is_none());

        let report = block_on(outbox.dispatch(&storage, now + Duration::from_millis(100)));
        assert_eq!(report.acknowledged.len(), 2);
        assert_eq!(storage.record(id).unwrap().name, "car");
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_dead_letter_and_requeue() {
        let storage = MemoryPersistence::new();
        let mut outbox = Outbox::new(config());
        outbox.enqueue(Intent::DeleteShape {
            id: uuid::Uuid::new_v4(),
        });
        storage.fail_next(10);

        let mut now = Instant::now();
        for _ in 0..3 {
            block_on(outbox.dispatch(&storage, now));
            now += Duration::from_secs(5);
        }
        assert!(outbox.is_empty());
        assert_eq!(outbox.dead_letters().len(), 1);
        assert_eq!(outbox.dead_letters()[0].attempts, 3);
        assert!(outbox.dead_letters()[0].last_error.is_some());

        storage.fail_next(0);
        assert_eq!(outbox.requeue_dead_letters(), 1);
        let report = block_on(outbox.dispatch(&storage, now));
        assert_eq!(report.acknowledged.len(), 1);
        assert!(outbox.dead_letters().is_empty());
    }

    #[test]
    fn test_dead_letter_parks_later_entries_for_shape() {
        let storage = MemoryPersistence::new();
        let mut outbox = Outbox::new(SyncConfig {
            max_attempts: 2,
            ..config()
        });
        let record = record();
        let id = record.id;
        outbox.enqueue(Intent::CreateShape(record));

        storage.fail_next(1);
        let mut now = Instant::now();
        block_on(outbox.dispatch(&storage, now));
        // The create was attempted, so the rename is a separate entry.
        outbox.enqueue(rename(id, "x"));
        assert_eq!(outbox.len(), 2);

        storage.fail_next(1);
        now += Duration::from_secs(5);
        let report = block_on(outbox.dispatch(&storage, now));
        assert_eq!(report.dead_lettered, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(storage.calls().update, 0);
        assert!(outbox.is_empty());

        // A later edit waits behind the parked create as well.
        outbox.enqueue(rename(id, "y"));
        let report = block_on(outbox.dispatch(&storage, now));
        assert_eq!(report.dead_lettered, 1);
        assert_eq!(storage.calls().update, 0);

        assert_eq!(outbox.requeue_dead_letters(), 3);
        let seqs: Vec<u64> = outbox.pending().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        let report = block_on(outbox.dispatch(&storage, now));
        assert_eq!(report.acknowledged, vec![0, 1, 2]);
        assert_eq!(storage.record(id).unwrap().name, "y");
    }

    #[test]
    fn test_json_roundtrip_makes_entries_due() {
        let storage = MemoryPersistence::new();
        let mut outbox = Outbox::new(config());
        outbox.enqueue(Intent::CreateShape(record()));
        storage.fail_next(1);
        let now = Instant::now();
        block_on(outbox.dispatch(&storage, now));
        assert!(outbox.next_attempt_at().is_some());

        let json = outbox.to_json().unwrap();
        assert!(json.contains("\"op\":\"createShape\""));
        let mut restored = Outbox::from_json(&json, config()).unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored.pending().next().unwrap().attempts, 1);
        assert!(restored.next_attempt_at().is_none());

        let report = block_on(restored.dispatch(&storage, now));
        assert_eq!(report.acknowledged, vec![0]);
        // Sequence numbering continues after a restore.
        assert_eq!(restored.enqueue(Intent::DeleteShape { id: uuid::Uuid::new_v4() }), Some(1));
    }
}
