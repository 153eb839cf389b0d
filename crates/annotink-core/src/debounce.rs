//! Idle-time debouncing for free-text edits.
//!
//! Geometry syncs as soon as a gesture completes. Notes and other typed
//! text only sync once the user has stopped typing for the configured
//! interval.

use crate::shapes::{ShapeId, ShapeKind};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A shape with unsynced text edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyText {
    pub kind: ShapeKind,
    pub frame: Option<u32>,
    /// Time of the latest keystroke.
    pub last_edit: Instant,
}

/// Tracks which shapes have text waiting to be synced.
#[derive(Debug, Clone)]
pub struct TextDebouncer {
    interval: Duration,
    pending: HashMap<ShapeId, DirtyText>,
}

impl TextDebouncer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            pending: HashMap::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Record an edit. Each edit restarts the shape's idle timer.
    pub fn mark(&mut self, id: ShapeId, kind: ShapeKind, frame: Option<u32>, now: Instant) {
        self.pending.insert(
            id,
            DirtyText {
                kind,
                frame,
                last_edit: now,
            },
        );
    }

    pub fn is_pending(&self, id: ShapeId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Remove and return the shapes idle for at least the interval.
    pub fn due(&mut self, now: Instant) -> Vec<(ShapeId, DirtyText)> {
        let interval = self.interval;
        let ready: Vec<ShapeId> = self
            .pending
            .iter()
            .filter(|(_, d)| now.saturating_duration_since(d.last_edit) >= interval)
            .map(|(id, _)| *id)
            .collect();
        ready
            .into_iter()
            .filter_map(|id| self.pending.remove_entry(&id))
            .collect()
    }

    /// Remove and return every pending shape regardless of idle time.
    pub fn flush_all(&mut self) -> Vec<(ShapeId, DirtyText)> {
        self.pending.drain().collect()
    }

    /// Drop a shape's pending edits (it was deleted).
    pub fn forget(&mut self, id: ShapeId) -> bool {
        self.pending.remove(&id).is_some()
    }
}
