//! Turns committed store mutations into outbox intents.

use super::cache::FileShapeCache;
use super::outbox::{DispatchReport, Intent, Outbox};
use super::record::{ShapeRecord, DEFAULT_FRAME};
use crate::config::SyncConfig;
use crate::history::Command;
use crate::scale::Scale;
use crate::shapes::{Shape, ShapeId, ShapePatch};
use crate::storage::Persistence;
use std::collections::{HashMap, HashSet};
use std::time::Instant;

/// Converts display-space changes to native payloads with the scale passed
/// in at call time, queues them, and mirrors them into the file cache.
///
/// Only shapes that have been persisted (loaded from the backend or
/// confirmed by the user) produce update and delete intents. A shape that is
/// still being drawn has nothing on the backend to change.
#[derive(Debug, Clone, Default)]
pub struct SyncBridge {
    outbox: Outbox,
    cache: FileShapeCache,
    /// Shapes believed to exist on the backend.
    live: HashSet<ShapeId>,
    /// Shapes that were persisted at some point, live or not.
    known: HashSet<ShapeId>,
}

impl SyncBridge {
    pub fn new(config: SyncConfig) -> Self {
        Self::with_outbox(Outbox::new(config))
    }

    /// Resume with a previously saved outbox.
    pub fn with_outbox(outbox: Outbox) -> Self {
        Self {
            outbox,
            ..Self::default()
        }
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn outbox_mut(&mut self) -> &mut Outbox {
        &mut self.outbox
    }

    pub fn cache(&self) -> &FileShapeCache {
        &self.cache
    }

    pub fn is_live(&self, id: ShapeId) -> bool {
        self.live.contains(&id)
    }

    /// Register the persisted records of a file that was just opened.
    pub fn load_file(&mut self, file_id: &str, records: Vec<ShapeRecord>) {
        for record in &records {
            self.live.insert(record.id);
            self.known.insert(record.id);
        }
        self.cache.load(file_id, records);
    }

    /// Queue the create of a confirmed shape.
    pub fn shape_created(&mut self, shape: &Shape, at_frame: u32, scale: &Scale) -> ShapeRecord {
        let record = scale.shape_to_record(shape, at_frame);
        self.live.insert(record.id);
        self.known.insert(record.id);
        self.cache.upsert(record.clone());
        self.outbox.enqueue(Intent::CreateShape(record.clone()));
        record
    }

    /// Queue the changed fields of a persisted shape. Returns `false` when
    /// nothing was queued.
    pub fn shape_updated(&mut self, id: ShapeId, patch: &ShapePatch, scale: &Scale) -> bool {
        if !self.live.contains(&id) {
            return false;
        }
        let native = scale.patch_to_native(patch);
        if native.is_empty() {
            return false;
        }
        self.cache.apply_patch(id, &native);
        self.outbox.enqueue(Intent::UpdateShape { id, patch: native });
        true
    }

    /// Queue the delete of a persisted shape.
    pub fn shape_deleted(&mut self, id: ShapeId) -> bool {
        if !self.live.remove(&id) {
            return false;
        }
        self.cache.remove(id);
        self.outbox.enqueue(Intent::DeleteShape { id });
        true
    }

    pub fn tag_files(&mut self, intent: Intent) {
        self.outbox.enqueue(intent);
    }

    /// Bring the backend in line with a command that undo or redo just
    /// applied locally. Returns how many intents were queued.
    pub fn reconcile(&mut self, applied: &Command, scale: &Scale) -> usize {
        let at_frame = applied.frame().unwrap_or(DEFAULT_FRAME);
        match applied {
            Command::Insert { shape, .. } => self.restore(shape, at_frame, scale) as usize,
            Command::Remove { shape, .. } => self.shape_deleted(shape.id()) as usize,
            Command::Replace { after, .. } => {
                self.shape_updated(after.id(), &ShapePatch::snapshot(after), scale) as usize
            }
            Command::ReplaceBucket { before, after, .. } => {
                let old: HashMap<ShapeId, &Shape> = before.iter().map(|s| (s.id(), s)).collect();
                let new: HashSet<ShapeId> = after.iter().map(Shape::id).collect();
                let mut queued = 0;
                for shape in before.iter().filter(|s| !new.contains(&s.id())) {
                    queued += self.shape_deleted(shape.id()) as usize;
                }
                for shape in after {
                    queued += match old.get(&shape.id()) {
                        Some(prev) if *prev == shape => 0,
                        Some(_) => {
                            self.shape_updated(shape.id(), &ShapePatch::snapshot(shape), scale)
                                as usize
                        }
                        None => self.restore(shape, at_frame, scale) as usize,
                    };
                }
                queued
            }
        }
    }

    /// Re-create a shape that was persisted before and is gone now.
    fn restore(&mut self, shape: &Shape, at_frame: u32, scale: &Scale) -> bool {
        let id = shape.id();
        if !self.known.contains(&id) || self.live.contains(&id) {
            return false;
        }
        self.shape_created(shape, at_frame, scale);
        true
    }

    /// Forget the live set (file switch). The outbox keeps its entries.
    pub fn clear_tracking(&mut self) {
        self.live.clear();
        self.known.clear();
    }

    pub async fn dispatch(&mut self, persistence: &dyn Persistence, now: Instant) -> DispatchReport {
        self.outbox.dispatch(persistence, now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::FileContext;
    use crate::shapes::{BoxGeometry, DisplayPoint, Polygon, Rectangle, ShapeMeta, StrokeColor};
    use crate::storage::MemoryPersistence;
    use pollster::block_on;

    fn rect() -> Shape {
        let meta = ShapeMeta::new(&FileContext::new("o", "p", "f"), StrokeColor::black(), 2.0);
        Rectangle::new(meta, BoxGeometry::new(10.0, 10.0, 20.0, 20.0)).into()
    }

    fn half() -> Scale {
        Scale {
            scale_x: 0.5,
            scale_y: 0.5,
        }
    }

    #[test]
    fn test_create_uses_given_scale() {
        let mut bridge = SyncBridge::new(SyncConfig::default());
        let shape = rect();
        let record = bridge.shape_created(&shape, 4, &half());
        assert_eq!(record.x, Some(20.0));
        assert_eq!(record.width, Some(40.0));
        assert_eq!(record.at_frame, 4);
        assert_eq!(bridge.cache().count("f"), 1);
        assert_eq!(bridge.outbox().len(), 1);
    }

    #[test]
    fn test_unpersisted_shapes_are_not_synced() {
        let mut bridge = SyncBridge::new(SyncConfig::default());
        let shape = rect();
        let patch = ShapePatch::with_bounds(BoxGeometry::new(0.0, 0.0, 1.0, 1.0));
        assert!(!bridge.shape_updated(shape.id(), &patch, &Scale::identity()));
        assert!(!bridge.shape_deleted(shape.id()));
        assert!(bridge.outbox().is_empty());
    }

    #[test]
    fn test_update_sends_only_changed_fields() {
        let storage = MemoryPersistence::new();
        let mut bridge = SyncBridge::new(SyncConfig::default());
        let shape = rect();
        let id = shape.id();
        bridge.shape_created(&shape, 1, &Scale::identity());
        block_on(bridge.dispatch(&storage, Instant::now()));

        let patch = ShapePatch {
            name: Some("dog".into()),
            ..ShapePatch::default()
        };
        assert!(bridge.shape_updated(id, &patch, &Scale::identity()));
        match &bridge.outbox().pending().next().unwrap().intent {
            Intent::UpdateShape { patch, .. } => {
                assert_eq!(patch.name.as_deref(), Some("dog"));
                assert!(patch.x.is_none() && patch.points.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(bridge.cache().get(id).unwrap().name, "dog");
    }

    #[test]
    fn test_reconcile_undo_of_delete_recreates() {
        let storage = MemoryPersistence::new();
        let mut bridge = SyncBridge::new(SyncConfig::default());
        let shape = rect();
        let id = shape.id();
        bridge.shape_created(&shape, 1, &Scale::identity());
        block_on(bridge.dispatch(&storage, Instant::now()));
        bridge.shape_deleted(id);
        block_on(bridge.dispatch(&storage, Instant::now()));
        assert!(storage.record(id).is_none());

        let undo = Command::Insert {
            frame: None,
            index: 0,
            shape: shape.clone(),
        };
        assert_eq!(bridge.reconcile(&undo, &Scale::identity()), 1);
        // Applying it again queues nothing: the shape is live already.
        assert_eq!(bridge.reconcile(&undo, &Scale::identity()), 0);
        block_on(bridge.dispatch(&storage, Instant::now()));
        assert!(storage.record(id).is_some());
    }

    #[test]
    fn test_reconcile_ignores_never_persisted_shapes() {
        let mut bridge = SyncBridge::new(SyncConfig::default());
        let poly: Shape = Polygon::new(
            ShapeMeta::new(&FileContext::new("o", "p", "f"), StrokeColor::black(), 2.0),
            vec![DisplayPoint::new(0.0, 0.0)],
        )
        .into();
        let insert = Command::Insert {
            frame: Some(3),
            index: 0,
            shape: poly.clone(),
        };
        assert_eq!(bridge.reconcile(&insert, &Scale::identity()), 0);
        assert_eq!(bridge.reconcile(&insert.invert(), &Scale::identity()), 0);
    }

    #[test]
    fn test_reconcile_bucket_diff() {
        let mut bridge = SyncBridge::new(SyncConfig::default());
        let (a, b) = (rect(), rect());
        let mut a_moved = a.clone();
        a_moved.translate(5.0, 0.0);
        bridge.load_file(
            "f",
            vec![
                Scale::identity().shape_to_record(&a, 1),
                Scale::identity().shape_to_record(&b, 1),
            ],
        );

        let command = Command::ReplaceBucket {
            frame: None,
            kind: a.kind(),
            before: vec![a, b.clone()],
            after: vec![a_moved],
        };
        // One update for `a`, one delete for `b`.
        assert_eq!(bridge.reconcile(&command, &Scale::identity()), 2);
        assert!(!bridge.is_live(b.id()));
        assert_eq!(bridge.cache().count("f"), 1);
    }
}
