//! Denormalized per-file record lists for list and thumbnail views.

use super::record::{RecordPatch, ShapeRecord};
use crate::shapes::ShapeId;
use std::collections::{BTreeMap, HashMap};

/// Native-space records grouped by media file.
///
/// Updated in the same step as the outbox enqueue, so it reflects local
/// state even when the backend call later fails.
#[derive(Debug, Clone, Default)]
pub struct FileShapeCache {
    files: BTreeMap<String, Vec<ShapeRecord>>,
    owners: HashMap<ShapeId, String>,
}

impl FileShapeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a file's records wholesale.
    pub fn load(&mut self, file_id: &str, records: Vec<ShapeRecord>) {
        self.clear_file(file_id);
        for record in &records {
            self.owners.insert(record.id, file_id.to_string());
        }
        self.files.insert(file_id.to_string(), records);
    }

    /// Insert a record, replacing any with the same id.
    pub fn upsert(&mut self, record: ShapeRecord) {
        if let Some(previous) = self.owners.get(&record.id).cloned() {
            if previous != record.file_id {
                self.remove(record.id);
            }
        }
        self.owners.insert(record.id, record.file_id.clone());
        let records = self.files.entry(record.file_id.clone()).or_default();
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }

    /// Merge a patch into a cached record. `false` if the id is unknown.
    pub fn apply_patch(&mut self, id: ShapeId, patch: &RecordPatch) -> bool {
        match self.get_mut(id) {
            Some(record) => {
                patch.apply_to(record);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: ShapeId) -> Option<ShapeRecord> {
        let file_id = self.owners.remove(&id)?;
        let records = self.files.get_mut(&file_id)?;
        let index = records.iter().position(|r| r.id == id)?;
        Some(records.remove(index))
    }

    pub fn get(&self, id: ShapeId) -> Option<&ShapeRecord> {
        let file_id = self.owners.get(&id)?;
        self.files.get(file_id)?.iter().find(|r| r.id == id)
    }

    fn get_mut(&mut self, id: ShapeId) -> Option<&mut ShapeRecord> {
        let file_id = self.owners.get(&id)?;
        self.files.get_mut(file_id)?.iter_mut().find(|r| r.id == id)
    }

    /// Records of one file; empty if the file was never cached.
    pub fn records(&self, file_id: &str) -> &[ShapeRecord] {
        self.files.get(file_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, file_id: &str) -> usize {
        self.records(file_id).len()
    }

    pub fn file_ids(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn clear_file(&mut self, file_id: &str) {
        if let Some(records) = self.files.remove(file_id) {
            for record in records {
                self.owners.remove(&record.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::FileContext;
    use crate::scale::Scale;
    use crate::shapes::{BoxGeometry, Circle, Shape, ShapeMeta, StrokeColor};

    fn record(file: &str) -> ShapeRecord {
        let meta = ShapeMeta::new(&FileContext::new("o", "p", file), StrokeColor::black(), 2.0);
        let shape: Shape = Circle::new(meta, BoxGeometry::new(0.0, 0.0, 5.0, 5.0)).into();
        Scale::identity().shape_to_record(&shape, 1)
    }

    #[test]
    fn test_upsert_patch_remove() {
        let mut cache = FileShapeCache::new();
        let rec = record("a");
        let id = rec.id;
        cache.upsert(rec.clone());
        cache.upsert(rec);
        assert_eq!(cache.count("a"), 1);

        let patch = RecordPatch {
            x: Some(42.0),
            ..RecordPatch::default()
        };
        assert!(cache.apply_patch(id, &patch));
        assert_eq!(cache.get(id).unwrap().x, Some(42.0));

        assert!(cache.remove(id).is_some());
        assert!(cache.remove(id).is_none());
        assert!(!cache.apply_patch(id, &patch));
        assert!(cache.records("a").is_empty());
    }

    #[test]
    fn test_load_replaces_file() {
        let mut cache = FileShapeCache::new();
        let stale = record("a");
        let stale_id = stale.id;
        cache.upsert(stale);
        cache.upsert(record("b"));
        cache.load("a", vec![record("a"), record("a")]);

        assert_eq!(cache.count("a"), 2);
        assert_eq!(cache.count("b"), 1);
        assert!(cache.get(stale_id).is_none());
        assert_eq!(cache.records("missing").len(), 0);
        assert_eq!(cache.file_ids().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
