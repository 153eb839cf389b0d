//! File-based persistence for offline sessions.

use super::{BoxFuture, Persistence, PersistenceError, PersistenceResult};
use crate::shapes::ShapeId;
use crate::sync::{RecordPatch, ShapeRecord};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Contents of one media file's JSON document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct FileDocument {
    #[serde(default)]
    shapes: Vec<ShapeRecord>,
    #[serde(default)]
    tags: Vec<String>,
}

/// Stores one `<file_id>.json` document per media file.
pub struct FilePersistence {
    /// Base directory for the documents.
    base_path: PathBuf,
    /// Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl FilePersistence {
    /// Create a file persistence rooted at `base_path`.
    ///
    /// Creates the directory if it doesn't exist.
    pub fn new(base_path: PathBuf) -> PersistenceResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                PersistenceError::Io(format!("Failed to create storage directory: {}", e))
            })?;
        }
        Ok(Self {
            base_path,
            write_lock: Mutex::new(()),
        })
    }

    /// Create file persistence in the default location.
    ///
    /// On Unix: `~/.local/share/annotink/annotations/`
    /// On Windows: `%LOCALAPPDATA%\annotink\annotations\`
    pub fn default_location() -> PersistenceResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| PersistenceError::Io("Could not determine home directory".to_string()))?;
        Self::new(base.join("annotink").join("annotations"))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn document_path(&self, file_id: &str) -> PathBuf {
        let safe_id: String = file_id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_path.join(format!("{}.json", safe_id))
    }

    fn read_document(path: &Path) -> PersistenceResult<FileDocument> {
        if !path.exists() {
            return Ok(FileDocument::default());
        }
        let json = fs::read_to_string(path).map_err(|e| {
            PersistenceError::Io(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&json).map_err(|e| {
            PersistenceError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    fn write_document(path: &Path, document: &FileDocument) -> PersistenceResult<()> {
        let json = serde_json::to_string_pretty(document)
            .map_err(|e| PersistenceError::Serialization(e.to_string()))?;
        fs::write(path, json).map_err(|e| {
            PersistenceError::Io(format!("Failed to write {}: {}", path.display(), e))
        })
    }

    /// Every document path in the base directory.
    fn document_paths(&self) -> PersistenceResult<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.base_path)
            .map_err(|e| PersistenceError::Io(format!("Failed to read directory: {}", e)))?;
        Ok(entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|e| e == "json"))
            .collect())
    }

    /// Find the document holding shape `id`, with the shape's index in it.
    fn locate(&self, id: ShapeId) -> PersistenceResult<Option<(PathBuf, FileDocument, usize)>> {
        for path in self.document_paths()? {
            let document = Self::read_document(&path)?;
            if let Some(index) = document.shapes.iter().position(|r| r.id == id) {
                return Ok(Some((path, document, index)));
            }
        }
        Ok(None)
    }

    fn lock(&self) -> PersistenceResult<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|e| PersistenceError::Other(format!("Lock error: {}", e)))
    }
}

impl Persistence for FilePersistence {
    fn create_shape(&self, record: ShapeRecord) -> BoxFuture<'_, PersistenceResult<ShapeRecord>> {
        Box::pin(async move {
            let _guard = self.lock()?;
            let path = self.document_path(&record.file_id);
            let mut document = Self::read_document(&path)?;
            match document.shapes.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => document.shapes.push(record.clone()),
            }
            Self::write_document(&path, &document)?;
            Ok(record)
        })
    }

    fn update_shape(
        &self,
        id: ShapeId,
        patch: RecordPatch,
    ) -> BoxFuture<'_, PersistenceResult<ShapeRecord>> {
        Box::pin(async move {
            let _guard = self.lock()?;
            let (path, mut document, index) = self
                .locate(id)?
                .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?;
            patch.apply_to(&mut document.shapes[index]);
            let updated = document.shapes[index].clone();
            Self::write_document(&path, &document)?;
            Ok(updated)
        })
    }

    fn delete_shape(&self, id: ShapeId) -> BoxFuture<'_, PersistenceResult<()>> {
        Box::pin(async move {
            let _guard = self.lock()?;
            if let Some((path, mut document, index)) = self.locate(id)? {
                document.shapes.remove(index);
                Self::write_document(&path, &document)?;
            }
            Ok(())
        })
    }

    fn get_shapes_by_file_ids(
        &self,
        file_ids: Vec<String>,
    ) -> BoxFuture<'_, PersistenceResult<Vec<ShapeRecord>>> {
        Box::pin(async move {
            let mut records = Vec::new();
            for file_id in &file_ids {
                let document = Self::read_document(&self.document_path(file_id))?;
                records.extend(document.shapes);
            }
            Ok(records)
        })
    }

    fn update_multiple_file_tags(
        &self,
        file_ids: Vec<String>,
        tag_ids: Vec<String>,
    ) -> BoxFuture<'_, PersistenceResult<()>> {
        Box::pin(async move {
            let _guard = self.lock()?;
            for file_id in &file_ids {
                let path = self.document_path(file_id);
                let mut document = Self::read_document(&path)?;
                document.tags = tag_ids.clone();
                Self::write_document(&path, &document)?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::FileContext;
    use crate::scale::Scale;
    use crate::shapes::{DisplayPoint, Line, Shape, ShapeMeta, StrokeColor};
    use pollster::block_on;
    use tempfile::tempdir;

    fn record(file: &str) -> ShapeRecord {
        let meta = ShapeMeta::new(&FileContext::new("o", "p", file), StrokeColor::black(), 2.0);
        let shape: Shape = Line::new(
            meta,
            vec![DisplayPoint::new(0.0, 0.0), DisplayPoint::new(4.0, 4.0)],
        )
        .into();
        Scale::identity().shape_to_record(&shape, 1)
    }

    #[test]
    fn test_create_fetch_roundtrip() {
        let dir = tempdir().unwrap();
        let storage = FilePersistence::new(dir.path().to_path_buf()).unwrap();
        let rec = record("img-1");
        block_on(storage.create_shape(rec.clone())).unwrap();
        block_on(storage.create_shape(record("img-2"))).unwrap();

        let loaded = block_on(storage.get_shapes_by_file_ids(vec!["img-1".into()])).unwrap();
        assert_eq!(loaded, vec![rec]);
        assert!(dir.path().join("img-1.json").exists());
    }

    #[test]
    fn test_update_finds_shape_in_any_file() {
        let dir = tempdir().unwrap();
        let storage = FilePersistence::new(dir.path().to_path_buf()).unwrap();
        let rec = record("img-2");
        let id = rec.id;
        block_on(storage.create_shape(record("img-1"))).unwrap();
        block_on(storage.create_shape(rec)).unwrap();

        let patch = RecordPatch {
            notes: Some("blurry".into()),
            ..RecordPatch::default()
        };
        let updated = block_on(storage.update_shape(id, patch)).unwrap();
        assert_eq!(updated.notes.as_deref(), Some("blurry"));

        let ghost = block_on(storage.update_shape(uuid::Uuid::new_v4(), RecordPatch::default()));
        assert!(matches!(ghost, Err(PersistenceError::NotFound(_))));
    }

    #[test]
    fn test_delete_and_tags() {
        let dir = tempdir().unwrap();
        let storage = FilePersistence::new(dir.path().to_path_buf()).unwrap();
        let rec = record("img-1");
        let id = rec.id;
        block_on(storage.create_shape(rec)).unwrap();
        block_on(storage.update_multiple_file_tags(vec!["img-1".into()], vec!["dog".into()]))
            .unwrap();
        block_on(storage.delete_shape(id)).unwrap();
        block_on(storage.delete_shape(id)).unwrap();

        let loaded = block_on(storage.get_shapes_by_file_ids(vec!["img-1".into()])).unwrap();
        assert!(loaded.is_empty());
        let json = fs::read_to_string(dir.path().join("img-1.json")).unwrap();
        assert!(json.contains("dog"));
    }

    #[test]
    fn test_corrupt_document() {
        let dir = tempdir().unwrap();
        let storage = FilePersistence::new(dir.path().to_path_buf()).unwrap();
        fs::write(dir.path().join("bad.json"), "{nope").unwrap();
        let result = block_on(storage.get_shapes_by_file_ids(vec!["bad".into()]));
        assert!(matches!(result, Err(PersistenceError::Serialization(_))));
    }
}
