//! Media files and the annotation metadata attached to them.
//!
//! Image files carry five flat record arrays; video files carry the same five
//! keys but each maps frame numbers to record arrays. Either layout is
//! accepted on load.

use crate::shapes::ShapeKind;
use crate::sync::ShapeRecord;
use kurbo::Size;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Ownership of a media file: which org/project/file a shape belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContext {
    pub org_id: String,
    pub project_id: String,
    pub file_id: String,
}

impl FileContext {
    pub fn new(
        org_id: impl Into<String>,
        project_id: impl Into<String>,
        file_id: impl Into<String>,
    ) -> Self {
        Self {
            org_id: org_id.into(),
            project_id: project_id.into(),
            file_id: file_id.into(),
        }
    }
}

/// Still image or frame-indexed video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// Flat per-kind record arrays of an image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatAnnotations {
    #[serde(default)]
    pub polygons: Vec<ShapeRecord>,
    #[serde(default)]
    pub rectangles: Vec<ShapeRecord>,
    #[serde(default)]
    pub circles: Vec<ShapeRecord>,
    #[serde(default)]
    pub faces: Vec<ShapeRecord>,
    #[serde(default)]
    pub lines: Vec<ShapeRecord>,
}

/// Frame-keyed per-kind record arrays of a video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FramedAnnotations {
    #[serde(default)]
    pub polygons: BTreeMap<u32, Vec<ShapeRecord>>,
    #[serde(default)]
    pub rectangles: BTreeMap<u32, Vec<ShapeRecord>>,
    #[serde(default)]
    pub circles: BTreeMap<u32, Vec<ShapeRecord>>,
    #[serde(default)]
    pub faces: BTreeMap<u32, Vec<ShapeRecord>>,
    #[serde(default)]
    pub lines: BTreeMap<u32, Vec<ShapeRecord>>,
}

/// Annotation metadata in either layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MediaAnnotations {
    Image(FlatAnnotations),
    Video(FramedAnnotations),
}

impl<'de> Deserialize<'de> for MediaAnnotations {
    /// Any kind key holding an object (rather than an array) selects the
    /// frame-keyed layout. Goes through `serde_json::Value` so frame keys,
    /// which are strings on the wire, parse as integers.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let framed = value
            .as_object()
            .is_some_and(|keys| keys.values().any(serde_json::Value::is_object));
        if framed {
            serde_json::from_value(value)
                .map(MediaAnnotations::Video)
                .map_err(D::Error::custom)
        } else {
            serde_json::from_value(value)
                .map(MediaAnnotations::Image)
                .map_err(D::Error::custom)
        }
    }
}

impl Default for MediaAnnotations {
    fn default() -> Self {
        MediaAnnotations::Image(FlatAnnotations::default())
    }
}

impl MediaAnnotations {
    /// All records, each tagged with its frame. Frame keys of the video
    /// layout override whatever `atFrame` the record carried.
    pub fn into_records(self) -> Vec<ShapeRecord> {
        match self {
            MediaAnnotations::Image(flat) => [
                flat.polygons,
                flat.rectangles,
                flat.circles,
                flat.faces,
                flat.lines,
            ]
            .into_iter()
            .flatten()
            .collect(),
            MediaAnnotations::Video(framed) => [
                framed.polygons,
                framed.rectangles,
                framed.circles,
                framed.faces,
                framed.lines,
            ]
            .into_iter()
            .flat_map(|by_frame| {
                by_frame.into_iter().flat_map(|(frame, records)| {
                    records.into_iter().map(move |mut record| {
                        record.at_frame = frame;
                        record
                    })
                })
            })
            .collect(),
        }
    }

    /// Group fetched records into the layout used by `kind`.
    pub fn from_records(kind: MediaKind, records: Vec<ShapeRecord>) -> Self {
        match kind {
            MediaKind::Image => {
                let mut flat = FlatAnnotations::default();
                for record in records {
                    let bucket = match record.kind {
                        ShapeKind::Polygon => &mut flat.polygons,
                        ShapeKind::Rectangle => &mut flat.rectangles,
                        ShapeKind::Circle => &mut flat.circles,
                        ShapeKind::Face => &mut flat.faces,
                        ShapeKind::Line => &mut flat.lines,
                    };
                    bucket.push(record);
                }
                MediaAnnotations::Image(flat)
            }
            MediaKind::Video => {
                let mut framed = FramedAnnotations::default();
                for record in records {
                    let bucket = match record.kind {
                        ShapeKind::Polygon => &mut framed.polygons,
                        ShapeKind::Rectangle => &mut framed.rectangles,
                        ShapeKind::Circle => &mut framed.circles,
                        ShapeKind::Face => &mut framed.faces,
                        ShapeKind::Line => &mut framed.lines,
                    };
                    bucket.entry(record.at_frame).or_default().push(record);
                }
                MediaAnnotations::Video(framed)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            MediaAnnotations::Image(f) => {
                f.polygons.is_empty()
                    && f.rectangles.is_empty()
                    && f.circles.is_empty()
                    && f.faces.is_empty()
                    && f.lines.is_empty()
            }
            MediaAnnotations::Video(v) => [&v.polygons, &v.rectangles, &v.circles, &v.faces, &v.lines]
                .iter()
                .all(|m| m.values().all(Vec::is_empty)),
        }
    }
}

/// A media file selected for annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFile {
    #[serde(flatten)]
    pub context: FileContext,
    pub kind: MediaKind,
    /// Natural pixel size, when known at load time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natural_size: Option<Size>,
    #[serde(default)]
    pub metadata: MediaAnnotations,
}

impl MediaFile {
    pub fn new(context: FileContext, kind: MediaKind) -> Self {
        Self {
            context,
            kind,
            natural_size: None,
            metadata: MediaAnnotations::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: MediaAnnotations) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_natural_size(mut self, size: Size) -> Self {
        self.natural_size = Some(size);
        self
    }

    pub fn id(&self) -> &str {
        &self.context.file_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record_json(kind: &str, frame: Option<u32>) -> serde_json::Value {
        let mut v = json!({
            "id": uuid::Uuid::new_v4(),
            "name": "n",
            "type": kind,
            "orgId": "o",
            "projectId": "p",
            "fileId": "f",
            "strokeWidth": 2.0,
            "x": 1.0, "y": 1.0, "width": 2.0, "height": 2.0,
            "stroke": "#00ff00"
        });
        if let Some(frame) = frame {
            v["atFrame"] = json!(frame);
        }
        v
    }

    #[test]
    fn test_parse_image_layout() {
        let metadata = json!({
            "polygons": [],
            "rectangles": [record_json("rectangle", None)],
            "circles": [],
            "faces": [],
            "lines": []
        });
        let parsed: MediaAnnotations = serde_json::from_value(metadata).unwrap();
        assert!(matches!(parsed, MediaAnnotations::Image(_)));
        let records = parsed.into_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].at_frame, 1);
    }

    #[test]
    fn test_parse_video_layout() {
        let metadata = json!({
            "rectangles": {
                "5": [record_json("rectangle", Some(99))],
                "6": [record_json("rectangle", None), record_json("rectangle", None)]
            },
            "circles": {}
        });
        let parsed: MediaAnnotations = serde_json::from_value(metadata).unwrap();
        assert!(matches!(parsed, MediaAnnotations::Video(_)));
        let mut frames: Vec<u32> = parsed.into_records().iter().map(|r| r.at_frame).collect();
        frames.sort_unstable();
        assert_eq!(frames, vec![5, 6, 6]);
    }

    #[test]
    fn test_from_records_groups_by_frame() {
        let records: Vec<ShapeRecord> = [3, 3, 8]
            .into_iter()
            .map(|f| serde_json::from_value(record_json("circle", Some(f))).unwrap())
            .collect();
        let MediaAnnotations::Video(framed) = MediaAnnotations::from_records(MediaKind::Video, records)
        else {
            panic!("expected video layout");
        };
        assert_eq!(framed.circles[&3].len(), 2);
        assert_eq!(framed.circles[&8].len(), 1);
        assert!(framed.rectangles.is_empty());
    }

    #[test]
    fn test_media_file_json() {
        let file: MediaFile = serde_json::from_value(json!({
            "orgId": "o", "projectId": "p", "fileId": "clip-1",
            "kind": "video",
            "metadata": { "lines": { "2": [] } }
        }))
        .unwrap();
        assert_eq!(file.id(), "clip-1");
        assert_eq!(file.kind, MediaKind::Video);
        assert!(file.metadata.is_empty());
    }
}
