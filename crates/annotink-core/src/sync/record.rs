//! Persistence records, always in media-native coordinates.

use crate::shapes::{BoxGeometry, Native, NativePoint, ShapeId, ShapeKind, StrokeColor};
use serde::{Deserialize, Deserializer, Serialize};

/// Frame number used for still images and for records without one.
pub const DEFAULT_FRAME: u32 = 1;

fn default_frame() -> u32 {
    DEFAULT_FRAME
}

/// Keeps `null` distinct from an absent field when reading a patch.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A shape as stored by the persistence service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeRecord {
    pub id: ShapeId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ShapeKind,
    pub org_id: String,
    pub project_id: String,
    pub file_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub stroke_width: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<NativePoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(default = "default_frame")]
    pub at_frame: u32,
    pub stroke: StrokeColor,
}

impl ShapeRecord {
    /// The box of a rectangle or circle record, if all four fields are present.
    pub fn box_geometry(&self) -> Option<BoxGeometry<Native>> {
        Some(BoxGeometry::new(self.x?, self.y?, self.width?, self.height?))
    }
}

/// Changed fields of a record. Absent fields are left alone by the receiver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<StrokeColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub class_id: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub attribute: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub text_field: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub id_field: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<NativePoint>>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fold another patch on top of this one (later values win).
    pub fn merge(&mut self, later: RecordPatch) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if later.$field.is_some() { self.$field = later.$field; })*
            };
        }
        take!(
            name, notes, stroke, stroke_width, class_id, attribute, text_field, id_field, x, y,
            width, height, points
        );
    }

    /// Apply to a stored record.
    pub fn apply_to(&self, record: &mut ShapeRecord) {
        if let Some(name) = &self.name {
            record.name = name.clone();
        }
        if let Some(notes) = &self.notes {
            record.notes = Some(notes.clone());
        }
        if let Some(stroke) = self.stroke {
            record.stroke = stroke;
        }
        if let Some(width) = self.stroke_width {
            record.stroke_width = width;
        }
        if let Some(class_id) = &self.class_id {
            record.class_id = class_id.clone();
        }
        if let Some(attribute) = &self.attribute {
            record.attribute = attribute.clone();
        }
        if let Some(text) = &self.text_field {
            record.text_field = text.clone();
        }
        if let Some(id_field) = &self.id_field {
            record.id_field = id_field.clone();
        }
        if self.x.is_some() {
            record.x = self.x;
        }
        if self.y.is_some() {
            record.y = self.y;
        }
        if self.width.is_some() {
            record.width = self.width;
        }
        if self.height.is_some() {
            record.height = self.height;
        }
        if let Some(points) = &self.points {
            record.points = Some(points.clone());
        }
    }
}
