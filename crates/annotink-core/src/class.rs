//! Annotation classes ("tags") and the registry shapes resolve them through.

use crate::shapes::StrokeColor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A class a shape can be assigned to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationClass {
    pub id: String,
    pub name: String,
    /// Stroke given to shapes of this class when they are saved.
    pub color: StrokeColor,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub has_text: bool,
    #[serde(default)]
    pub has_id: bool,
    #[serde(default)]
    pub notes: String,
}

impl AnnotationClass {
    pub fn new(id: impl Into<String>, name: impl Into<String>, color: StrokeColor) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color,
            attributes: Vec::new(),
            has_text: false,
            has_id: false,
            notes: String::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: Vec<String>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Whether `attribute` is one of the values this class allows.
    pub fn allows_attribute(&self, attribute: &str) -> bool {
        self.attributes.iter().any(|a| a == attribute)
    }
}

/// Classes of the current project, keyed by id.
///
/// Colours are read at the moment a shape is saved. Changing a class colour
/// later does not touch shapes that already carry the old stroke.
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    classes: BTreeMap<String, AnnotationClass>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_classes(classes: impl IntoIterator<Item = AnnotationClass>) -> Self {
        let mut registry = Self::new();
        for class in classes {
            registry.upsert(class);
        }
        registry
    }

    /// Insert or replace a class. Returns the previous definition.
    pub fn upsert(&mut self, class: AnnotationClass) -> Option<AnnotationClass> {
        self.classes.insert(class.id.clone(), class)
    }

    pub fn get(&self, id: &str) -> Option<&AnnotationClass> {
        self.classes.get(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<AnnotationClass> {
        self.classes.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnnotationClass> {
        self.classes.values()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Stroke for a shape assigned to `class_id`, if the class is known.
    pub fn stroke_for(&self, class_id: Option<&str>) -> Option<StrokeColor> {
        class_id.and_then(|id| self.get(id)).map(|c| c.color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stroke_lookup() {
        let red = StrokeColor::new(255, 0, 0, 255);
        let registry = ClassRegistry::from_classes([AnnotationClass::new("car", "Car", red)]);
        assert_eq!(registry.stroke_for(Some("car")), Some(red));
        assert_eq!(registry.stroke_for(Some("bus")), None);
        assert_eq!(registry.stroke_for(None), None);
    }

    #[test]
    fn test_upsert_replaces() {
        let mut registry = ClassRegistry::new();
        registry.upsert(AnnotationClass::new("car", "Car", StrokeColor::black()));
        let old = registry.upsert(AnnotationClass::new("car", "Auto", StrokeColor::black()));
        assert_eq!(old.unwrap().name, "Car");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("car").unwrap().name, "Auto");
        assert!(registry.remove("car").is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_wire_format() {
        let json = r##"{"id":"c1","name":"Person","color":"#00ff00","attributes":["adult","child"],"hasText":true}"##;
        let class: AnnotationClass = serde_json::from_str(json).unwrap();
        assert!(class.has_text);
        assert!(!class.has_id);
        assert!(class.allows_attribute("child"));
        assert!(!class.allows_attribute("teen"));
        assert_eq!(class.color, StrokeColor::new(0, 255, 0, 255));
    }
}
