//! Batch classification of whole media files.
//!
//! In grid mode the user selects several files and applies one tag list to
//! all of them at once. Skipping is the same action with an empty list.

use crate::sync::Intent;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Local classification state of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileTagState {
    pub tags: Vec<String>,
    pub complete: bool,
    pub skipped: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BatchTagger {
    files: BTreeMap<String, FileTagState>,
    selected: BTreeSet<String>,
}

impl BatchTagger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the state of a file, e.g. from the file list.
    pub fn load(&mut self, file_id: impl Into<String>, state: FileTagState) {
        self.files.insert(file_id.into(), state);
    }

    pub fn state(&self, file_id: &str) -> Option<&FileTagState> {
        self.files.get(file_id)
    }

    pub fn select(&mut self, file_id: impl Into<String>) {
        self.selected.insert(file_id.into());
    }

    pub fn deselect(&mut self, file_id: &str) {
        self.selected.remove(file_id);
    }

    /// Select if unselected, deselect otherwise. Returns the new state.
    pub fn toggle(&mut self, file_id: &str) -> bool {
        if self.selected.remove(file_id) {
            false
        } else {
            self.selected.insert(file_id.to_string());
            true
        }
    }

    pub fn selected(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().map(String::as_str)
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    /// Give every selected file the same tag list and clear the selection.
    ///
    /// Returns the single batched call to persist, or `None` when nothing
    /// was selected.
    pub fn apply(&mut self, tags: Vec<String>) -> Option<Intent> {
        if self.selected.is_empty() {
            return None;
        }
        let complete = !tags.is_empty();
        let file_ids: Vec<String> = std::mem::take(&mut self.selected).into_iter().collect();
        for file_id in &file_ids {
            self.files.insert(
                file_id.clone(),
                FileTagState {
                    tags: tags.clone(),
                    complete,
                    skipped: !complete,
                },
            );
        }
        log::debug!("tagged {} files with {:?}", file_ids.len(), tags);
        Some(Intent::TagFiles {
            file_ids,
            tag_ids: tags,
        })
    }

    /// Mark every selected file as skipped.
    pub fn skip(&mut self) -> Option<Intent> {
        self.apply(Vec::new())
    }
}
