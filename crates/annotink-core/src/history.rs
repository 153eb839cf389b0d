//! Undo/redo as a bounded stack of reversible commands.
//!
//! Each store mutation that should be undoable is recorded as a [`Command`]
//! that can apply itself to a [`ShapeCollection`] and produce its inverse.
//! Selection and drawing-in-progress state never enter the history.

use crate::shapes::{Shape, ShapeId, ShapeKind};
use crate::store::ShapeCollection;
use std::collections::VecDeque;

/// Default number of undoable steps kept per store.
pub const DEFAULT_HISTORY_DEPTH: usize = 10;

/// A reversible mutation of one shape collection.
///
/// `frame` is `Some` for video stores and names the frame the command
/// applies to.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// A shape was added at `index` of its kind's array.
    Insert {
        frame: Option<u32>,
        index: usize,
        shape: Shape,
    },
    /// A shape was removed from `index` of its kind's array. Applying
    /// removes by id; `index` is only read when inverting to an `Insert`.
    Remove {
        frame: Option<u32>,
        index: usize,
        shape: Shape,
    },
    /// A shape changed in place.
    Replace {
        frame: Option<u32>,
        before: Shape,
        after: Shape,
    },
    /// A whole kind's array was swapped out.
    ReplaceBucket {
        frame: Option<u32>,
        kind: ShapeKind,
        before: Vec<Shape>,
        after: Vec<Shape>,
    },
}

impl Command {
    pub fn frame(&self) -> Option<u32> {
        match self {
            Command::Insert { frame, .. }
            | Command::Remove { frame, .. }
            | Command::Replace { frame, .. }
            | Command::ReplaceBucket { frame, .. } => *frame,
        }
    }

    pub fn description(&self) -> String {
        match self {
            Command::Insert { shape, .. } => format!("Add {}", shape.kind()),
            Command::Remove { shape, .. } => format!("Delete {}", shape.kind()),
            Command::Replace { after, .. } => format!("Edit {}", after.kind()),
            Command::ReplaceBucket { kind, after, .. } => {
                format!("Set {} {} shapes", after.len(), kind)
            }
        }
    }

    /// The command that undoes this one.
    pub fn invert(&self) -> Command {
        match self.clone() {
            Command::Insert {
                frame,
                index,
                shape,
            } => Command::Remove {
                frame,
                index,
                shape,
            },
            Command::Remove {
                frame,
                index,
                shape,
            } => Command::Insert {
                frame,
                index,
                shape,
            },
            Command::Replace {
                frame,
                before,
                after,
            } => Command::Replace {
                frame,
                before: after,
                after: before,
            },
            Command::ReplaceBucket {
                frame,
                kind,
                before,
                after,
            } => Command::ReplaceBucket {
                frame,
                kind,
                before: after,
                after: before,
            },
        }
    }

    /// Apply to the collection this command was recorded against.
    pub fn apply(&self, shapes: &mut ShapeCollection) {
        match self {
            Command::Insert { index, shape, .. } => {
                shapes.insert_at(*index, shape.clone());
            }
            Command::Remove { shape, .. } => {
                shapes.remove_shape(shape.kind(), shape.id());
            }
            Command::Replace { after, .. } => {
                shapes.replace_shape(after.clone());
            }
            Command::ReplaceBucket { kind, after, .. } => {
                shapes.replace_bucket(*kind, after.clone());
            }
        }
    }

    /// Ids of the shapes this command touches.
    pub fn shape_ids(&self) -> Vec<ShapeId> {
        match self {
            Command::Insert { shape, .. } | Command::Remove { shape, .. } => vec![shape.id()],
            Command::Replace { after, .. } => vec![after.id()],
            Command::ReplaceBucket { before, after, .. } => {
                let mut ids: Vec<ShapeId> = before.iter().chain(after).map(Shape::id).collect();
                ids.sort_unstable();
                ids.dedup();
                ids
            }
        }
    }

    fn for_each_shape_mut(&mut self, f: &mut impl FnMut(&mut Shape)) {
        match self {
            Command::Insert { shape, .. } | Command::Remove { shape, .. } => f(shape),
            Command::Replace { before, after, .. } => {
                f(before);
                f(after);
            }
            Command::ReplaceBucket { before, after, .. } => {
                before.iter_mut().chain(after.iter_mut()).for_each(f);
            }
        }
    }
}

/// Bounded undo and redo stacks.
#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<Command>,
    redo: Vec<Command>,
    depth: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

impl History {
    pub fn new(depth: usize) -> Self {
        Self {
            undo: VecDeque::with_capacity(depth),
            redo: Vec::new(),
            depth,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Record a new command. Clears redo; drops the oldest entry on overflow.
    pub fn push(&mut self, command: Command) {
        log::debug!("history: pushed '{}'", command.description());
        self.undo.push_back(command);
        self.redo.clear();
        while self.undo.len() > self.depth {
            self.undo.pop_front();
        }
    }

    /// Take the most recent command for undoing; it moves to the redo stack.
    pub fn pop_undo(&mut self) -> Option<Command> {
        let command = self.undo.pop_back()?;
        log::debug!("history: undo '{}'", command.description());
        self.redo.push(command.clone());
        Some(command)
    }

    /// Take the most recently undone command; it moves back to the undo stack.
    pub fn pop_redo(&mut self) -> Option<Command> {
        let command = self.redo.pop()?;
        log::debug!("history: redo '{}'", command.description());
        self.undo.push_back(command.clone());
        Some(command)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// Rewrite every shape held by the stacks, e.g. after the display scale
    /// changed.
    pub fn map_shapes(&mut self, mut f: impl FnMut(&mut Shape)) {
        for command in self.undo.iter_mut().chain(self.redo.iter_mut()) {
            command.for_each_shape_mut(&mut f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::FileContext;
    use crate::shapes::{BoxGeometry, Rectangle, ShapeMeta, StrokeColor};

    fn rect(x: f64) -> Shape {
        let meta = ShapeMeta::new(&FileContext::new("o", "p", "f"), StrokeColor::black(), 2.0);
        Rectangle::new(meta, BoxGeometry::new(x, 0.0, 10.0, 10.0)).into()
    }

    fn insert(shape: Shape) -> Command {
        Command::Insert {
            frame: None,
            index: 0,
            shape,
        }
    }

    #[test]
    fn test_depth_is_capped() {
        let mut history = History::new(10);
        for i in 0..12 {
            history.push(insert(rect(i as f64)));
        }
        let mut undone = 0;
        while history.pop_undo().is_some() {
            undone += 1;
        }
        assert_eq!(undone, 10);
        assert_eq!(history.redo_len(), 10);
    }

    #[test]
    fn test_push_clears_redo() {
        let mut history = History::default();
        history.push(insert(rect(0.0)));
        history.pop_undo();
        assert!(history.can_redo());
        history.push(insert(rect(1.0)));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_insert_invert_roundtrip() {
        let shape = rect(3.0);
        let mut shapes = ShapeCollection::new();
        let cmd = insert(shape.clone());

        cmd.apply(&mut shapes);
        assert_eq!(shapes.rectangles.len(), 1);
        cmd.invert().apply(&mut shapes);
        assert!(shapes.is_empty());
        assert_eq!(cmd.invert().invert(), cmd);
    }

    #[test]
    fn test_replace_invert() {
        let before = rect(0.0);
        let mut after = before.clone();
        after.translate(5.0, 0.0);
        let mut shapes = ShapeCollection::from_shapes([after.clone()]);
        let cmd = Command::Replace {
            frame: None,
            before: before.clone(),
            after,
        };
        cmd.invert().apply(&mut shapes);
        assert_eq!(shapes.find_any(before.id()), Some(before));
    }

    #[test]
    fn test_map_shapes_reaches_both_stacks() {
        let mut history = History::default();
        history.push(insert(rect(0.0)));
        history.push(insert(rect(1.0)));
        history.pop_undo();
        history.map_shapes(|s| s.translate(100.0, 0.0));

        let redo = history.pop_redo().unwrap();
        let Command::Insert { shape, .. } = redo else {
            panic!("expected insert");
        };
        assert!((shape.bounds().x0 - 101.0).abs() < f64::EPSILON);
    }
}
