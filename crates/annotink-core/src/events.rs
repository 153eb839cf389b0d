//! Change notifications for renderers and other observers.
//!
//! Subscribers pick the topics they care about and drain their own queue
//! with [`EventBus::poll`]. A shape-list view subscribed to
//! [`Topic::Shapes`] never sees selection churn.

use crate::selection::{PointSelection, ShapeSelection};
use crate::shapes::{ShapeId, ShapeKind};
use crate::sync::DispatchReport;
use crate::tools::ToolEvent;
use std::collections::{BTreeMap, HashSet};

/// Event categories a subscriber can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Shape collections changed.
    Shapes,
    Selection,
    /// Tool state and in-progress drawing.
    Drawing,
    /// Outbox activity.
    Sync,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Stores were cleared for a newly opened file.
    Reset { file_id: String },
    /// Stores were populated from the opened file.
    Loaded { file_id: String, shapes: usize },
    ShapeAdded {
        kind: ShapeKind,
        id: ShapeId,
        frame: Option<u32>,
    },
    ShapeChanged {
        kind: ShapeKind,
        id: ShapeId,
        frame: Option<u32>,
    },
    ShapeRemoved {
        kind: ShapeKind,
        id: ShapeId,
        frame: Option<u32>,
    },
    /// Undo or redo rewrote the shapes.
    HistoryApplied { undo: bool, description: String },
    FrameChanged(u32),
    /// Display scale changed and every shape was rescaled.
    Rescaled,
    SelectionChanged {
        shape: Option<ShapeSelection>,
        point: Option<PointSelection>,
    },
    Tool(ToolEvent),
    /// A finished shape waits for its name and class.
    AwaitingDetails { kind: ShapeKind, id: ShapeId },
    Queued { pending: usize },
    Dispatched(DispatchReport),
    FilesTagged { file_ids: Vec<String> },
}

impl EngineEvent {
    pub fn topic(&self) -> Topic {
        match self {
            EngineEvent::Reset { .. }
            | EngineEvent::Loaded { .. }
            | EngineEvent::ShapeAdded { .. }
            | EngineEvent::ShapeChanged { .. }
            | EngineEvent::ShapeRemoved { .. }
            | EngineEvent::HistoryApplied { .. }
            | EngineEvent::FrameChanged(_)
            | EngineEvent::Rescaled => Topic::Shapes,
            EngineEvent::SelectionChanged { .. } => Topic::Selection,
            EngineEvent::Tool(_) | EngineEvent::AwaitingDetails { .. } => Topic::Drawing,
            EngineEvent::Queued { .. }
            | EngineEvent::Dispatched(_)
            | EngineEvent::FilesTagged { .. } => Topic::Sync,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

#[derive(Debug, Clone)]
struct Subscriber {
    topics: HashSet<Topic>,
    queue: Vec<EngineEvent>,
}

#[derive(Debug, Clone, Default)]
pub struct EventBus {
    next_id: u64,
    subscribers: BTreeMap<SubscriberId, Subscriber>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, topics: &[Topic]) -> SubscriberId {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        self.subscribers.insert(
            id,
            Subscriber {
                topics: topics.iter().copied().collect(),
                queue: Vec::new(),
            },
        );
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    /// Queue `event` for every subscriber of its topic.
    pub fn publish(&mut self, event: EngineEvent) {
        let topic = event.topic();
        for subscriber in self.subscribers.values_mut() {
            if subscriber.topics.contains(&topic) {
                subscriber.queue.push(event.clone());
            }
        }
    }

    pub fn publish_all(&mut self, events: impl IntoIterator<Item = EngineEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    /// Take the subscriber's pending events, oldest first.
    pub fn poll(&mut self, id: SubscriberId) -> Vec<EngineEvent> {
        self.subscribers
            .get_mut(&id)
            .map(|s| std::mem::take(&mut s.queue))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_filtering() {
        let mut bus = EventBus::new();
        let shapes = bus.subscribe(&[Topic::Shapes]);
        let selection = bus.subscribe(&[Topic::Selection, Topic::Sync]);

        bus.publish(EngineEvent::FrameChanged(3));
        bus.publish(EngineEvent::SelectionChanged {
            shape: None,
            point: None,
        });

        assert_eq!(bus.poll(shapes), vec![EngineEvent::FrameChanged(3)]);
        let got = bus.poll(selection);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].topic(), Topic::Selection);
        assert!(bus.poll(shapes).is_empty());
    }

    #[test]
    fn test_unsubscribe() {
        let mut bus = EventBus::new();
        let id = bus.subscribe(&[Topic::Drawing]);
        assert!(bus.unsubscribe(id));
        bus.publish(EngineEvent::Tool(ToolEvent::Disarmed));
        assert!(bus.poll(id).is_empty());
        assert!(!bus.unsubscribe(id));
    }

    #[test]
    fn test_order_preserved() {
        let mut bus = EventBus::new();
        let id = bus.subscribe(&[Topic::Shapes]);
        bus.publish_all([
            EngineEvent::Reset {
                file_id: "b".into(),
            },
            EngineEvent::Loaded {
                file_id: "b".into(),
                shapes: 2,
            },
        ]);
        let events = bus.poll(id);
        assert!(matches!(events[0], EngineEvent::Reset { .. }));
        assert!(matches!(events[1], EngineEvent::Loaded { shapes: 2, .. }));
    }
}
