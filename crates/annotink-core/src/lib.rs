//! AnnotInk Core Library
//!
//! Shape model, display/native scaling, undoable shape stores for images and
//! video, the drawing state machine and the persistence outbox behind an
//! image/video annotation canvas.

pub mod class;
pub mod config;
pub mod debounce;
pub mod events;
pub mod history;
pub mod media;
pub mod scale;
pub mod selection;
pub mod session;
pub mod shapes;
pub mod storage;
pub mod store;
pub mod sync;
pub mod tagger;
pub mod tools;

pub use class::{AnnotationClass, ClassRegistry};
pub use config::{ConfigError, EngineConfig, SyncConfig};
pub use events::{EngineEvent, SubscriberId, Topic};
pub use history::{Command, History, DEFAULT_HISTORY_DEPTH};
pub use media::{FileContext, MediaAnnotations, MediaFile, MediaKind};
pub use scale::{MediaDimensions, Scale};
pub use selection::{PointSelection, SelectionState, ShapeSelection};
pub use session::{AnnotationSession, MediaStore, PendingShape, ShapeDetails};
pub use shapes::{Shape, ShapeId, ShapeKind, ShapeMeta, ShapePatch, StrokeColor};
pub use storage::{FilePersistence, MemoryPersistence, Persistence, PersistenceError};
pub use store::{ImageShapeStore, ShapeTarget, VideoShapeStore};
pub use sync::{DispatchReport, Intent, Outbox, ShapeRecord, SyncBridge};
pub use tools::{DrawingTool, ToolEvent, ToolManager, ToolState};
