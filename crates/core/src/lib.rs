//! PDF Overlay Core Library
//!
//! Annotation state, actor bindings, view transforms and the save pipeline
//! for drawing vector overlays onto PDF pages.

pub mod actor;
pub mod annotation;
pub mod cancel;
pub mod compositor;
pub mod config;
pub mod drawing;
pub mod error;
pub mod history;
pub mod mapper;
pub mod session;
pub mod store;

pub use actor::{Actor, ActorId, ActorKind, ActorRegistry, UNASSIGNED_ACTOR_NAME};
pub use annotation::{
    Annotation, AnnotationGeometry, AnnotationId, AnnotationKind, Color, PageCoordinate, PageRect,
};
pub use cancel::CancellationToken;
pub use compositor::{to_primitive, BackgroundSave, ComposedDocument, DocumentCompositor, SaveReport};
pub use config::{ActorPreset, ConfigError, OverlayConfig};
pub use drawing::{DrawingSession, DrawingState, ShapeStyle, Tool};
pub use error::{
    CompositionError, CompositionResult, OverlayError, OverlayResult, SessionError, SessionResult,
};
pub use history::UndoHistory;
pub use mapper::{CoordinateMapper, ViewPoint, MAX_SCALE, MIN_SCALE};
pub use session::DocumentSession;
pub use store::{AnnotationSnapshot, AnnotationStore};
