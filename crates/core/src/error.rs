//! Error types for the overlay core

use crate::actor::ActorId;
use crate::annotation::AnnotationId;
use crate::config::ConfigError;
use pdf_engine::PdfEngineError;

/// Errors raised by interactive operations on actors, annotations and gestures
///
/// Every operation that returns one of these has left its component unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OverlayError {
    #[error("actor not found: {0}")]
    ActorNotFound(ActorId),
    #[error("annotation not found: {0}")]
    AnnotationNotFound(AnnotationId),
    #[error("an actor named {0:?} already exists")]
    DuplicateActorName(String),
    #[error("annotation already present: {0}")]
    DuplicateAnnotation(AnnotationId),
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("no document page is active")]
    NoActiveDocumentPage,
}

pub type OverlayResult<T> = Result<T, OverlayError>;

/// Errors that abort a save; the target file is never modified when one is returned
#[derive(Debug, thiserror::Error)]
pub enum CompositionError {
    #[error("annotation {annotation} is on page {page}, but the document has {page_count} pages")]
    PageOutOfRange { annotation: AnnotationId, page: u32, page_count: u32 },
    #[error("annotation {annotation} has invalid geometry: {reason}")]
    InvalidGeometry { annotation: AnnotationId, reason: String },
    #[error("save cancelled")]
    Cancelled,
    #[error("save target {0} has no file name")]
    InvalidTarget(std::path::PathBuf),
    #[error("background save worker panicked")]
    WorkerPanicked,
    #[error("PDF engine error: {0}")]
    Engine(#[from] PdfEngineError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CompositionResult<T> = Result<T, CompositionError>;

/// Errors from the document session, which can fail either interactively or while saving
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Overlay(#[from] OverlayError),
    #[error(transparent)]
    Composition(#[from] CompositionError),
    #[error("PDF engine error: {0}")]
    Engine(#[from] PdfEngineError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_missing_entity() {
        assert_eq!(OverlayError::ActorNotFound(ActorId(7)).to_string(), "actor not found: 7");
        assert_eq!(
            OverlayError::DuplicateActorName("Acme".to_owned()).to_string(),
            "an actor named \"Acme\" already exists"
        );
    }

    #[test]
    fn engine_errors_convert_into_composition_errors() {
        let error: CompositionError =
            PdfEngineError::PageOutOfRange { page: 3, page_count: 2 }.into();
        assert!(matches!(error, CompositionError::Engine(_)));
        assert!(error.to_string().contains("page 3 out of range"));
    }
}
