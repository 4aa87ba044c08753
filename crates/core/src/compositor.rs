//! Burning annotations into a saved PDF
//!
//! A save never draws into the working document. The compositor forks it into
//! a staging document, draws every annotation there, serializes the staging
//! copy and finally replaces the target file in one rename.

use crate::annotation::{Annotation, AnnotationGeometry};
use crate::cancel::CancellationToken;
use crate::error::{CompositionError, CompositionResult};
use crate::store::AnnotationSnapshot;
use pdf_engine::{DocumentHandle, DrawPrimitive, OpenSource, PdfEngine, PrimitiveShape, StrokeStyle};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;

/// Serialized output of one composition pass
#[derive(Debug, Clone)]
pub struct ComposedDocument {
    pub bytes: Vec<u8>,
    pub pages_composed: u32,
    pub annotations_composed: usize,
    pub generation: u64,
}

/// Outcome of a successful save
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveReport {
    pub path: PathBuf,
    pub bytes_written: u64,
    pub pages_composed: u32,
    pub annotations_composed: usize,
    /// Store generation of the snapshot that was saved.
    pub generation: u64,
}

/// Drives a [`PdfEngine`] to merge a snapshot into a document
pub struct DocumentCompositor<'e, E: PdfEngine + ?Sized> {
    engine: &'e mut E,
}

impl<'e, E: PdfEngine + ?Sized> DocumentCompositor<'e, E> {
    pub fn new(engine: &'e mut E) -> Self {
        Self { engine }
    }

    /// Compose `snapshot` onto a staging fork of `handle` and serialize it
    ///
    /// `handle` itself is never modified. The staging document is closed in
    /// every outcome.
    pub fn compose(
        &mut self,
        handle: DocumentHandle,
        snapshot: &AnnotationSnapshot,
        cancel: &CancellationToken,
    ) -> CompositionResult<ComposedDocument> {
        self.validate(handle, snapshot)?;
        if cancel.is_cancelled() {
            return Err(CompositionError::Cancelled);
        }

        let staging = self.engine.fork(handle)?;
        log::debug!("composing generation {} into staging document {}", snapshot.generation(), staging.raw());

        let outcome = self.draw_and_serialize(staging, snapshot, cancel);

        if let Err(error) = self.engine.close(staging) {
            log::warn!("failed to close staging document {}: {error}", staging.raw());
        }
        outcome
    }

    /// Compose and atomically write the result to `path`
    pub fn save_to_path(
        &mut self,
        handle: DocumentHandle,
        snapshot: &AnnotationSnapshot,
        path: &Path,
    ) -> CompositionResult<SaveReport> {
        self.save_to_path_with_cancel(handle, snapshot, path, &CancellationToken::new())
    }

    pub fn save_to_path_with_cancel(
        &mut self,
        handle: DocumentHandle,
        snapshot: &AnnotationSnapshot,
        path: &Path,
        cancel: &CancellationToken,
    ) -> CompositionResult<SaveReport> {
        if path.file_name().is_none() {
            return Err(CompositionError::InvalidTarget(path.to_path_buf()));
        }

        let composed = match self.compose(handle, snapshot, cancel) {
            Ok(composed) => composed,
            Err(error) => {
                log::warn!("save to {} aborted: {error}", path.display());
                return Err(error);
            }
        };

        if cancel.is_cancelled() {
            log::warn!("save to {} cancelled before writing", path.display());
            return Err(CompositionError::Cancelled);
        }

        write_atomically(path, &composed.bytes)?;

        let report = SaveReport {
            path: path.to_path_buf(),
            bytes_written: composed.bytes.len() as u64,
            pages_composed: composed.pages_composed,
            annotations_composed: composed.annotations_composed,
            generation: composed.generation,
        };
        log::info!(
            "saved {} annotations on {} pages to {} ({} bytes)",
            report.annotations_composed,
            report.pages_composed,
            report.path.display(),
            report.bytes_written
        );
        Ok(report)
    }

    fn validate(&self, handle: DocumentHandle, snapshot: &AnnotationSnapshot) -> CompositionResult<()> {
        let page_count = self.engine.page_count(handle)?;

        for annotation in snapshot.iter() {
            if annotation.page_index() >= page_count {
                return Err(CompositionError::PageOutOfRange {
                    annotation: annotation.id(),
                    page: annotation.page_index(),
                    page_count,
                });
            }
            annotation.validate().map_err(|error| CompositionError::InvalidGeometry {
                annotation: annotation.id(),
                reason: error.to_string(),
            })?;
        }

        Ok(())
    }

    fn draw_and_serialize(
        &mut self,
        staging: DocumentHandle,
        snapshot: &AnnotationSnapshot,
        cancel: &CancellationToken,
    ) -> CompositionResult<ComposedDocument> {
        let mut pages_composed = 0;
        let mut annotations_composed = 0;

        for page_index in snapshot.pages() {
            if cancel.is_cancelled() {
                return Err(CompositionError::Cancelled);
            }

            for annotation in snapshot.list_for_page(page_index) {
                self.engine.draw_primitive(staging, page_index, &to_primitive(annotation))?;
                annotations_composed += 1;
            }
            pages_composed += 1;
        }

        if cancel.is_cancelled() {
            return Err(CompositionError::Cancelled);
        }

        let bytes = self.engine.serialize(staging)?;
        Ok(ComposedDocument {
            bytes,
            pages_composed,
            annotations_composed,
            generation: snapshot.generation(),
        })
    }
}

/// Translate a stored annotation into the engine's drawing primitive
pub fn to_primitive(annotation: &Annotation) -> DrawPrimitive {
    let shape = match annotation.geometry() {
        AnnotationGeometry::Line { start, end } => {
            PrimitiveShape::Line { x1: start.x, y1: start.y, x2: end.x, y2: end.y }
        }
        AnnotationGeometry::Rectangle { bounds } => PrimitiveShape::Rect {
            x: bounds.min.x,
            y: bounds.min.y,
            width: bounds.width(),
            height: bounds.height(),
        },
        AnnotationGeometry::Ellipse { bounds } => PrimitiveShape::Ellipse {
            x: bounds.min.x,
            y: bounds.min.y,
            width: bounds.width(),
            height: bounds.height(),
        },
        // The anchor is the top of the box; the engine wants the first baseline.
        AnnotationGeometry::TextBox { anchor, text, font_size } => PrimitiveShape::Text {
            x: anchor.x,
            y: anchor.y - font_size,
            size: *font_size,
            text: text.clone(),
        },
    };

    DrawPrimitive {
        shape,
        stroke: StrokeStyle { color: annotation.color().to_array(), width: annotation.stroke_width() },
    }
}

/// Write `bytes` next to `path` and rename over it once fully flushed
fn write_atomically(path: &Path, bytes: &[u8]) -> CompositionResult<()> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut staged = tempfile::NamedTempFile::new_in(directory)?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|error| CompositionError::Io(error.error))?;
    Ok(())
}

/// A save running on its own thread with its own engine instance
///
/// The worker only sees the snapshot it was given, so the interactive store
/// can keep changing while it runs.
pub struct BackgroundSave {
    worker: thread::JoinHandle<CompositionResult<SaveReport>>,
    cancel: CancellationToken,
    generation: u64,
}

impl BackgroundSave {
    pub fn spawn<E>(
        engine: E,
        source: OpenSource,
        snapshot: AnnotationSnapshot,
        path: PathBuf,
        cancel: CancellationToken,
    ) -> Self
    where
        E: PdfEngine + Send + 'static,
    {
        let generation = snapshot.generation();
        let worker_cancel = cancel.clone();

        let worker = thread::spawn(move || -> CompositionResult<SaveReport> {
            let mut engine = engine;
            let handle = engine.open(source)?;
            let result = DocumentCompositor::new(&mut engine).save_to_path_with_cancel(
                handle,
                &snapshot,
                &path,
                &worker_cancel,
            );
            if let Err(error) = engine.close(handle) {
                log::warn!("background save could not close its document: {error}");
            }
            result
        });

        log::debug!("spawned background save of generation {generation}");
        Self { worker, cancel, generation }
    }

    /// Ask the worker to stop; nothing is written once it notices
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Wait for the worker and return its result
    pub fn join(self) -> CompositionResult<SaveReport> {
        self.worker.join().map_err(|_| CompositionError::WorkerPanicked)?
    }
}
