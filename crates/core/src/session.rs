//! One open document and everything attached to it
//!
//! `DocumentSession` is the surface the GUI shell talks to: it routes pointer
//! events into the drawing session, keeps undo history of the store, tracks
//! the current page and view transform, and saves.

use crate::actor::{ActorId, ActorRegistry};
use crate::annotation::{Annotation, AnnotationId};
use crate::cancel::CancellationToken;
use crate::compositor::{BackgroundSave, DocumentCompositor, SaveReport};
use crate::config::OverlayConfig;
use crate::drawing::{DrawingSession, ShapeStyle, Tool};
use crate::error::{OverlayError, SessionResult};
use crate::history::UndoHistory;
use crate::mapper::{CoordinateMapper, ViewPoint};
use crate::store::{AnnotationSnapshot, AnnotationStore};
use pdf_engine::{DocumentHandle, OpenSource, PageSize, PdfEngine, RenderRequest, RgbaImage};
use std::path::{Path, PathBuf};

/// Page size assumed for the view transform of a document without pages.
const FALLBACK_PAGE_SIZE: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

pub struct DocumentSession<E: PdfEngine> {
    engine: E,
    source: OpenSource,
    handle: Option<DocumentHandle>,
    page_count: u32,
    current_page: Option<u32>,
    mapper: CoordinateMapper,
    actors: ActorRegistry,
    store: AnnotationStore,
    drawing: DrawingSession,
    history: UndoHistory<AnnotationSnapshot>,
    tool: Tool,
    style: ShapeStyle,
}

impl<E: PdfEngine> DocumentSession<E> {
    /// Open `source` with `engine` and start on the first page
    pub fn open(
        mut engine: E,
        source: OpenSource,
        actors: ActorRegistry,
        style: ShapeStyle,
    ) -> SessionResult<Self> {
        let handle = engine.open(source.clone())?;
        let page_count = engine.page_count(handle)?;

        let (current_page, page_size) = if page_count > 0 {
            (Some(0), engine.page_size(handle, 0)?)
        } else {
            log::warn!("opened a document without pages");
            (None, FALLBACK_PAGE_SIZE)
        };

        let store = AnnotationStore::new();
        let history = UndoHistory::new(store.snapshot());
        log::info!("opened document {} with {page_count} pages", handle.raw());

        Ok(Self {
            engine,
            source,
            handle: Some(handle),
            page_count,
            current_page,
            mapper: CoordinateMapper::new(page_size),
            actors,
            store,
            drawing: DrawingSession::new(),
            history,
            tool: Tool::default(),
            style,
        })
    }

    /// Open with actors and drawing defaults taken from `config`
    pub fn open_with_config(engine: E, source: OpenSource, config: &OverlayConfig) -> SessionResult<Self> {
        let actors = config.build_registry()?;
        Self::open(engine, source, actors, config.shape_style())
    }

    pub fn actors(&self) -> &ActorRegistry {
        &self.actors
    }

    /// Registry access for adding, removing and recoloring actors
    pub fn actors_mut(&mut self) -> &mut ActorRegistry {
        &mut self.actors
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    pub fn drawing(&self) -> &DrawingSession {
        &self.drawing
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn style(&self) -> &ShapeStyle {
        &self.style
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn current_page(&self) -> Option<u32> {
        self.current_page
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Switch tools; a gesture in progress is discarded
    pub fn select_tool(&mut self, tool: Tool) {
        self.drawing.cancel();
        self.tool = tool;
    }

    pub fn set_active_actor(&mut self, id: ActorId) -> SessionResult<()> {
        self.actors.set_active(id)?;
        Ok(())
    }

    pub fn pointer_down(&mut self, point: ViewPoint) -> SessionResult<()> {
        let page = self.active_page()?;
        self.drawing.begin_drag(self.tool, page, point, &self.mapper)?;
        Ok(())
    }

    /// Track the pointer; ignored unless a drag is in progress
    pub fn pointer_move(&mut self, point: ViewPoint) -> SessionResult<()> {
        if self.drawing.preview().is_some() {
            self.drawing.update_drag(point, &self.mapper)?;
        }
        Ok(())
    }

    /// Release the pointer, committing the dragged shape
    ///
    /// During text entry the release is ignored; the text box is committed by
    /// [`commit_text`](Self::commit_text).
    pub fn pointer_up(&mut self, point: ViewPoint) -> SessionResult<Option<AnnotationId>> {
        if self.drawing.text_anchor().is_some() {
            return Ok(None);
        }

        let committed =
            self.drawing.end_drag(point, &self.mapper, &self.actors, &mut self.store, &self.style)?;
        if committed.is_some() {
            self.record_history();
        }
        Ok(committed)
    }

    pub fn commit_text(&mut self, text: &str) -> SessionResult<Option<AnnotationId>> {
        let committed = self.drawing.commit_text(text, &self.actors, &mut self.store, &self.style)?;
        if committed.is_some() {
            self.record_history();
        }
        Ok(committed)
    }

    pub fn cancel_text(&mut self) -> SessionResult<()> {
        self.drawing.cancel_text()?;
        Ok(())
    }

    pub fn delete_annotation(&mut self, id: AnnotationId) -> SessionResult<Annotation> {
        let removed = self.store.remove(id)?;
        self.record_history();
        log::info!("deleted annotation {id}");
        Ok(removed)
    }

    /// Delete the topmost annotation under `point` on the current page
    pub fn delete_at(&mut self, point: ViewPoint, tolerance_px: f32) -> SessionResult<Option<Annotation>> {
        let page = self.active_page()?;
        if !point.is_finite() {
            return Err(OverlayError::InvalidGeometry(format!("pointer position must be finite, got {point:?}")).into());
        }

        let page_point = self.mapper.to_page(point);
        let tolerance = tolerance_px / self.mapper.scale();
        match self.store.hit_test(page, &page_point, tolerance).first() {
            Some(id) => self.delete_annotation(*id).map(Some),
            None => Ok(None),
        }
    }

    /// Edit an annotation (move, resize, recolor, retext) as one undoable step
    pub fn update_annotation<F>(&mut self, id: AnnotationId, mutator: F) -> SessionResult<()>
    where
        F: FnOnce(&mut Annotation),
    {
        self.store.update(id, mutator)?;
        self.record_history();
        Ok(())
    }

    /// Recolor an actor's existing annotations with its current profile color
    ///
    /// Returns the number of annotations changed. The change is one undo step.
    pub fn apply_actor_color(&mut self, actor: ActorId) -> SessionResult<usize> {
        let color = self.actors.get(actor).ok_or(OverlayError::ActorNotFound(actor))?.color();
        let changed = self.store.recolor_actor(actor, color);
        if changed > 0 {
            self.record_history();
            log::info!("recolored {changed} annotations of actor {actor}");
        }
        Ok(changed)
    }

    pub fn undo(&mut self) -> bool {
        self.drawing.cancel();
        match self.history.undo() {
            Some(snapshot) => {
                self.store.restore(&snapshot);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        self.drawing.cancel();
        match self.history.redo() {
            Some(snapshot) => {
                self.store.restore(&snapshot);
                true
            }
            None => false,
        }
    }

    pub fn zoom_at(&mut self, anchor: ViewPoint, factor: f32) {
        self.mapper.zoom_at(anchor, factor);
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.mapper.set_scale(scale);
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.mapper.pan(dx, dy);
    }

    /// Show another page; any gesture in progress is discarded
    pub fn go_to_page(&mut self, page_index: u32) -> SessionResult<()> {
        let handle = self.open_handle()?;
        if page_index >= self.page_count {
            return Err(OverlayError::InvalidState(format!(
                "page {page_index} out of range (page_count={})",
                self.page_count
            ))
            .into());
        }

        let page_size = self.engine.page_size(handle, page_index)?;
        self.drawing.cancel();
        self.mapper.set_page_size(page_size);
        self.current_page = Some(page_index);
        log::debug!("showing page {page_index}");
        Ok(())
    }

    /// Advance one page; returns false when already on the last page
    pub fn next_page(&mut self) -> SessionResult<bool> {
        let page = self.active_page()?;
        if page + 1 >= self.page_count {
            return Ok(false);
        }
        self.go_to_page(page + 1)?;
        Ok(true)
    }

    /// Go back one page; returns false when already on the first page
    pub fn previous_page(&mut self) -> SessionResult<bool> {
        let page = self.active_page()?;
        if page == 0 {
            return Ok(false);
        }
        self.go_to_page(page - 1)?;
        Ok(true)
    }

    /// Rasterize the current page at the current display scale
    pub fn render_current_page(&self) -> SessionResult<RgbaImage> {
        let handle = self.open_handle()?;
        let page_index = self.active_page()?;
        let image = self
            .engine
            .render_page(handle, RenderRequest { page_index, scale: self.mapper.scale() })?;
        Ok(image)
    }

    pub fn snapshot(&self) -> AnnotationSnapshot {
        self.store.snapshot()
    }

    /// Save the current annotations into a new PDF at `path`
    pub fn save(&mut self, path: &Path) -> SessionResult<SaveReport> {
        let handle = self.open_handle()?;
        let snapshot = self.store.snapshot();
        let report = DocumentCompositor::new(&mut self.engine).save_to_path(handle, &snapshot, path)?;
        Ok(report)
    }

    /// Save the current snapshot on a worker thread using `worker_engine`
    ///
    /// Edits made while the worker runs are not part of that save.
    pub fn save_in_background<W>(
        &self,
        worker_engine: W,
        path: PathBuf,
        cancel: CancellationToken,
    ) -> SessionResult<BackgroundSave>
    where
        W: PdfEngine + Send + 'static,
    {
        self.open_handle()?;
        Ok(BackgroundSave::spawn(worker_engine, self.source.clone(), self.store.snapshot(), path, cancel))
    }

    /// Discard annotations and history and release the engine document
    pub fn close(&mut self) -> SessionResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        self.drawing.cancel();
        self.store.clear();
        self.history.clear_with(self.store.snapshot());
        self.current_page = None;
        self.page_count = 0;
        self.engine.close(handle)?;
        log::info!("closed document {}", handle.raw());
        Ok(())
    }

    fn record_history(&mut self) {
        self.history.push_snapshot(self.store.snapshot());
    }

    fn open_handle(&self) -> Result<DocumentHandle, OverlayError> {
        self.handle.ok_or(OverlayError::NoActiveDocumentPage)
    }

    fn active_page(&self) -> Result<u32, OverlayError> {
        self.current_page.ok_or(OverlayError::NoActiveDocumentPage)
    }
}
