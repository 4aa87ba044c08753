//! In-progress gesture state
//!
//! A drag goes `Idle → Dragging → Idle` for lines, rectangles and ellipses; a
//! text box goes `Idle → TextEntry → Idle`. Nothing reaches the store until
//! the gesture completes.

use crate::actor::ActorRegistry;
use crate::annotation::{Annotation, AnnotationGeometry, AnnotationId, PageCoordinate, PageRect};
use crate::error::{OverlayError, OverlayResult};
use crate::mapper::{CoordinateMapper, ViewPoint};
use crate::store::AnnotationStore;
use serde::{Deserialize, Serialize};

/// Drawing tool selected in the shell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Line,
    #[serde(alias = "rect")]
    Rectangle,
    #[serde(alias = "oval")]
    Ellipse,
    #[serde(alias = "textbox")]
    Text,
}

/// Stroke and threshold settings applied to committed annotations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeStyle {
    /// Stroke width in points.
    pub stroke_width: f32,
    /// Font size for text boxes, in points.
    pub text_size: f32,
    /// Gestures smaller than this many view pixels are discarded.
    pub min_drag_px: f32,
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self { stroke_width: 2.0, text_size: 12.0, min_drag_px: 3.0 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawingState {
    Idle,
    Dragging {
        tool: Tool,
        page_index: u32,
        start: PageCoordinate,
        current: PageCoordinate,
    },
    TextEntry {
        page_index: u32,
        anchor: PageCoordinate,
    },
}

/// Transient state of the gesture under the pointer
#[derive(Debug, Clone)]
pub struct DrawingSession {
    state: DrawingState,
}

impl Default for DrawingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawingSession {
    pub fn new() -> Self {
        Self { state: DrawingState::Idle }
    }

    pub fn state(&self) -> &DrawingState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == DrawingState::Idle
    }

    /// Start a gesture at `view_point`
    ///
    /// The text tool enters text entry with the (page-clamped) anchor; every
    /// other tool starts a drag.
    pub fn begin_drag(
        &mut self,
        tool: Tool,
        page_index: u32,
        view_point: ViewPoint,
        mapper: &CoordinateMapper,
    ) -> OverlayResult<()> {
        if self.state != DrawingState::Idle {
            return Err(OverlayError::InvalidState(format!(
                "cannot begin a gesture while {}",
                self.describe()
            )));
        }
        let start = finite_page_point(view_point, mapper)?;

        self.state = match tool {
            Tool::Text => DrawingState::TextEntry {
                page_index,
                anchor: mapper.clamp_to_page(start),
            },
            _ => DrawingState::Dragging { tool, page_index, start, current: start },
        };

        log::debug!("began {tool:?} gesture on page {page_index} at {start:?}");
        Ok(())
    }

    /// Move the loose end of the current drag
    pub fn update_drag(&mut self, view_point: ViewPoint, mapper: &CoordinateMapper) -> OverlayResult<()> {
        let DrawingState::Dragging { current, .. } = &mut self.state else {
            return Err(OverlayError::InvalidState("no drag in progress".to_owned()));
        };
        *current = finite_page_point(view_point, mapper)?;
        Ok(())
    }

    /// Geometry the shell should draw as a rubber band, if a drag is active
    pub fn preview(&self) -> Option<(u32, AnnotationGeometry)> {
        match &self.state {
            DrawingState::Dragging { tool, page_index, start, current } => {
                shape_geometry(*tool, *start, *current).map(|geometry| (*page_index, geometry))
            }
            _ => None,
        }
    }

    /// Page point where the pending text box will be anchored
    pub fn text_anchor(&self) -> Option<(u32, PageCoordinate)> {
        match &self.state {
            DrawingState::TextEntry { page_index, anchor } => Some((*page_index, *anchor)),
            _ => None,
        }
    }

    /// Finish the drag and commit the shape
    ///
    /// Both endpoints are clamped to the page. Degenerate shapes are dropped
    /// and `Ok(None)` is returned. The session is idle afterwards in every case.
    pub fn end_drag(
        &mut self,
        view_point: ViewPoint,
        mapper: &CoordinateMapper,
        actors: &ActorRegistry,
        store: &mut AnnotationStore,
        style: &ShapeStyle,
    ) -> OverlayResult<Option<AnnotationId>> {
        let DrawingState::Dragging { tool, page_index, start, .. } = self.state else {
            return Err(OverlayError::InvalidState("no drag in progress".to_owned()));
        };
        self.state = DrawingState::Idle;

        let end = finite_page_point(view_point, mapper)?;
        let start = mapper.clamp_to_page(start);
        let end = mapper.clamp_to_page(end);

        let Some(geometry) = shape_geometry(tool, start, end) else {
            return Err(OverlayError::InvalidState(format!("{tool:?} is not a drag tool")));
        };
        if is_degenerate(&geometry, mapper, style.min_drag_px) {
            log::debug!("discarded degenerate {tool:?} from {start:?} to {end:?}");
            return Ok(None);
        }

        commit(page_index, geometry, actors, store, style).map(Some)
    }

    /// Finish text entry and commit the text box
    ///
    /// Whitespace-only text is discarded with `Ok(None)`.
    pub fn commit_text(
        &mut self,
        text: &str,
        actors: &ActorRegistry,
        store: &mut AnnotationStore,
        style: &ShapeStyle,
    ) -> OverlayResult<Option<AnnotationId>> {
        let DrawingState::TextEntry { page_index, anchor } = &self.state else {
            return Err(OverlayError::InvalidState("no text entry in progress".to_owned()));
        };
        let (page_index, anchor) = (*page_index, *anchor);

        if text.trim().is_empty() {
            self.state = DrawingState::Idle;
            log::debug!("discarded empty text box on page {page_index}");
            return Ok(None);
        }

        let geometry = AnnotationGeometry::TextBox {
            anchor,
            text: text.trim_end().to_owned(),
            font_size: style.text_size,
        };
        let result = commit(page_index, geometry, actors, store, style);
        self.state = DrawingState::Idle;
        result.map(Some)
    }

    pub fn cancel_text(&mut self) -> OverlayResult<()> {
        if !matches!(self.state, DrawingState::TextEntry { .. }) {
            return Err(OverlayError::InvalidState("no text entry in progress".to_owned()));
        }
        self.state = DrawingState::Idle;
        Ok(())
    }

    /// Drop whatever gesture is in progress
    pub fn cancel(&mut self) {
        if self.state != DrawingState::Idle {
            log::debug!("cancelled gesture while {}", self.describe());
            self.state = DrawingState::Idle;
        }
    }

    fn describe(&self) -> &'static str {
        match self.state {
            DrawingState::Idle => "idle",
            DrawingState::Dragging { .. } => "dragging",
            DrawingState::TextEntry { .. } => "entering text",
        }
    }
}

fn finite_page_point(view_point: ViewPoint, mapper: &CoordinateMapper) -> OverlayResult<PageCoordinate> {
    if !view_point.is_finite() {
        log::warn!("rejected non-finite pointer position {view_point:?}");
        return Err(OverlayError::InvalidGeometry(format!(
            "pointer position must be finite, got {view_point:?}"
        )));
    }
    Ok(mapper.to_page(view_point))
}

/// Geometry spanned by a drag; `None` for the text tool, which places an anchor
fn shape_geometry(tool: Tool, start: PageCoordinate, end: PageCoordinate) -> Option<AnnotationGeometry> {
    match tool {
        Tool::Line => Some(AnnotationGeometry::Line { start, end }),
        Tool::Rectangle => Some(AnnotationGeometry::Rectangle { bounds: PageRect::from_corners(start, end) }),
        Tool::Ellipse => Some(AnnotationGeometry::Ellipse { bounds: PageRect::from_corners(start, end) }),
        // begin_drag sends the text tool to TextEntry, never Dragging
        Tool::Text => None,
    }
}

/// Zero extent is always degenerate, whatever `min_drag_px` says
fn is_degenerate(geometry: &AnnotationGeometry, mapper: &CoordinateMapper, min_drag_px: f32) -> bool {
    let too_short = |page_length: f32| {
        let length = mapper.to_view_length(page_length);
        length <= 0.0 || length < min_drag_px
    };

    match geometry {
        AnnotationGeometry::Line { start, end } => too_short(start.distance_to(end)),
        AnnotationGeometry::Rectangle { bounds } | AnnotationGeometry::Ellipse { bounds } => {
            too_short(bounds.width()) || too_short(bounds.height())
        }
        AnnotationGeometry::TextBox { .. } => false,
    }
}

fn commit(
    page_index: u32,
    geometry: AnnotationGeometry,
    actors: &ActorRegistry,
    store: &mut AnnotationStore,
    style: &ShapeStyle,
) -> OverlayResult<AnnotationId> {
    let actor = actors.active();
    let annotation = Annotation::new(page_index, geometry, actor.color(), actor.id(), style.stroke_width);
    let kind = annotation.kind();
    let id = store.add(annotation)?;
    log::info!("committed {kind:?} {id} on page {page_index} for actor {}", actor.display_name());
    Ok(id)
}
