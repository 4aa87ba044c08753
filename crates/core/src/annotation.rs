//! Annotation data model
//!
//! All coordinates are stored in PDF page space, never in view space, so that
//! zooming or resizing the window can never move an annotation.

use crate::actor::ActorId;
use crate::error::{OverlayError, OverlayResult};
use serde::{Deserialize, Serialize};

/// Unique identifier for an annotation
///
/// Generated using UUID v4 for guaranteed uniqueness.
pub type AnnotationId = uuid::Uuid;

/// Average glyph advance used to estimate text box extents, as a fraction of the font size.
const GLYPH_WIDTH_FACTOR: f32 = 0.5;
const LINE_HEIGHT_FACTOR: f32 = 1.2;

/// Page-local coordinate in PDF page space
///
/// Uses PDF coordinate system:
/// - Origin (0, 0) at bottom-left of page
/// - X increases to the right
/// - Y increases upward
/// - Units are in points (1/72 inch)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageCoordinate {
    pub x: f32,
    pub y: f32,
}

impl PageCoordinate {
    /// Create a new page coordinate
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Calculate distance to another coordinate
    pub fn distance_to(&self, other: &PageCoordinate) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Axis-aligned rectangle in page space with `min` at the lower-left corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageRect {
    pub min: PageCoordinate,
    pub max: PageCoordinate,
}

impl PageRect {
    /// Build a normalized rectangle from any two opposite corners
    pub fn from_corners(a: PageCoordinate, b: PageCoordinate) -> Self {
        Self {
            min: PageCoordinate::new(a.x.min(b.x), a.y.min(b.y)),
            max: PageCoordinate::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> PageCoordinate {
        PageCoordinate::new((self.min.x + self.max.x) / 2.0, (self.min.y + self.max.y) / 2.0)
    }

    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    pub fn contains(&self, point: &PageCoordinate, tolerance: f32) -> bool {
        point.x >= self.min.x - tolerance
            && point.x <= self.max.x + tolerance
            && point.y >= self.min.y - tolerance
            && point.y <= self.max.y + tolerance
    }

    fn translated(&self, dx: f32, dy: f32) -> Self {
        Self { min: self.min.translated(dx, dy), max: self.max.translated(dx, dy) }
    }
}

/// RGB color representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    /// Create an opaque color
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Convert to normalized RGB values (0.0 to 1.0)
    pub fn to_normalized(&self) -> (f32, f32, f32) {
        (self.r as f32 / 255.0, self.g as f32 / 255.0, self.b as f32 / 255.0)
    }

    pub fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// Common annotation colors
impl Color {
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const GREEN: Color = Color::rgb(0, 255, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const GRAY: Color = Color::rgb(128, 128, 128);
}

/// Shape kind of an annotation, without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnnotationKind {
    Line,
    Rectangle,
    Ellipse,
    TextBox,
}

/// Annotation geometry in page space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnnotationGeometry {
    /// Line segment from start to end point
    Line { start: PageCoordinate, end: PageCoordinate },

    /// Rectangle outline
    Rectangle { bounds: PageRect },

    /// Ellipse inscribed in its bounding box
    Ellipse { bounds: PageRect },

    /// Text whose first line hangs from `anchor` (the top-left corner of the box)
    TextBox { anchor: PageCoordinate, text: String, font_size: f32 },
}

impl AnnotationGeometry {
    pub fn kind(&self) -> AnnotationKind {
        match self {
            AnnotationGeometry::Line { .. } => AnnotationKind::Line,
            AnnotationGeometry::Rectangle { .. } => AnnotationKind::Rectangle,
            AnnotationGeometry::Ellipse { .. } => AnnotationKind::Ellipse,
            AnnotationGeometry::TextBox { .. } => AnnotationKind::TextBox,
        }
    }

    /// Get the bounding box for this geometry
    pub fn bounding_box(&self) -> PageRect {
        match self {
            AnnotationGeometry::Line { start, end } => PageRect::from_corners(*start, *end),
            AnnotationGeometry::Rectangle { bounds } | AnnotationGeometry::Ellipse { bounds } => {
                *bounds
            }
            AnnotationGeometry::TextBox { anchor, text, font_size } => {
                // Conservative estimate - actual bounds depend on text rendering
                let columns = text.lines().map(|line| line.chars().count()).max().unwrap_or(0);
                let rows = text.lines().count().max(1);
                let width = columns as f32 * font_size * GLYPH_WIDTH_FACTOR;
                let height = rows as f32 * font_size * LINE_HEIGHT_FACTOR;
                PageRect::from_corners(*anchor, anchor.translated(width, -height))
            }
        }
    }

    pub fn is_finite(&self) -> bool {
        match self {
            AnnotationGeometry::Line { start, end } => start.is_finite() && end.is_finite(),
            AnnotationGeometry::Rectangle { bounds } | AnnotationGeometry::Ellipse { bounds } => {
                bounds.is_finite()
            }
            AnnotationGeometry::TextBox { anchor, font_size, .. } => {
                anchor.is_finite() && font_size.is_finite()
            }
        }
    }

    /// Same shape shifted by `(dx, dy)` points
    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        match self {
            AnnotationGeometry::Line { start, end } => AnnotationGeometry::Line {
                start: start.translated(dx, dy),
                end: end.translated(dx, dy),
            },
            AnnotationGeometry::Rectangle { bounds } => {
                AnnotationGeometry::Rectangle { bounds: bounds.translated(dx, dy) }
            }
            AnnotationGeometry::Ellipse { bounds } => {
                AnnotationGeometry::Ellipse { bounds: bounds.translated(dx, dy) }
            }
            AnnotationGeometry::TextBox { anchor, text, font_size } => AnnotationGeometry::TextBox {
                anchor: anchor.translated(dx, dy),
                text: text.clone(),
                font_size: *font_size,
            },
        }
    }

    /// Check if a point is near this geometry (within tolerance)
    ///
    /// Used for hit testing during selection.
    pub fn contains_point(&self, point: &PageCoordinate, tolerance: f32) -> bool {
        match self {
            AnnotationGeometry::Line { start, end } => {
                point_near_line_segment(point, start, end, tolerance)
            }
            AnnotationGeometry::Rectangle { bounds } => {
                let inner_tolerance = -tolerance;
                bounds.contains(point, tolerance)
                    && !(bounds.width() > 2.0 * tolerance
                        && bounds.height() > 2.0 * tolerance
                        && bounds.contains(point, inner_tolerance))
            }
            AnnotationGeometry::Ellipse { bounds } => {
                let rx = bounds.width() / 2.0;
                let ry = bounds.height() / 2.0;
                if rx <= f32::EPSILON || ry <= f32::EPSILON {
                    return bounds.contains(point, tolerance);
                }
                let center = bounds.center();
                let dx = (point.x - center.x) / rx;
                let dy = (point.y - center.y) / ry;
                let dist = (dx * dx + dy * dy).sqrt();
                (dist - 1.0).abs() * rx.max(ry) <= tolerance
            }
            AnnotationGeometry::TextBox { .. } => self.bounding_box().contains(point, 0.0),
        }
    }

    fn validate(&self) -> OverlayResult<()> {
        if !self.is_finite() {
            return Err(OverlayError::InvalidGeometry("coordinates must be finite".to_owned()));
        }

        if let AnnotationGeometry::TextBox { text, font_size, .. } = self {
            if text.trim().is_empty() {
                return Err(OverlayError::InvalidGeometry("text must not be empty".to_owned()));
            }
            if *font_size <= 0.0 {
                return Err(OverlayError::InvalidGeometry("font size must be positive".to_owned()));
            }
        }

        Ok(())
    }
}

/// Helper function for point-to-line-segment distance check
fn point_near_line_segment(
    point: &PageCoordinate,
    start: &PageCoordinate,
    end: &PageCoordinate,
    tolerance: f32,
) -> bool {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let length_sq = dx * dx + dy * dy;

    if length_sq < 1e-6 {
        // Degenerate line segment
        return point.distance_to(start) <= tolerance;
    }

    // Project point onto line segment
    let t = ((point.x - start.x) * dx + (point.y - start.y) * dy) / length_sq;
    let t = t.clamp(0.0, 1.0);

    let closest = PageCoordinate::new(start.x + t * dx, start.y + t * dy);
    point.distance_to(&closest) <= tolerance
}

/// A committed annotation
///
/// The color is resolved from the author's actor profile when the annotation
/// is created and is never looked up again, so recoloring or deleting the
/// actor leaves existing annotations as they were drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    id: AnnotationId,
    page_index: u32,
    geometry: AnnotationGeometry,
    color: Color,
    actor_id: ActorId,
    stroke_width: f32,
}

impl Annotation {
    /// Create a new annotation with generated ID
    pub fn new(
        page_index: u32,
        geometry: AnnotationGeometry,
        color: Color,
        actor_id: ActorId,
        stroke_width: f32,
    ) -> Self {
        Self {
            id: AnnotationId::new_v4(),
            page_index,
            geometry,
            color,
            actor_id,
            stroke_width,
        }
    }

    pub fn id(&self) -> AnnotationId {
        self.id
    }

    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    pub fn kind(&self) -> AnnotationKind {
        self.geometry.kind()
    }

    pub fn geometry(&self) -> &AnnotationGeometry {
        &self.geometry
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn actor_id(&self) -> ActorId {
        self.actor_id
    }

    pub fn stroke_width(&self) -> f32 {
        self.stroke_width
    }

    pub fn bounding_box(&self) -> PageRect {
        self.geometry.bounding_box()
    }

    /// Check if a point hits this annotation (for selection)
    pub fn hit_test(&self, point: &PageCoordinate, tolerance: f32) -> bool {
        let reach = tolerance + self.stroke_width / 2.0;
        self.geometry.contains_point(point, reach)
    }

    /// Move by `(dx, dy)` page points
    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.geometry = self.geometry.translated(dx, dy);
    }

    /// Replace the geometry (resize); the store rejects a change of kind
    pub fn set_geometry(&mut self, geometry: AnnotationGeometry) {
        self.geometry = geometry;
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn set_stroke_width(&mut self, stroke_width: f32) {
        self.stroke_width = stroke_width;
    }

    /// Replace the text of a text box; no-op for other kinds
    pub fn set_text(&mut self, new_text: impl Into<String>) {
        if let AnnotationGeometry::TextBox { text, .. } = &mut self.geometry {
            *text = new_text.into();
        }
    }

    /// Check the invariants every stored annotation must hold
    pub fn validate(&self) -> OverlayResult<()> {
        if !self.stroke_width.is_finite() || self.stroke_width <= 0.0 {
            return Err(OverlayError::InvalidGeometry(format!(
                "stroke width must be positive, got {}",
                self.stroke_width
            )));
        }

        self.geometry.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor() -> ActorId {
        ActorId(1)
    }

    #[test]
    fn test_page_coordinate_distance() {
        let p1 = PageCoordinate::new(0.0, 0.0);
        let p2 = PageCoordinate::new(3.0, 4.0);
        assert!((p1.distance_to(&p2) - 5.0).abs() < 0.001);
    }

    #[test]
    fn test_color_normalization() {
        let color = Color::rgb(255, 128, 0);
        let (r, g, b) = color.to_normalized();
        assert!((r - 1.0).abs() < 0.001);
        assert!((g - 0.502).abs() < 0.01);
        assert!((b - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_rect_from_corners_is_normalized() {
        let rect =
            PageRect::from_corners(PageCoordinate::new(50.0, 10.0), PageCoordinate::new(10.0, 40.0));
        assert_eq!(rect.min, PageCoordinate::new(10.0, 10.0));
        assert_eq!(rect.max, PageCoordinate::new(50.0, 40.0));
        assert_eq!(rect.width(), 40.0);
        assert_eq!(rect.height(), 30.0);
    }

    #[test]
    fn test_line_bounding_box() {
        let geometry = AnnotationGeometry::Line {
            start: PageCoordinate::new(10.0, 80.0),
            end: PageCoordinate::new(50.0, 20.0),
        };
        let bounds = geometry.bounding_box();
        assert_eq!(bounds.min, PageCoordinate::new(10.0, 20.0));
        assert_eq!(bounds.max, PageCoordinate::new(50.0, 80.0));
    }

    #[test]
    fn test_text_box_hangs_below_anchor() {
        let geometry = AnnotationGeometry::TextBox {
            anchor: PageCoordinate::new(100.0, 700.0),
            text: "ab\nabcd".to_owned(),
            font_size: 10.0,
        };
        let bounds = geometry.bounding_box();
        assert_eq!(bounds.max, PageCoordinate::new(120.0, 700.0));
        assert!((bounds.min.y - 676.0).abs() < 0.001);
    }

    #[test]
    fn test_translate_keeps_kind_and_size() {
        let mut annotation = Annotation::new(
            0,
            AnnotationGeometry::Ellipse {
                bounds: PageRect::from_corners(
                    PageCoordinate::new(0.0, 0.0),
                    PageCoordinate::new(20.0, 10.0),
                ),
            },
            Color::RED,
            actor(),
            2.0,
        );

        annotation.translate(5.0, -5.0);

        let bounds = annotation.bounding_box();
        assert_eq!(annotation.kind(), AnnotationKind::Ellipse);
        assert_eq!(bounds.min, PageCoordinate::new(5.0, -5.0));
        assert_eq!(bounds.width(), 20.0);
    }

    #[test]
    fn test_hit_testing_rectangle_outline() {
        let annotation = Annotation::new(
            0,
            AnnotationGeometry::Rectangle {
                bounds: PageRect::from_corners(
                    PageCoordinate::new(0.0, 0.0),
                    PageCoordinate::new(100.0, 100.0),
                ),
            },
            Color::RED,
            actor(),
            2.0,
        );

        assert!(annotation.hit_test(&PageCoordinate::new(100.0, 50.0), 2.0));
        assert!(!annotation.hit_test(&PageCoordinate::new(50.0, 50.0), 2.0));
        assert!(!annotation.hit_test(&PageCoordinate::new(150.0, 50.0), 2.0));
    }

    #[test]
    fn test_hit_testing_ellipse() {
        let geometry = AnnotationGeometry::Ellipse {
            bounds: PageRect::from_corners(
                PageCoordinate::new(75.0, 75.0),
                PageCoordinate::new(125.0, 125.0),
            ),
        };

        assert!(geometry.contains_point(&PageCoordinate::new(125.0, 100.0), 5.0));
        assert!(!geometry.contains_point(&PageCoordinate::new(100.0, 100.0), 5.0));
        assert!(!geometry.contains_point(&PageCoordinate::new(200.0, 200.0), 5.0));
    }

    #[test]
    fn test_validate_rejects_nan_and_blank_text() {
        let nan_line = Annotation::new(
            0,
            AnnotationGeometry::Line {
                start: PageCoordinate::new(f32::NAN, 0.0),
                end: PageCoordinate::new(1.0, 1.0),
            },
            Color::RED,
            actor(),
            2.0,
        );
        assert!(matches!(nan_line.validate(), Err(OverlayError::InvalidGeometry(_))));

        let blank_text = Annotation::new(
            0,
            AnnotationGeometry::TextBox {
                anchor: PageCoordinate::new(0.0, 0.0),
                text: "   ".to_owned(),
                font_size: 12.0,
            },
            Color::RED,
            actor(),
            1.0,
        );
        assert!(blank_text.validate().is_err());
    }

    #[test]
    fn test_set_text_only_touches_text_boxes() {
        let mut line = Annotation::new(
            0,
            AnnotationGeometry::Line {
                start: PageCoordinate::new(0.0, 0.0),
                end: PageCoordinate::new(1.0, 1.0),
            },
            Color::RED,
            actor(),
            2.0,
        );
        let before = line.clone();
        line.set_text("ignored");
        assert_eq!(line, before);
    }
}
