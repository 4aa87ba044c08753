//! View-space ⇄ page-space transform for one page
//!
//! View space is the rendered page bitmap: origin at its top-left corner
//! shifted by the pan offset, y down, units are pixels. Page space is PDF
//! points with the origin at the bottom-left, y up.

use crate::annotation::PageCoordinate;
use pdf_engine::PageSize;

/// Minimum display scale (10%).
pub const MIN_SCALE: f32 = 0.1;
/// Maximum display scale (1600%).
pub const MAX_SCALE: f32 = 16.0;

/// A point in view space (pixels, y down)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewPoint {
    pub x: f32,
    pub y: f32,
}

impl ViewPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn distance_to(&self, other: &ViewPoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Maps pointer positions to page coordinates and back
///
/// Changing scale or offset only changes how stored geometry is displayed,
/// never the geometry itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    page_size: PageSize,
    scale: f32,
    offset_x: f32,
    offset_y: f32,
}

impl CoordinateMapper {
    pub fn new(page_size: PageSize) -> Self {
        Self { page_size, scale: 1.0, offset_x: 0.0, offset_y: 0.0 }
    }

    pub fn with_scale(page_size: PageSize, scale: f32) -> Self {
        let mut mapper = Self::new(page_size);
        mapper.set_scale(scale);
        mapper
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn offset(&self) -> (f32, f32) {
        (self.offset_x, self.offset_y)
    }

    /// Switch to another page, keeping scale and pan
    pub fn set_page_size(&mut self, page_size: PageSize) {
        self.page_size = page_size;
    }

    pub fn to_page(&self, point: ViewPoint) -> PageCoordinate {
        PageCoordinate::new(
            (point.x - self.offset_x) / self.scale,
            self.page_size.height_pt - (point.y - self.offset_y) / self.scale,
        )
    }

    pub fn to_view(&self, point: PageCoordinate) -> ViewPoint {
        ViewPoint::new(
            point.x * self.scale + self.offset_x,
            (self.page_size.height_pt - point.y) * self.scale + self.offset_y,
        )
    }

    /// Convert a page-space length to view pixels
    pub fn to_view_length(&self, length: f32) -> f32 {
        length * self.scale
    }

    /// Set the display scale, clamped to [`MIN_SCALE`]..=[`MAX_SCALE`]
    ///
    /// Non-finite or non-positive values are ignored.
    pub fn set_scale(&mut self, scale: f32) {
        if !scale.is_finite() || scale <= 0.0 {
            log::warn!("ignoring invalid scale {scale}");
            return;
        }
        self.scale = scale.clamp(MIN_SCALE, MAX_SCALE);
    }

    /// Zoom by `factor`, keeping the page point under `anchor` fixed on screen
    pub fn zoom_at(&mut self, anchor: ViewPoint, factor: f32) {
        if !anchor.is_finite() || !factor.is_finite() || factor <= 0.0 {
            log::warn!("ignoring invalid zoom factor {factor} at {anchor:?}");
            return;
        }

        let new_scale = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
        if (new_scale - self.scale).abs() < f32::EPSILON {
            return;
        }

        let page_point = self.to_page(anchor);
        self.scale = new_scale;

        // Adjust offset so page_point stays under the anchor
        let moved = self.to_view(page_point);
        self.offset_x += anchor.x - moved.x;
        self.offset_y += anchor.y - moved.y;
    }

    /// Shift the view by a delta in view pixels
    pub fn pan(&mut self, dx: f32, dy: f32) {
        if !dx.is_finite() || !dy.is_finite() {
            log::warn!("ignoring invalid pan ({dx}, {dy})");
            return;
        }
        self.offset_x += dx;
        self.offset_y += dy;
    }

    pub fn reset_view(&mut self) {
        self.scale = 1.0;
        self.offset_x = 0.0;
        self.offset_y = 0.0;
    }

    /// Pull a page point onto the page rectangle
    pub fn clamp_to_page(&self, point: PageCoordinate) -> PageCoordinate {
        PageCoordinate::new(
            point.x.clamp(0.0, self.page_size.width_pt),
            point.y.clamp(0.0, self.page_size.height_pt),
        )
    }

    /// Size of the rendered page in view pixels
    pub fn view_size(&self) -> (f32, f32) {
        (self.page_size.width_pt * self.scale, self.page_size.height_pt * self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter() -> PageSize {
        PageSize { width_pt: 612.0, height_pt: 792.0 }
    }

    fn assert_close(a: PageCoordinate, b: PageCoordinate) {
        assert!((a.x - b.x).abs() < 1e-3 && (a.y - b.y).abs() < 1e-3, "{a:?} != {b:?}");
    }

    #[test]
    fn flips_y_axis_at_unit_scale() {
        let mapper = CoordinateMapper::new(letter());
        assert_eq!(mapper.to_page(ViewPoint::new(0.0, 0.0)), PageCoordinate::new(0.0, 792.0));
        assert_eq!(mapper.to_page(ViewPoint::new(10.0, 792.0)), PageCoordinate::new(10.0, 0.0));
    }

    #[test]
    fn round_trips_under_zoom_and_pan() {
        let mut mapper = CoordinateMapper::with_scale(letter(), 2.5);
        mapper.pan(-37.0, 12.5);

        for point in [
            PageCoordinate::new(0.0, 0.0),
            PageCoordinate::new(306.0, 396.0),
            PageCoordinate::new(-20.0, 900.0),
            PageCoordinate::new(611.9, 0.1),
        ] {
            assert_close(mapper.to_page(mapper.to_view(point)), point);
        }
    }

    #[test]
    fn scale_is_clamped_and_invalid_input_ignored() {
        let mut mapper = CoordinateMapper::new(letter());
        mapper.set_scale(100.0);
        assert_eq!(mapper.scale(), MAX_SCALE);
        mapper.set_scale(0.01);
        assert_eq!(mapper.scale(), MIN_SCALE);
        mapper.set_scale(f32::NAN);
        assert_eq!(mapper.scale(), MIN_SCALE);
        mapper.pan(f32::INFINITY, 0.0);
        assert_eq!(mapper.offset(), (0.0, 0.0));
    }

    #[test]
    fn zoom_at_keeps_anchor_fixed() {
        let mut mapper = CoordinateMapper::new(letter());
        let anchor = ViewPoint::new(200.0, 300.0);
        let before = mapper.to_page(anchor);

        mapper.zoom_at(anchor, 2.0);

        assert_eq!(mapper.scale(), 2.0);
        assert_close(mapper.to_page(anchor), before);
    }

    #[test]
    fn clamp_to_page_limits_both_axes() {
        let mapper = CoordinateMapper::new(letter());
        assert_eq!(
            mapper.clamp_to_page(PageCoordinate::new(-5.0, 1000.0)),
            PageCoordinate::new(0.0, 792.0)
        );
    }

    #[test]
    fn view_size_tracks_scale() {
        let mapper = CoordinateMapper::with_scale(letter(), 0.5);
        assert_eq!(mapper.view_size(), (306.0, 396.0));
    }
}
