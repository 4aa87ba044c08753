//! Burning vector/text primitives into page content streams.
//!
//! Each page that receives primitives gets its original content wrapped in
//! `q … Q` so that any graphics state it leaves behind cannot leak into the
//! overlay, followed by one overlay stream that draws every primitive in the
//! order it was queued.

use crate::PdfEngineError;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;

/// Resource name under which the overlay font is registered on a page.
pub const OVERLAY_FONT: &str = "OvHelv";

/// Bézier control-point factor for approximating a quarter ellipse.
const KAPPA: f32 = 0.552_284_8;

const LINE_SPACING: f32 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    /// RGB, 0-255 per channel.
    pub color: [u8; 3],
    /// Line width in points.
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveShape {
    Line { x1: f32, y1: f32, x2: f32, y2: f32 },
    Rect { x: f32, y: f32, width: f32, height: f32 },
    /// Ellipse inscribed in the given rectangle.
    Ellipse { x: f32, y: f32, width: f32, height: f32 },
    /// `(x, y)` is the baseline origin of the first line.
    Text { x: f32, y: f32, size: f32, text: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawPrimitive {
    pub shape: PrimitiveShape,
    pub stroke: StrokeStyle,
}

impl DrawPrimitive {
    pub fn is_text(&self) -> bool {
        matches!(self.shape, PrimitiveShape::Text { .. })
    }

    pub(crate) fn validate(&self) -> Result<(), PdfEngineError> {
        let invalid = |reason: &str| Err(PdfEngineError::InvalidPrimitive(reason.to_owned()));

        if !self.stroke.width.is_finite() || self.stroke.width <= 0.0 {
            return invalid("stroke width must be a positive finite number");
        }

        match &self.shape {
            PrimitiveShape::Line { x1, y1, x2, y2 } => {
                if ![x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
                    return invalid("line coordinates must be finite");
                }
            }
            PrimitiveShape::Rect { x, y, width, height }
            | PrimitiveShape::Ellipse { x, y, width, height } => {
                if ![x, y, width, height].iter().all(|v| v.is_finite()) {
                    return invalid("box coordinates must be finite");
                }
                if *width < 0.0 || *height < 0.0 {
                    return invalid("box extent must not be negative");
                }
            }
            PrimitiveShape::Text { x, y, size, text } => {
                if !x.is_finite() || !y.is_finite() {
                    return invalid("text origin must be finite");
                }
                if !size.is_finite() || *size <= 0.0 {
                    return invalid("font size must be a positive finite number");
                }
                if text.is_empty() {
                    return invalid("text must not be empty");
                }
            }
        }

        Ok(())
    }
}

/// Append `primitives` to the page, in order, as an isolated overlay stream.
pub(crate) fn burn_into_page(
    document: &mut Document,
    page_id: ObjectId,
    origin: (f32, f32),
    primitives: &[DrawPrimitive],
    font_id: Option<ObjectId>,
) -> Result<(), PdfEngineError> {
    if primitives.is_empty() {
        return Ok(());
    }

    if let Some(font_id) = font_id.filter(|_| primitives.iter().any(DrawPrimitive::is_text)) {
        page_resources_mut(document, page_id)?
            .get_mut(b"Font")?
            .as_dict_mut()?
            .set(OVERLAY_FONT, font_id);
    }

    let overlay = overlay_content(origin, primitives)?;

    let mut contents = match document.get_dictionary(page_id)?.get(b"Contents") {
        Ok(Object::Reference(id)) => match document.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    let save_id = document.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let restore_id = document.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
    let overlay_id = document.add_object(Stream::new(Dictionary::new(), overlay));

    contents.insert(0, Object::Reference(save_id));
    contents.push(Object::Reference(restore_id));
    contents.push(Object::Reference(overlay_id));

    document.get_object_mut(page_id)?.as_dict_mut()?.set("Contents", Object::Array(contents));

    Ok(())
}

/// The page's own resource dictionary with a `/Font` sub-dictionary present.
///
/// Inherited resources are copied onto the page first so that adding the
/// overlay font does not shadow fonts the original content relies on.
fn page_resources_mut(
    document: &mut Document,
    page_id: ObjectId,
) -> Result<&mut Dictionary, PdfEngineError> {
    let own = document.get_dictionary(page_id)?.get(b"Resources").ok().cloned();

    let resources_id = match own {
        Some(Object::Reference(id)) => Some(id),
        Some(Object::Dictionary(_)) => None,
        _ => {
            let inherited = crate::inherited_attribute(document, page_id, b"Resources")
                .and_then(|obj| obj.as_dict().ok())
                .cloned()
                .unwrap_or_default();
            document.get_object_mut(page_id)?.as_dict_mut()?.set("Resources", inherited);
            None
        }
    };

    let fonts_id = {
        let resources = match resources_id {
            Some(id) => document.get_object(id)?.as_dict()?,
            None => document.get_dictionary(page_id)?.get(b"Resources")?.as_dict()?,
        };
        match resources.get(b"Font") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        }
    };

    // Inline the font dictionary so the page can gain an entry without
    // mutating a dictionary other pages may share.
    let inline_fonts = match fonts_id {
        Some(id) => document.get_object(id)?.as_dict()?.clone(),
        None => Dictionary::new(),
    };

    let resources = match resources_id {
        Some(id) => document.get_object_mut(id)?.as_dict_mut()?,
        None => document.get_object_mut(page_id)?.as_dict_mut()?.get_mut(b"Resources")?.as_dict_mut()?,
    };

    if fonts_id.is_some() || !resources.has(b"Font") {
        resources.set("Font", inline_fonts);
    }

    Ok(resources)
}

fn overlay_content(origin: (f32, f32), primitives: &[DrawPrimitive]) -> Result<Vec<u8>, PdfEngineError> {
    let mut stream = Vec::new();

    writeln!(&mut stream, "q")?;
    if origin != (0.0, 0.0) {
        writeln!(&mut stream, "1 0 0 1 {} {} cm", origin.0, origin.1)?;
    }

    for primitive in primitives {
        write_primitive(&mut stream, primitive)?;
    }

    writeln!(&mut stream, "Q")?;
    Ok(stream)
}

fn write_primitive(stream: &mut Vec<u8>, primitive: &DrawPrimitive) -> Result<(), PdfEngineError> {
    let [r, g, b] = primitive.stroke.color.map(|channel| channel as f32 / 255.0);

    writeln!(stream, "q")?;

    match &primitive.shape {
        PrimitiveShape::Line { x1, y1, x2, y2 } => {
            writeln!(stream, "{} {} {} RG", r, g, b)?;
            writeln!(stream, "{} w", primitive.stroke.width)?;
            writeln!(stream, "{} {} m", x1, y1)?;
            writeln!(stream, "{} {} l", x2, y2)?;
            writeln!(stream, "S")?;
        }

        PrimitiveShape::Rect { x, y, width, height } => {
            writeln!(stream, "{} {} {} RG", r, g, b)?;
            writeln!(stream, "{} w", primitive.stroke.width)?;
            writeln!(stream, "{} {} {} {} re", x, y, width, height)?;
            writeln!(stream, "S")?;
        }

        PrimitiveShape::Ellipse { x, y, width, height } => {
            let rx = width / 2.0;
            let ry = height / 2.0;
            let cx = x + rx;
            let cy = y + ry;
            let kx = rx * KAPPA;
            let ky = ry * KAPPA;

            writeln!(stream, "{} {} {} RG", r, g, b)?;
            writeln!(stream, "{} w", primitive.stroke.width)?;
            writeln!(stream, "{} {} m", cx + rx, cy)?;
            writeln!(stream, "{} {} {} {} {} {} c", cx + rx, cy + ky, cx + kx, cy + ry, cx, cy + ry)?;
            writeln!(stream, "{} {} {} {} {} {} c", cx - kx, cy + ry, cx - rx, cy + ky, cx - rx, cy)?;
            writeln!(stream, "{} {} {} {} {} {} c", cx - rx, cy - ky, cx - kx, cy - ry, cx, cy - ry)?;
            writeln!(stream, "{} {} {} {} {} {} c", cx + kx, cy - ry, cx + rx, cy - ky, cx + rx, cy)?;
            writeln!(stream, "s")?;
        }

        PrimitiveShape::Text { x, y, size, text } => {
            writeln!(stream, "{} {} {} rg", r, g, b)?;
            writeln!(stream, "BT")?;
            writeln!(stream, "/{} {} Tf", OVERLAY_FONT, size)?;
            writeln!(stream, "{} TL", size * LINE_SPACING)?;
            writeln!(stream, "{} {} Td", x, y)?;

            for (index, line) in text.lines().enumerate() {
                if index > 0 {
                    writeln!(stream, "T*")?;
                }
                stream.push(b'(');
                stream.extend(escape_text(line));
                stream.extend_from_slice(b") Tj\n");
            }

            writeln!(stream, "ET")?;
        }
    }

    writeln!(stream, "Q")?;
    Ok(())
}

/// Encode as WinAnsi for the standard Helvetica font and escape string delimiters.
fn escape_text(text: &str) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(text.len());

    for ch in text.chars() {
        let byte = match u32::from(ch) {
            code @ (0x20..=0x7e | 0xa0..=0xff) => code as u8,
            _ => b'?',
        };
        if matches!(byte, b'\\' | b'(' | b')') {
            encoded.push(b'\\');
        }
        encoded.push(byte);
    }

    encoded
}
