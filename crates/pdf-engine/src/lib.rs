use image::{ImageBuffer, Rgba};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

mod overlay;

pub use overlay::{DrawPrimitive, PrimitiveShape, StrokeStyle};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

const DEFAULT_PAGE_SIZE: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_index: u32,
    pub scale: f32,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self { page_index: 0, scale: 1.0 }
    }
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("invalid primitive: {0}")]
    InvalidPrimitive(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// The document engine the overlay core drives.
///
/// Page indices are 0-based. Primitives are expressed in PDF page space
/// (points, origin at the lower-left corner of the page box).
pub trait PdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError>;
    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError>;
    /// Queue a primitive to be burned into the page content on the next `serialize`.
    fn draw_primitive(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        primitive: &DrawPrimitive,
    ) -> Result<(), PdfEngineError>;
    /// Open an independent copy of `handle`, including any primitives already queued on it.
    fn fork(&mut self, handle: DocumentHandle) -> Result<DocumentHandle, PdfEngineError>;
    fn serialize(&self, handle: DocumentHandle) -> Result<Vec<u8>, PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PageBox {
    origin_x: f32,
    origin_y: f32,
    size: PageSize,
}

#[derive(Debug, Clone)]
struct DocumentRecord {
    document: Document,
    page_ids: Vec<ObjectId>,
    page_boxes: Vec<PageBox>,
    overlays: BTreeMap<u32, Vec<DrawPrimitive>>,
}

#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse(bytes: &[u8]) -> Result<DocumentRecord, PdfEngineError> {
        let document = match Document::load_mem(bytes) {
            Ok(document) => document,
            // decryption failures surface as load errors
            Err(error) if has_encrypt_marker(bytes) => {
                log::debug!("load failed on encrypted input: {error}");
                return Err(PdfEngineError::EncryptedUnsupported);
            }
            Err(error) => return Err(error.into()),
        };
        if document.trailer.get(b"Encrypt").is_ok() {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let pages = document.get_pages();
        let mut page_ids = Vec::with_capacity(pages.len());
        let mut page_boxes = Vec::with_capacity(pages.len());

        for (_, object_id) in pages {
            page_boxes.push(media_box(&document, object_id));
            page_ids.push(object_id);
        }

        if page_ids.is_empty() {
            log::warn!("document has an empty page tree");
        }

        Ok(DocumentRecord { document, page_ids, page_boxes, overlays: BTreeMap::new() })
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }

    fn record_mut(&mut self, handle: DocumentHandle) -> Result<&mut DocumentRecord, PdfEngineError> {
        self.docs.get_mut(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }

    fn insert(&mut self, record: DocumentRecord) -> DocumentHandle {
        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        self.docs.insert(handle, record);
        handle
    }
}

impl DocumentRecord {
    fn page_box(&self, page_index: u32) -> Result<PageBox, PdfEngineError> {
        self.page_boxes.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: self.page_boxes.len() as u32,
        })
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let record = Self::parse(&bytes)?;
        log::debug!("opened PDF with {} page(s)", record.page_ids.len());

        Ok(self.insert(record))
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.record(handle)?.page_ids.len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        Ok(self.record(handle)?.page_box(page_index)?.size)
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        let page_size = self.page_size(handle, request.page_index)?;
        let scale = if request.scale.is_finite() && request.scale > 0.0 { request.scale } else { 1.0 };

        let width = (page_size.width_pt * scale).round().max(1.0) as u32;
        let height = (page_size.height_pt * scale).round().max(1.0) as u32;

        // The lopdf backend does not rasterize page content; it hands back a
        // correctly sized blank sheet so callers can lay out and overlay.
        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                image.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                image.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                image.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        Ok(image)
    }

    fn draw_primitive(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        primitive: &DrawPrimitive,
    ) -> Result<(), PdfEngineError> {
        primitive.validate()?;

        let record = self.record_mut(handle)?;
        record.page_box(page_index)?;
        record.overlays.entry(page_index).or_default().push(primitive.clone());

        Ok(())
    }

    fn fork(&mut self, handle: DocumentHandle) -> Result<DocumentHandle, PdfEngineError> {
        let record = self.record(handle)?.clone();
        Ok(self.insert(record))
    }

    fn serialize(&self, handle: DocumentHandle) -> Result<Vec<u8>, PdfEngineError> {
        let record = self.record(handle)?;
        let mut document = record.document.clone();
        let mut font_id = None;

        for (page_index, primitives) in &record.overlays {
            let page_id = record.page_ids[*page_index as usize];
            let page_box = record.page_box(*page_index)?;

            if primitives.iter().any(DrawPrimitive::is_text) && font_id.is_none() {
                font_id = Some(document.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => "Helvetica",
                    "Encoding" => "WinAnsiEncoding",
                }));
            }

            overlay::burn_into_page(
                &mut document,
                page_id,
                (page_box.origin_x, page_box.origin_y),
                primitives,
                font_id,
            )?;
        }

        let mut bytes = Vec::new();
        document.save_to(&mut bytes)?;
        Ok(bytes)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}

/// Build an unannotated document with one empty page per entry of `pages`.
///
/// An empty slice yields a valid document with an empty page tree.
pub fn blank_document(pages: &[PageSize]) -> Result<Vec<u8>, PdfEngineError> {
    let mut document = Document::with_version("1.7");
    let pages_id = document.new_object_id();

    let kids: Vec<Object> = pages
        .iter()
        .map(|size| {
            document
                .add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![0.into(), 0.into(), size.width_pt.into(), size.height_pt.into()],
                    "Resources" => Dictionary::new(),
                })
                .into()
        })
        .collect();

    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
        }),
    );

    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    document.save_to(&mut bytes)?;
    Ok(bytes)
}

fn has_encrypt_marker(bytes: &[u8]) -> bool {
    bytes.windows(b"/Encrypt".len()).any(|window| window == b"/Encrypt")
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => document.get_object(*id).unwrap_or(object),
        other => other,
    }
}

/// Look up a page attribute, following `/Parent` for inheritable keys.
fn inherited_attribute<'a>(
    document: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = Some(page_id);
    let mut depth = 0;

    while let Some(id) = current {
        let dict = document.get_dictionary(id).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(resolve(document, value));
        }

        depth += 1;
        if depth > 64 {
            return None;
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }

    None
}

fn media_box(document: &Document, page_id: ObjectId) -> PageBox {
    inherited_attribute(document, page_id, b"MediaBox")
        .and_then(|obj| obj.as_array().ok())
        .and_then(|array| {
            if array.len() != 4 {
                return None;
            }
            let x0 = resolve(document, &array[0]).as_float().ok()?;
            let y0 = resolve(document, &array[1]).as_float().ok()?;
            let x1 = resolve(document, &array[2]).as_float().ok()?;
            let y1 = resolve(document, &array[3]).as_float().ok()?;
            Some(PageBox {
                origin_x: x0.min(x1),
                origin_y: y0.min(y1),
                size: PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() },
            })
        })
        .unwrap_or(PageBox { origin_x: 0.0, origin_y: 0.0, size: DEFAULT_PAGE_SIZE })
}
