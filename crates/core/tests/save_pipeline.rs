use lopdf::Document;
use pdf_engine::{
    blank_document, DocumentHandle, DrawPrimitive, LopdfEngine, OpenSource, PageSize, PdfEngine,
    PdfEngineError, RenderRequest, RgbaImage,
};
use pdf_overlay_core::{
    ActorRegistry, AnnotationGeometry, CancellationToken, Color, CompositionError, DocumentCompositor,
    DocumentSession, PageCoordinate, PageRect, SessionError, ShapeStyle, Tool, ViewPoint,
};
use std::fs;

fn letter() -> PageSize {
    PageSize { width_pt: 612.0, height_pt: 792.0 }
}

fn five_pages() -> Vec<u8> {
    blank_document(&[letter(); 5]).expect("blank document should build")
}

fn acme() -> ActorRegistry {
    let mut actors = ActorRegistry::new();
    actors.add_actor("Acme", Color::RED).expect("actor should be added");
    actors
}

fn page_content(bytes: &[u8], page_number: u32) -> String {
    let doc = Document::load_mem(bytes).expect("output should parse");
    let page_id = doc.get_pages()[&page_number];
    String::from_utf8_lossy(&doc.get_page_content(page_id).expect("content should load")).into_owned()
}

fn drag<E: PdfEngine>(session: &mut DocumentSession<E>, from: (f32, f32), to: (f32, f32)) {
    session.pointer_down(ViewPoint::new(from.0, from.1)).expect("pointer down should succeed");
    session.pointer_move(ViewPoint::new(to.0, to.1)).expect("pointer move should succeed");
    session
        .pointer_up(ViewPoint::new(to.0, to.1))
        .expect("pointer up should succeed")
        .expect("shape should be committed");
}

/// Delegates to the lopdf engine but fails when asked to draw on one page.
struct FailingEngine {
    inner: LopdfEngine,
    fail_on_page: u32,
    closed: Vec<DocumentHandle>,
}

impl FailingEngine {
    fn new(fail_on_page: u32) -> Self {
        Self { inner: LopdfEngine::new(), fail_on_page, closed: Vec::new() }
    }
}

impl PdfEngine for FailingEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        self.inner.open(source)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        self.inner.page_count(handle)
    }

    fn page_size(&self, handle: DocumentHandle, page_index: u32) -> Result<PageSize, PdfEngineError> {
        self.inner.page_size(handle, page_index)
    }

    fn render_page(&self, handle: DocumentHandle, request: RenderRequest) -> Result<RgbaImage, PdfEngineError> {
        self.inner.render_page(handle, request)
    }

    fn draw_primitive(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        primitive: &DrawPrimitive,
    ) -> Result<(), PdfEngineError> {
        if page_index == self.fail_on_page {
            return Err(PdfEngineError::Backend(format!("injected failure on page {page_index}")));
        }
        self.inner.draw_primitive(handle, page_index, primitive)
    }

    fn fork(&mut self, handle: DocumentHandle) -> Result<DocumentHandle, PdfEngineError> {
        self.inner.fork(handle)
    }

    fn serialize(&self, handle: DocumentHandle) -> Result<Vec<u8>, PdfEngineError> {
        self.inner.serialize(handle)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.closed.push(handle);
        self.inner.close(handle)
    }
}

#[test]
fn drawn_shapes_survive_save_and_reparse() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let target = dir.path().join("annotated.pdf");

    let mut session = DocumentSession::open(
        LopdfEngine::new(),
        OpenSource::Bytes(five_pages()),
        acme(),
        ShapeStyle::default(),
    )
    .expect("session should open");

    session.select_tool(Tool::Rectangle);
    drag(&mut session, (10.0, 10.0), (50.0, 40.0));
    session.next_page().expect("page change should succeed");
    session.select_tool(Tool::Line);
    drag(&mut session, (0.0, 792.0), (100.0, 692.0));

    let report = session.save(&target).expect("save should succeed");
    assert_eq!(report.pages_composed, 2);
    assert_eq!(report.annotations_composed, 2);

    let bytes = fs::read(&target).expect("output should exist");
    assert_eq!(report.bytes_written, bytes.len() as u64);

    let first = page_content(&bytes, 1);
    assert!(first.contains("1 0 0 RG"), "{first}");
    assert!(first.contains("10 752 40 30 re"), "{first}");

    let second = page_content(&bytes, 2);
    assert!(second.contains("0 0 m"), "{second}");
    assert!(second.contains("100 100 l"), "{second}");

    let untouched = page_content(&bytes, 3);
    assert!(!untouched.contains("RG"), "{untouched}");
}

#[test]
fn failure_on_page_three_of_five_leaves_previous_save_untouched() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let target = dir.path().join("report.pdf");

    let mut good = DocumentSession::open(
        LopdfEngine::new(),
        OpenSource::Bytes(five_pages()),
        acme(),
        ShapeStyle::default(),
    )
    .expect("session should open");
    drag(&mut good, (10.0, 10.0), (60.0, 60.0));
    good.save(&target).expect("first save should succeed");
    let saved = fs::read(&target).expect("first save should exist");

    let mut failing = DocumentSession::open(
        FailingEngine::new(2),
        OpenSource::Bytes(five_pages()),
        acme(),
        ShapeStyle::default(),
    )
    .expect("session should open");
    for _ in 0..5 {
        drag(&mut failing, (10.0, 10.0), (60.0, 60.0));
        failing.next_page().expect("page change should succeed");
    }
    assert_eq!(failing.store().pages(), vec![0, 1, 2, 3, 4]);

    let error = failing.save(&target).expect_err("save should fail");
    assert!(
        matches!(error, SessionError::Composition(CompositionError::Engine(PdfEngineError::Backend(_)))),
        "{error}"
    );

    assert_eq!(fs::read(&target).expect("target should still exist"), saved);
    assert_eq!(fs::read_dir(dir.path()).expect("dir should list").count(), 1);
}

#[test]
fn staging_document_is_closed_after_failure() {
    let mut engine = FailingEngine::new(0);
    let handle = engine.open(OpenSource::Bytes(five_pages())).expect("open should succeed");

    let mut store = pdf_overlay_core::AnnotationStore::new();
    store
        .add(pdf_overlay_core::Annotation::new(
            0,
            AnnotationGeometry::Ellipse {
                bounds: PageRect::from_corners(PageCoordinate::new(5.0, 5.0), PageCoordinate::new(25.0, 15.0)),
            },
            Color::GREEN,
            pdf_overlay_core::ActorId(1),
            2.0,
        ))
        .expect("annotation should be added");

    let result = DocumentCompositor::new(&mut engine).compose(handle, &store.snapshot(), &CancellationToken::new());

    assert!(result.is_err());
    assert_eq!(engine.closed.len(), 1);
    assert_ne!(engine.closed[0], handle);
    // the working document is still open and unmodified
    assert_eq!(engine.page_count(handle).expect("working document stays open"), 5);
}

#[test]
fn compositing_follows_commit_order() {
    let mut session = DocumentSession::open(
        LopdfEngine::new(),
        OpenSource::Bytes(blank_document(&[letter()]).expect("blank document should build")),
        acme(),
        ShapeStyle::default(),
    )
    .expect("session should open");

    session.select_tool(Tool::Rectangle);
    drag(&mut session, (10.0, 10.0), (50.0, 40.0));

    let blue = session
        .actors_mut()
        .add_actor("City", Color::BLUE)
        .expect("actor should be added")
        .id();
    session.set_active_actor(blue).expect("actor should activate");
    session.select_tool(Tool::Ellipse);
    drag(&mut session, (100.0, 100.0), (200.0, 150.0));

    let dir = tempfile::tempdir().expect("temp dir should be created");
    let target = dir.path().join("ordered.pdf");
    session.save(&target).expect("save should succeed");

    let content = page_content(&fs::read(&target).expect("output should exist"), 1);
    let red = content.find("1 0 0 RG").expect("red stroke should be present");
    let blue = content.find("0 0 1 RG").expect("blue stroke should be present");
    assert!(red < blue, "{content}");
}

#[test]
fn removing_an_actor_keeps_its_annotations() {
    let mut session = DocumentSession::open(
        LopdfEngine::new(),
        OpenSource::Bytes(blank_document(&[letter()]).expect("blank document should build")),
        acme(),
        ShapeStyle::default(),
    )
    .expect("session should open");

    let acme_id = session.actors().active().id();
    drag(&mut session, (10.0, 10.0), (90.0, 90.0));
    let before = session.snapshot();

    session.actors_mut().remove_actor(acme_id).expect("actor should be removed");

    assert_eq!(session.snapshot(), before);
    let annotation = session.snapshot().iter().next().cloned().expect("annotation should remain");
    assert_eq!(annotation.color(), Color::RED);
    assert_eq!(annotation.actor_id(), acme_id);
}

#[test]
fn background_save_ignores_later_edits() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let target = dir.path().join("background.pdf");

    let mut session = DocumentSession::open(
        LopdfEngine::new(),
        OpenSource::Bytes(five_pages()),
        acme(),
        ShapeStyle::default(),
    )
    .expect("session should open");
    drag(&mut session, (10.0, 10.0), (60.0, 60.0));

    let save = session
        .save_in_background(LopdfEngine::new(), target.clone(), CancellationToken::new())
        .expect("background save should start");
    drag(&mut session, (100.0, 100.0), (160.0, 160.0));

    let report = save.join().expect("background save should succeed");
    assert_eq!(report.annotations_composed, 1);
    assert_eq!(session.store().len(), 2);
    assert!(report.generation < session.store().generation());
}

#[test]
fn cancelled_background_save_writes_nothing() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let target = dir.path().join("cancelled.pdf");

    let session = DocumentSession::open(
        LopdfEngine::new(),
        OpenSource::Bytes(five_pages()),
        acme(),
        ShapeStyle::default(),
    )
    .expect("session should open");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let save = session
        .save_in_background(LopdfEngine::new(), target.clone(), cancel)
        .expect("background save should start");

    assert!(matches!(save.join(), Err(CompositionError::Cancelled)));
    assert!(!target.exists());
}
