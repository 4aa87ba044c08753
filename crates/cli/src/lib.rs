use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdf_engine::{blank_document, default_engine, OpenSource, PageSize, PdfEngine};
use pdf_overlay_core::{
    ActorId, ActorKind, Color, DocumentSession, OverlayConfig, SaveReport, Tool, ViewPoint,
};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "pdf-overlay")]
#[command(about = "Draw actor-colored shapes onto PDF pages")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print the actors a session would start with.
    Actors {
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Replay a JSON gesture script onto a PDF and save the result.
    Annotate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, value_name = "SCRIPT")]
        script: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Render a page to PNG.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 1.0)]
        scale: f32,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Write an empty PDF with uniform pages.
    Blank {
        #[arg(long, default_value_t = 1)]
        pages: u32,
        #[arg(long, default_value_t = 612.0)]
        width: f32,
        #[arg(long, default_value_t = 792.0)]
        height: f32,
        #[arg(long)]
        output: PathBuf,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    pages: Vec<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

#[derive(Debug, Serialize)]
struct ActorOutput {
    id: ActorId,
    name: String,
    kind: ActorKind,
    color: Color,
    active: bool,
}

#[derive(Debug, Serialize)]
struct AnnotateOutput {
    #[serde(flatten)]
    report: SaveReport,
    /// Gestures that produced no annotation (degenerate drags, blank text).
    discarded: usize,
}

/// One pointer gesture, in view pixels of the page it targets
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GestureStep {
    /// 1-based page number.
    #[serde(default = "first_page")]
    page: u32,
    /// Actor display name; created with `kind` when not yet known.
    #[serde(default)]
    actor: Option<String>,
    #[serde(default)]
    kind: Option<ActorKind>,
    tool: Tool,
    from: [f32; 2],
    #[serde(default)]
    to: Option<[f32; 2]>,
    #[serde(default)]
    text: Option<String>,
    /// Display scale to apply before the gesture.
    #[serde(default)]
    zoom: Option<f32>,
}

fn first_page() -> u32 {
    1
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Actors { config } => run_actors(config.as_deref()),
        Commands::Annotate { file, script, output, config } => {
            run_annotate(&file, &script, &output, config.as_deref())
        }
        Commands::Render { file, page, scale, output } => {
            run_render(&file, page, scale, output.as_deref())
        }
        Commands::Blank { pages, width, height, output } => run_blank(pages, width, height, &output),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;

    let page_count = engine.page_count(handle)?;
    let pages = (0..page_count)
        .map(|page| {
            engine
                .page_size(handle, page)
                .map(|size| PageSizeOutput { width: size.width_pt, height: size.height_pt })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let payload = InfoOutput { path: file.display().to_string(), page_count, pages };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    engine.close(handle)?;

    Ok(())
}

fn run_actors(config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let registry = config.build_registry().context("invalid actor presets")?;
    let active = registry.active().id();

    let actors: Vec<_> = registry
        .iter()
        .map(|actor| ActorOutput {
            id: actor.id(),
            name: actor.display_name().to_owned(),
            kind: actor.kind(),
            color: actor.color(),
            active: actor.id() == active,
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&actors)?);
    Ok(())
}

fn run_annotate(file: &Path, script: &Path, output: &Path, config: Option<&Path>) -> Result<()> {
    ensure_pdf_exists(file)?;

    let config = load_config(config)?;
    let steps: Vec<GestureStep> = serde_json::from_slice(
        &fs::read(script).with_context(|| format!("failed to read script {}", script.display()))?,
    )
    .with_context(|| format!("invalid gesture script {}", script.display()))?;

    let mut session =
        DocumentSession::open_with_config(default_engine(), OpenSource::from(file), &config)
            .context("failed to open PDF")?;

    let mut discarded = 0;
    for (index, step) in steps.iter().enumerate() {
        let committed = replay(&mut session, step)
            .with_context(|| format!("gesture {} failed", index + 1))?;
        if !committed {
            log::warn!("gesture {} produced no annotation", index + 1);
            discarded += 1;
        }
    }

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let report = session
        .save(output)
        .with_context(|| format!("failed to save {}", output.display()))?;
    session.close()?;

    println!("{}", serde_json::to_string_pretty(&AnnotateOutput { report, discarded })?);
    Ok(())
}

/// Feed one scripted gesture through the session; true when it committed an annotation
fn replay<E: PdfEngine>(session: &mut DocumentSession<E>, step: &GestureStep) -> Result<bool> {
    if step.page == 0 {
        anyhow::bail!("page is 1-based and must be >= 1");
    }
    session.go_to_page(step.page - 1)?;

    if let Some(zoom) = step.zoom {
        session.set_scale(zoom);
    }

    if let Some(name) = &step.actor {
        let id = match session.actors().find_by_name(name) {
            Some(actor) => actor.id(),
            None => {
                let kind = step.kind.unwrap_or(ActorKind::Other);
                session.actors_mut().add_actor_of_kind(name.clone(), kind)?.id()
            }
        };
        session.set_active_actor(id)?;
    }

    session.select_tool(step.tool);
    let [x, y] = step.from;
    session.pointer_down(ViewPoint::new(x, y))?;

    let committed = if step.tool == Tool::Text {
        session.commit_text(step.text.as_deref().unwrap_or_default())?
    } else {
        let [x, y] = step.to.unwrap_or(step.from);
        session.pointer_move(ViewPoint::new(x, y))?;
        session.pointer_up(ViewPoint::new(x, y))?
    };

    Ok(committed.is_some())
}

fn run_render(file: &Path, page: u32, scale: f32, output: Option<&Path>) -> Result<()> {
    ensure_pdf_exists(file)?;

    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }

    let mut session = DocumentSession::open_with_config(
        default_engine(),
        OpenSource::from(file),
        &OverlayConfig::default(),
    )
    .context("failed to open PDF")?;

    session.go_to_page(page - 1)?;
    session.set_scale(scale);
    let image = session.render_current_page().context("failed to render page")?;

    let output = output.map(ToOwned::to_owned).unwrap_or_else(|| default_render_output(file, page));

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    image
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());

    session.close()?;

    Ok(())
}

fn run_blank(pages: u32, width: f32, height: f32, output: &Path) -> Result<()> {
    if pages == 0 {
        anyhow::bail!("--pages must be >= 1");
    }
    for (flag, value) in [("--width", width), ("--height", height)] {
        if !value.is_finite() || value <= 0.0 {
            anyhow::bail!("{flag} must be a positive number of points, got {value}");
        }
    }

    let sizes = vec![PageSize { width_pt: width, height_pt: height }; pages as usize];
    let bytes = blank_document(&sizes).context("failed to build blank PDF")?;

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, bytes).with_context(|| format!("failed to write {}", output.display()))?;

    println!("{}", output.display());
    Ok(())
}

/// Load `path`, or the per-user config when no path is given
fn load_config(path: Option<&Path>) -> Result<OverlayConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match OverlayConfig::default_path() {
            Ok(path) => path,
            Err(error) => {
                log::debug!("{error}; using default settings");
                return Ok(OverlayConfig::default());
            }
        },
    };

    OverlayConfig::load(&path).with_context(|| format!("failed to load config {}", path.display()))
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_render_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("page");

    file.with_file_name(format!("{stem}-page-{page}.png"))
}
