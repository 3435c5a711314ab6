use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::{error, info};
use simplelog::{Config, LevelFilter, WriteLogger};

use zonepad::panic_handler;
use zonepad::pdf::{GeometryBackend, ImageBackend, PdfBackend, Rect};
use zonepad::placement::PlacementTarget;
use zonepad::session::Session;
use zonepad::settings::{self, Settings};
use zonepad::source::SourceKind;
use zonepad::store::{JsonFileStore, MemoryStore, SheetId};
use zonepad::zones::TemplateRegistry;

#[derive(Parser)]
#[command(
    name = "zonepad",
    version,
    about = "Extract text from PDF pages and place it on analysis canvases"
)]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log file
    #[arg(long, global = true, default_value = "zonepad.log")]
    log_file: PathBuf,

    #[arg(long, global = true, default_value = "info", value_parser = parse_level)]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List templates, or the zones of one template
    Zones {
        template: Option<String>,
    },
    /// Print the text layer of a page as JSON
    Layer {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Drag-select a rectangle on a page and print the selection as JSON
    Select {
        #[command(flatten)]
        page: PageArgs,

        /// Selection rectangle in device pixels: left,top,right,bottom
        #[arg(long, value_parser = parse_rect)]
        rect: Rect,
    },
    /// Render a page to a PNG file
    Render {
        #[command(flatten)]
        page: PageArgs,

        #[arg(short, long, value_name = "FILE")]
        out: PathBuf,
    },
    /// Create a text box on a sheet
    Place {
        text: String,

        /// JSON file holding the text boxes
        #[arg(long, value_name = "FILE")]
        store: PathBuf,

        #[arg(long, default_value_t = 1)]
        sheet: SheetId,

        #[arg(long)]
        template: Option<String>,

        /// Zone of the template to append to
        #[arg(long, conflicts_with = "at")]
        zone: Option<String>,

        /// Canvas point: x,y
        #[arg(long, value_parser = parse_point)]
        at: Option<(f32, f32)>,
    },
}

#[derive(clap::Args)]
struct PageArgs {
    /// PDF, image, or pre-parsed page geometry (.json)
    input_file: PathBuf,

    /// Page number, starting at 1
    #[arg(long, default_value_t = 1)]
    page: usize,

    #[arg(long)]
    scale: Option<f32>,
}

fn parse_level(s: &str) -> Result<LevelFilter, String> {
    s.parse()
        .map_err(|_| format!("unknown log level '{s}'"))
}

fn parse_numbers<const N: usize>(s: &str) -> Result<[f32; N], String> {
    let values: Vec<f32> = s
        .split(',')
        .map(|v| v.trim().parse::<f32>().map_err(|e| format!("'{v}': {e}")))
        .collect::<Result<_, _>>()?;
    values
        .try_into()
        .map_err(|_| format!("expected {N} comma-separated numbers"))
}

fn parse_rect(s: &str) -> Result<Rect, String> {
    let [left, top, right, bottom] = parse_numbers::<4>(s)?;
    Ok(Rect::from_points(left, top, right, bottom))
}

fn parse_point(s: &str) -> Result<(f32, f32), String> {
    let [x, y] = parse_numbers::<2>(s)?;
    Ok((x, y))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    WriteLogger::init(
        cli.log_level,
        Config::default(),
        File::create(&cli.log_file)?,
    )?;
    panic_handler::initialize_panic_handler();

    info!("Starting zonepad");
    let settings = settings::load_settings(cli.config.as_deref());

    let result = match cli.command {
        Commands::Zones { template } => list_zones(&settings, template.as_deref()),
        Commands::Layer { page } => print_layer(&settings, &page),
        Commands::Select { page, rect } => print_selection(&settings, &page, rect),
        Commands::Render { page, out } => render_png(&settings, &page, &out),
        Commands::Place {
            text,
            store,
            sheet,
            template,
            zone,
            at,
        } => place(&settings, &text, &store, sheet, template.as_deref(), zone, at),
    };

    if let Err(err) = &result {
        error!("Command failed: {err:?}");
    }
    info!("Shutting down zonepad");
    result
}

fn list_zones(settings: &Settings, template: Option<&str>) -> Result<()> {
    let registry = TemplateRegistry::with_custom(&settings.templates);
    match template {
        None => {
            for t in registry.templates() {
                println!("{:<24} {} ({} zones)", t.id, t.name, t.zones.len());
            }
        }
        Some(id) => {
            let Some(t) = registry.get(id) else {
                bail!("unknown template '{id}'");
            };
            for (index, zone) in t.zones.iter().enumerate() {
                println!("{index:>2}  {:<24} {:<28} {:?}", zone.id, zone.label, zone.group);
            }
        }
    }
    Ok(())
}

#[cfg(feature = "pdf")]
fn pdf_backend() -> Result<Arc<dyn PdfBackend>> {
    Ok(Arc::new(zonepad::pdf::MupdfBackend))
}

#[cfg(not(feature = "pdf"))]
fn pdf_backend() -> Result<Arc<dyn PdfBackend>> {
    bail!("this build has no PDF support; rebuild with `--features pdf`")
}

fn backend_for(path: &Path, bytes: &[u8]) -> Result<Arc<dyn PdfBackend>> {
    if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
    {
        return Ok(Arc::new(GeometryBackend));
    }
    match SourceKind::detect(bytes)? {
        SourceKind::Pdf => pdf_backend(),
        SourceKind::Image(_) => Ok(Arc::new(ImageBackend)),
    }
}

/// Open a document and display the requested page
fn open_page(settings: &Settings, args: &PageArgs) -> Result<Session<MemoryStore>> {
    let bytes = std::fs::read(&args.input_file)
        .with_context(|| format!("reading {}", args.input_file.display()))?;
    let backend = backend_for(&args.input_file, &bytes)?;
    let mut session = Session::with_backend(backend, bytes, settings, MemoryStore::new(), 1)?;

    if args.page == 0 || args.page > session.page_count() {
        bail!(
            "page {} out of range (document has {} pages)",
            args.page,
            session.page_count()
        );
    }
    session.on_view_change(args.page - 1, args.scale)?;
    Ok(session)
}

fn print_layer(settings: &Settings, args: &PageArgs) -> Result<()> {
    let session = open_page(settings, args)?;
    let layer = session
        .text_layer()
        .context("page has no text layer")?;
    println!("{}", serde_json::to_string_pretty(layer.fragments())?);
    Ok(())
}

fn print_selection(settings: &Settings, args: &PageArgs, rect: Rect) -> Result<()> {
    let mut session = open_page(settings, args)?;
    session.pointer_down(rect.left, rect.top);
    match session.pointer_up(rect.right, rect.bottom) {
        Some(selection) => println!("{}", serde_json::to_string_pretty(&selection)?),
        None => eprintln!("Nothing selected"),
    }
    Ok(())
}

fn render_png(settings: &Settings, args: &PageArgs, out: &Path) -> Result<()> {
    let session = open_page(settings, args)?;
    let page = session.page().context("page was not rendered")?;
    let surface = &page.surface;
    let img = image::RgbImage::from_raw(surface.width, surface.height, surface.pixels.clone())
        .context("render produced a malformed surface")?;
    img.save(out)
        .with_context(|| format!("writing {}", out.display()))?;
    println!(
        "Wrote {}x{} page {} to {}",
        surface.width,
        surface.height,
        args.page,
        out.display()
    );
    Ok(())
}

fn place(
    settings: &Settings,
    text: &str,
    store_path: &Path,
    sheet: SheetId,
    template: Option<&str>,
    zone: Option<String>,
    at: Option<(f32, f32)>,
) -> Result<()> {
    let target = match (zone, at) {
        (Some(zone), _) => PlacementTarget::Zone(zone),
        (None, Some((x, y))) => PlacementTarget::Point { x, y },
        (None, None) => bail!("either --zone or --at is required"),
    };

    let mut store = JsonFileStore::open(store_path)?;
    let dispatcher = zonepad::PlacementDispatcher::new(
        TemplateRegistry::with_custom(&settings.templates),
        settings.layout,
        settings.canvas,
        settings.box_defaults(),
    );
    let created = dispatcher.place(&mut store, sheet, template, text, &target)?;
    println!("{}", serde_json::to_string_pretty(&created)?);
    Ok(())
}
