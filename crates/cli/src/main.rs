//! tabulon - recover table structure from page descriptions
//!
//! Reads one JSON page description per file (spans, background boxes,
//! captions, text lines) plus an optional raw RGBA raster per page, and
//! prints the recovered tables.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, ValueEnum};
use memmap2::Mmap;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use tabulon_core::table::document_order;
use tabulon_core::{PageInput, PixelBuffer, TableParams, analyze_document};

/// Output format.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputType {
    /// Full per-page results as JSON
    #[default]
    Json,
    /// `{ id, lines }` records in reading order, one JSON object per line
    Records,
    /// Cell text grids, one `|`-separated line per table row
    Grid,
}

/// Recover table structure from page descriptions.
#[derive(Parser, Debug)]
#[command(name = "tabulon")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// One or more page description JSON files, in page order
    #[arg(required = true)]
    pages: Vec<PathBuf>,

    /// Raw RGBA raster for each page, in the same order as the pages
    #[arg(short = 'x', long = "pixels")]
    pixels: Vec<PathBuf>,

    /// JSON file overriding detection parameters
    #[arg(short = 'p', long)]
    params: Option<PathBuf>,

    /// Output type
    #[arg(short = 't', long = "output-type", value_enum, default_value_t)]
    output_type: OutputType,

    /// Output file (default: stdout)
    #[arg(short = 'o', long, default_value = "-")]
    outfile: String,

    /// Use debug logging level
    #[arg(short = 'd', long, action = ArgAction::SetTrue)]
    debug: bool,
}

fn main() {
    let args = Args::parse();
    init_tracing(args.debug);

    if let Err(err) = run(args) {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args) -> Result<()> {
    if !args.pixels.is_empty() && args.pixels.len() != args.pages.len() {
        bail!(
            "{} pixel files given for {} pages",
            args.pixels.len(),
            args.pages.len()
        );
    }
    let params = match &args.params {
        Some(path) => load_params(path)?,
        None => TableParams::default(),
    };

    let mut pages = Vec::with_capacity(args.pages.len());
    for (k, path) in args.pages.iter().enumerate() {
        let mut page = load_page(path)?;
        if let Some(raster) = args.pixels.get(k) {
            page.pixels = Some(load_pixels(raster, page.width, page.height)?);
        }
        pages.push(page);
    }

    let results = analyze_document(&pages, &params).context("table analysis failed")?;
    info!(
        pages = results.len(),
        tables = results.iter().map(|p| p.tables.len()).sum::<usize>(),
        "analysis complete"
    );

    let sink: Box<dyn Write> = if args.outfile == "-" {
        Box::new(io::stdout().lock())
    } else {
        Box::new(
            File::create(&args.outfile)
                .with_context(|| format!("failed to create {}", args.outfile))?,
        )
    };
    let mut out = BufWriter::new(sink);

    match args.output_type {
        OutputType::Json => {
            serde_json::to_writer_pretty(&mut out, &results)?;
            writeln!(out)?;
        }
        OutputType::Records => {
            for table in document_order(&results) {
                serde_json::to_writer(&mut out, &table.record())?;
                writeln!(out)?;
            }
        }
        OutputType::Grid => {
            for table in document_order(&results) {
                writeln!(out, "# page {} {}", table.page, table.id)?;
                for row in table.text_grid() {
                    let cells: Vec<&str> = row.iter().map(|c| c.text.as_str()).collect();
                    writeln!(out, "{}", cells.join("|"))?;
                }
                writeln!(out)?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

fn load_params(path: &Path) -> Result<TableParams> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read params {}", path.display()))?;
    TableParams::from_json(&json).with_context(|| format!("invalid params in {}", path.display()))
}

fn load_page(path: &Path) -> Result<PageInput> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read page {}", path.display()))?;
    let page: PageInput = serde_json::from_str(&json)
        .with_context(|| format!("invalid page description in {}", path.display()))?;
    debug!(
        page = page.index,
        spans = page.spans.len(),
        boxes = page.background_boxes.len(),
        "page loaded"
    );
    Ok(page)
}

fn load_pixels(path: &Path, width: u32, height: u32) -> Result<PixelBuffer> {
    let file = File::open(path)
        .with_context(|| format!("failed to open raster {}", path.display()))?;
    // Safety: the raster is opened read-only and not modified while mapped.
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("failed to map raster {}", path.display()))?;
    PixelBuffer::from_mmap(width, height, mmap).with_context(|| {
        format!("raster {} does not match a {width}x{height} page", path.display())
    })
}
