use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use spriteframe::ArchiveSink as _;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "spriteframe", version, about)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export every frame of an animation into a ZIP archive.
    Frames(FramesArgs),
    /// Render a single frame as a PNG.
    Frame(FrameArgs),
    /// Cut every atlas sprite into its own PNG inside a ZIP archive.
    Pieces(PiecesArgs),
    /// Print frame indices, sprite and symbol counts as JSON.
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct Inputs {
    /// Atlas bitmap (any format `image` decodes).
    #[arg(long)]
    image: PathBuf,

    /// Atlas descriptor JSON.
    #[arg(long)]
    atlas: PathBuf,

    /// Animation descriptor JSON.
    #[arg(long)]
    animation: PathBuf,

    /// Export options JSON; flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Deepest symbol nesting to follow.
    #[arg(long)]
    max_depth: Option<u32>,

    /// Largest accepted frame side in pixels.
    #[arg(long)]
    max_side: Option<u32>,
}

#[derive(Parser, Debug)]
struct FramesArgs {
    #[command(flatten)]
    inputs: Inputs,

    /// Output ZIP path.
    #[arg(long)]
    out: PathBuf,

    /// What to emit for unreconstructible frames: placeholder, skip or first-sprite.
    #[arg(long)]
    degenerate: Option<spriteframe::DegeneratePolicy>,

    /// Skip frames identical to the previous one.
    #[arg(long)]
    dedupe: bool,

    /// Composite frames on a thread pool.
    #[arg(long)]
    parallel: bool,

    /// Worker threads for --parallel (default: one per core).
    #[arg(long)]
    threads: Option<usize>,

    /// Do not write metadata.json.
    #[arg(long)]
    no_metadata: bool,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    #[command(flatten)]
    inputs: Inputs,

    /// Frame index (0-based).
    #[arg(long)]
    frame: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct PiecesArgs {
    /// Atlas bitmap.
    #[arg(long)]
    image: PathBuf,

    /// Atlas descriptor JSON.
    #[arg(long)]
    atlas: PathBuf,

    /// Output ZIP path.
    #[arg(long)]
    out: PathBuf,

    /// Pieces with a larger side are scaled down.
    #[arg(long, default_value_t = 4096)]
    max_side: u32,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Atlas descriptor JSON.
    #[arg(long)]
    atlas: PathBuf,

    /// Animation descriptor JSON.
    #[arg(long)]
    animation: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.cmd {
        Command::Frames(args) => cmd_frames(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Pieces(args) => cmd_pieces(args),
        Command::Inspect(args) => cmd_inspect(args),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn read_json(path: &Path, what: &str) -> anyhow::Result<serde_json::Value> {
    let f = File::open(path).with_context(|| format!("open {what} '{}'", path.display()))?;
    serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("parse {what} JSON '{}'", path.display()))
}

fn read_bitmap(path: &Path) -> anyhow::Result<spriteframe::PreparedImage> {
    let bytes = std::fs::read(path).with_context(|| format!("read image '{}'", path.display()))?;
    spriteframe::decode_image(&bytes)
        .with_context(|| format!("decode image '{}'", path.display()))
}

fn load_opts(inputs: &Inputs) -> anyhow::Result<spriteframe::ExportOpts> {
    let mut opts: spriteframe::ExportOpts = match &inputs.config {
        Some(path) => serde_json::from_value(read_json(path, "config")?)
            .with_context(|| format!("invalid export options in '{}'", path.display()))?,
        None => spriteframe::ExportOpts::default(),
    };
    if let Some(d) = inputs.max_depth {
        opts.resolve.max_depth = d;
    }
    if let Some(s) = inputs.max_side {
        opts.composite.max_side = s;
    }
    Ok(opts)
}

fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    Ok(())
}

fn write_output(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    ensure_parent_dir(path)?;
    std::fs::write(path, bytes).with_context(|| format!("write '{}'", path.display()))
}

fn cmd_frames(args: FramesArgs) -> anyhow::Result<()> {
    let mut opts = load_opts(&args.inputs)?;
    if let Some(policy) = args.degenerate {
        opts.degenerate = policy;
    }
    if args.dedupe {
        opts.dedupe_consecutive = true;
    }
    if args.parallel {
        opts.threading.parallel = true;
    }
    if args.threads.is_some() {
        opts.threading.threads = args.threads;
    }
    if args.no_metadata {
        opts.write_metadata = false;
    }

    let bitmap = read_bitmap(&args.inputs.image)?;
    let atlas = read_json(&args.inputs.atlas, "atlas descriptor")?;
    let anim = read_json(&args.inputs.animation, "animation descriptor")?;
    let job = spriteframe::ExportJob::prepare(&bitmap, &atlas, &anim, &opts)?;

    let mut sink = spriteframe::ZipArchive::new();
    let mut progress = |msg: &str| tracing::info!("{msg}");
    let stats = spriteframe::export_all_frames(&job, &mut sink, Some(&mut progress))?;
    let bytes = sink.finish()?;
    write_output(&args.out, &bytes)?;

    eprintln!(
        "wrote {} ({} frames, {} degenerate, {} deduped, {} failed)",
        args.out.display(),
        stats.frames_written,
        stats.frames_degenerate,
        stats.frames_deduped,
        stats.frames_failed
    );
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let opts = load_opts(&args.inputs)?;
    let bitmap = read_bitmap(&args.inputs.image)?;
    let atlas = read_json(&args.inputs.atlas, "atlas descriptor")?;
    let anim = read_json(&args.inputs.animation, "animation descriptor")?;
    let job = spriteframe::ExportJob::prepare(&bitmap, &atlas, &anim, &opts)?;

    let frame = spriteframe::FrameIndex(args.frame);
    let report = job.resolve(frame);
    for issue in &report.issues {
        tracing::warn!("{issue}");
    }
    let composited = job.render_report(frame, &report)?;
    if let spriteframe::Composited::Degenerate { reason, .. } = &composited {
        tracing::warn!(?reason, "frame {} could not be reconstructed", args.frame);
    }
    let png = composited.frame().encode_png()?;
    write_output(&args.out, &png)?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_pieces(args: PiecesArgs) -> anyhow::Result<()> {
    let bitmap = read_bitmap(&args.image)?;
    let atlas = spriteframe::build_atlas_index(&read_json(&args.atlas, "atlas descriptor")?)?;
    let opts = spriteframe::PieceOpts {
        max_side: args.max_side,
        ..spriteframe::PieceOpts::default()
    };

    let mut sink = spriteframe::ZipArchive::new();
    let mut progress = |msg: &str| tracing::info!("{msg}");
    let written =
        spriteframe::export_atlas_pieces(&bitmap, &atlas, &mut sink, &opts, Some(&mut progress))?;
    let bytes = sink.finish()?;
    write_output(&args.out, &bytes)?;

    eprintln!("wrote {} ({written} pieces)", args.out.display());
    Ok(())
}

#[derive(serde::Serialize)]
struct Inspection {
    animation: Option<String>,
    frame_rate: Option<f64>,
    atlas_shape: spriteframe::AtlasShape,
    sprites: usize,
    symbol_source: spriteframe::SymbolSource,
    symbols: Vec<String>,
    layers: usize,
    frames: Vec<u64>,
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let atlas = spriteframe::build_atlas_index(&read_json(&args.atlas, "atlas descriptor")?)?;
    let anim = read_json(&args.animation, "animation descriptor")?;
    let doc = spriteframe::AnimationDoc::from_json(&anim)?;
    let symbols = spriteframe::build_symbol_table(&anim);

    let report = Inspection {
        frames: spriteframe::discover_frame_indices(&doc.timeline)
            .into_iter()
            .map(|f| f.0)
            .collect(),
        layers: doc.timeline.layers.len(),
        animation: doc.name,
        frame_rate: doc.frame_rate,
        atlas_shape: atlas.shape(),
        sprites: atlas.len(),
        symbol_source: symbols.source(),
        symbols: symbols.names().map(str::to_string).collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("serialize inspection report")?
    );
    Ok(())
}
