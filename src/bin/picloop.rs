use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "picloop", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a looping animation (GIF or APNG) from a still PNG.
    Render(RenderArgs),
    /// Render a single frame at a given cycle phase as a PNG.
    Frame(FrameArgs),
    /// List the animation kind catalog.
    Kinds,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input still image (PNG).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output animation path. Defaults next to the input, named after the
    /// configured format.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Job config JSON; defaults apply for missing fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Animation kind override (see `picloop kinds`).
    #[arg(long)]
    kind: Option<String>,

    /// Seconds per cycle override.
    #[arg(long)]
    speed: Option<f64>,

    /// Intensity override, 0-100.
    #[arg(long)]
    intensity: Option<u8>,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input still image (PNG).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Cycle phase to sample, e.g. 0.25.
    #[arg(long, default_value_t = 0.0)]
    phase: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Job config JSON; defaults apply for missing fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Animation kind override (see `picloop kinds`).
    #[arg(long)]
    kind: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Kinds => cmd_kinds(),
    }
}

fn read_config(path: Option<&Path>) -> anyhow::Result<picloop::JobConfig> {
    let Some(path) = path else {
        return Ok(picloop::JobConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("read job config '{}'", path.display()))?;
    Ok(picloop::JobConfig::from_json(&json)?)
}

fn parse_kind(name: &str) -> anyhow::Result<picloop::MotionKind> {
    picloop::MotionKind::parse_name(name).ok_or_else(|| {
        anyhow::anyhow!("unknown animation kind '{name}' (try `picloop kinds`)")
    })
}

fn read_source(path: &Path) -> anyhow::Result<picloop::SourceImage> {
    let img = image::open(path)
        .with_context(|| format!("open source image '{}'", path.display()))?
        .to_rgba8();
    let (width, height) = img.dimensions();
    Ok(picloop::SourceImage::new(width, height, img.into_raw())?)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut config = read_config(args.config.as_deref())?;
    if let Some(kind) = args.kind.as_deref() {
        config.kind = parse_kind(kind)?;
    }
    if let Some(speed) = args.speed {
        config.speed_secs = speed;
    }
    if let Some(intensity) = args.intensity {
        config.intensity = intensity;
    }
    config.validate()?;

    let src = read_source(&args.in_path)?;
    let gate = picloop::CanvasGate::new();
    let output = picloop::generate(&config, &src, &gate)?;

    let out_path = args.out.unwrap_or_else(|| {
        args.in_path
            .with_file_name(config.suggested_filename())
    });
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&out_path, &output.bytes)
        .with_context(|| format!("write '{}'", out_path.display()))?;

    eprintln!("wrote {} ({})", out_path.display(), output.size_estimate());
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let mut config = read_config(args.config.as_deref())?;
    if let Some(kind) = args.kind.as_deref() {
        config.kind = parse_kind(kind)?;
    }
    config.validate()?;

    let src = read_source(&args.in_path)?;
    let target = config.target_for(&src)?;
    let sample = picloop::sample(&config.motion_params(), args.phase)?;
    let data = picloop::render_rgba8(&sample, &src, target)?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        &data,
        target.width,
        target.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_kinds() -> anyhow::Result<()> {
    for kind in picloop::MotionKind::ALL {
        println!("{}", kind.name());
    }
    Ok(())
}
