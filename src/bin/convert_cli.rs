use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use tag_convert_lib::batch::{run_conversion, BatchOptions, ConversionReport};
use tag_convert_lib::convert::{ConversionContext, ConversionKind};

#[derive(Parser, Debug)]
#[command(name = "tag-convert", version, about = "Batch converters for tag files")]
struct Args {
    /// JSON file with converter options; missing fields keep their defaults
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Mirror outputs under this directory instead of writing beside the sources
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collision models to gbxmodels
    Collision { root: PathBuf },
    /// Structure BSPs to gbxmodels
    Bsp { root: PathBuf },
    /// JMS markers to physics mass points
    Physics { root: PathBuf },
    /// DDS images to bitmaps
    Dds { root: PathBuf },
    /// Chicago extended shaders to chicago shaders
    Shader { root: PathBuf },
    /// Legacy animation graphs to the current layout
    Animations { root: PathBuf },
}

impl Command {
    fn kind_and_root(&self) -> (ConversionKind, &PathBuf) {
        match self {
            Command::Collision { root } => (ConversionKind::CollisionToModel, root),
            Command::Bsp { root } => (ConversionKind::BspToModel, root),
            Command::Physics { root } => (ConversionKind::JmsToPhysics, root),
            Command::Dds { root } => (ConversionKind::DdsToBitmap, root),
            Command::Shader { root } => (ConversionKind::ChicagoExtendedToChicago, root),
            Command::Animations { root } => (ConversionKind::LegacyAnimations, root),
        }
    }
}

fn print_report(report: &ConversionReport) {
    for (path, diagnostic) in &report.diagnostics {
        eprintln!("  {}: {}", path.display(), diagnostic);
    }
    for (path, error) in &report.failed {
        eprintln!("  FAILED {}: {}", path.display(), error);
    }
    eprintln!(
        "Converted {}, skipped {}, failed {}{}",
        report.succeeded.len(),
        report.skipped.len(),
        report.failed.len(),
        if report.cancelled { " (cancelled)" } else { "" }
    );
}

fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let mut context = match &args.settings {
        Some(path) => ConversionContext::from_json_file(path)?,
        None => ConversionContext::default(),
    };
    if args.output.is_some() {
        context.output_directory = args.output.clone();
    }

    let (kind, root) = args.command.kind_and_root();
    tracing::info!(?kind, root = %root.display(), "starting conversion");
    let report = run_conversion(kind, root, &context, &BatchOptions::default())
        .with_context(|| format!("Failed to convert {}", root.display()))?;

    print_report(&report);
    if report.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}
