//! metascan - print, rotate and extract from photo and audio metadata.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metascan::{
    config::{Command, Config, PreviewArgs, RotateArgs, ShowArgs},
    copy_embedded, MetadataCache,
};

fn main() -> ExitCode {
    let config = Config::parse();
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let cache = MetadataCache::new(config.parse_options(), config.cache_options());

    match &config.command {
        Command::Show(args) => run_show(&cache, args),
        Command::Rotate(args) => run_rotate(&cache, args),
        Command::Preview(args) => run_preview(&cache, args),
    }
}

/// Initialize the tracing subscriber for logging.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "metascan=debug"
    } else {
        "metascan=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// =============================================================================
// Show Command
// =============================================================================

fn run_show(cache: &MetadataCache, args: &ShowArgs) -> ExitCode {
    let mut status = ExitCode::SUCCESS;

    for path in &args.paths {
        if !path.exists() {
            error!("{}: no such file", path.display());
            status = ExitCode::FAILURE;
            continue;
        }

        if args.json {
            let meta = cache.metadata(path);
            match serde_json::to_string_pretty(&*meta) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    error!("{}: {}", path.display(), e);
                    status = ExitCode::FAILURE;
                }
            }
            continue;
        }

        println!("{}", path.display());
        match cache.interesting_metadata(path, None) {
            Some(summary) => {
                for line in summary.lines() {
                    println!("  {line}");
                }
            }
            None => println!("  (no metadata)"),
        }
        if let Some(embedded) = cache.embedded_image(path) {
            print_embedded(&embedded);
        }
    }

    status
}

fn print_embedded(embedded: &metascan::EmbeddedImage) {
    match (embedded.width, embedded.height) {
        (Some(w), Some(h)) => println!(
            "  embedded image: {} bytes at {} ({w} x {h})",
            embedded.length, embedded.offset
        ),
        _ => println!(
            "  embedded image: {} bytes at {}",
            embedded.length, embedded.offset
        ),
    }
}

// =============================================================================
// Rotate Command
// =============================================================================

fn run_rotate(cache: &MetadataCache, args: &RotateArgs) -> ExitCode {
    match cache.rotate(&args.path, args.rotation()) {
        Ok(orientation) => {
            info!(
                "{}: orientation is now {}",
                args.path.display(),
                orientation.value()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}: cannot rotate: {}", args.path.display(), e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Preview Command
// =============================================================================

fn run_preview(cache: &MetadataCache, args: &PreviewArgs) -> ExitCode {
    let Some(embedded) = cache.embedded_image(&args.path) else {
        warn!("{}: no embedded image", args.path.display());
        return ExitCode::FAILURE;
    };

    match write_preview(&args.path, &embedded, &args.out) {
        Ok(copied) => {
            info!("{}: wrote {} bytes", args.out.display(), copied);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}: {}", args.out.display(), e);
            ExitCode::FAILURE
        }
    }
}

fn write_preview(
    path: &Path,
    embedded: &metascan::EmbeddedImage,
    out: &Path,
) -> Result<u64, String> {
    let file = File::create(out).map_err(|e| e.to_string())?;
    let mut writer = BufWriter::new(file);
    let copied = copy_embedded(path, embedded, &mut writer).map_err(|e| e.to_string())?;
    writer.flush().map_err(|e| e.to_string())?;
    Ok(copied)
}
