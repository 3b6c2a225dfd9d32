//! keepsake: turn venue photographs into pencil-sketch PNGs.
//!
//! Sketches every input image and writes `<stem>-sketch.png` next to the
//! others in the output directory. Inputs are processed in parallel; a
//! failed input is reported and the rest still run.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin keepsake -- [OPTIONS] <INPUT>...
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use keepsake_io::{FsLoader, SourceLoader, SourceRef, generate_sketch};
use keepsake_pipeline::{SketchConfig, SketchDiagnostics, SketchOutput, WebClock};
use rayon::prelude::*;
use tracing::Level;

/// Pencil-sketch generator for decorative venue imagery.
///
/// Converts each input photograph to grayscale, runs a Sobel edge
/// filter, and writes the result as a black-on-white PNG of the same
/// size.
#[derive(Parser)]
#[command(name = "keepsake", version)]
struct Cli {
    /// Input images (paths or `file://` URLs; PNG, JPEG, BMP, WebP).
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Directory the sketches are written to.
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Multiplier applied to the gradient magnitude before inversion.
    #[arg(long, default_value_t = SketchConfig::DEFAULT_MAGNITUDE_SCALE)]
    magnitude_scale: f64,

    /// Largest image (in pixels) a drawing surface is allocated for.
    #[arg(long, default_value_t = SketchConfig::DEFAULT_MAX_PIXELS)]
    max_pixels: u64,

    /// Full sketch config as a JSON string.
    ///
    /// When provided, the individual parameter flags are ignored.
    #[arg(long)]
    config_json: Option<String>,

    /// Resolve site-absolute input paths (`/assets/a.jpg`) against this
    /// directory.
    #[arg(long)]
    root: Option<PathBuf>,

    /// Print per-stage diagnostics for each input.
    #[arg(long)]
    diagnostics: bool,

    /// Print diagnostics as JSON instead of a human-readable report.
    #[arg(long, requires = "diagnostics")]
    json: bool,

    /// More log output (repeat for more).
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Build a [`SketchConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<SketchConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(SketchConfig {
        magnitude_scale: cli.magnitude_scale,
        max_pixels: cli.max_pixels,
    })
}

const fn log_level(verbose: u8, quiet: bool) -> Level {
    if quiet {
        return Level::ERROR;
    }
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Where the sketch of each source is written, in input order.
///
/// Outputs are named `<stem>-sketch.png`. Stems shared by several inputs
/// (compared case-insensitively, as some filesystems do) are numbered
/// `<stem>-1`, `<stem>-2`, ... in input order, skipping any name another
/// input already owns, so no two inputs write the same file.
fn output_paths(output_dir: &Path, sources: &[SourceRef]) -> Vec<PathBuf> {
    let stems: Vec<String> = sources
        .iter()
        .enumerate()
        .map(|(index, source)| {
            source
                .stem()
                .map_or_else(|| format!("input-{index}"), ToOwned::to_owned)
        })
        .collect();

    let mut counts: HashMap<String, usize> = HashMap::new();
    for stem in &stems {
        *counts.entry(stem.to_lowercase()).or_default() += 1;
    }
    let is_shared = |stem: &str| counts.get(&stem.to_lowercase()).is_some_and(|&n| n > 1);

    let mut taken: HashSet<String> = stems
        .iter()
        .filter(|stem| !is_shared(stem.as_str()))
        .map(|stem| stem.to_lowercase())
        .collect();

    stems
        .iter()
        .map(|stem| {
            let name = if is_shared(stem.as_str()) {
                let mut n = 1usize;
                let mut candidate = format!("{stem}-{n}");
                while taken.contains(&candidate.to_lowercase()) {
                    n += 1;
                    candidate = format!("{stem}-{n}");
                }
                taken.insert(candidate.to_lowercase());
                candidate
            } else {
                stem.clone()
            };
            output_dir.join(format!("{name}-sketch.png"))
        })
        .collect()
}

/// Everything produced for one input.
struct Sketched {
    path: PathBuf,
    output: SketchOutput,
    diagnostics: Option<SketchDiagnostics>,
}

fn sketch_one(
    loader: &FsLoader,
    source: &SourceRef,
    config: &SketchConfig,
    path: PathBuf,
    with_diagnostics: bool,
) -> Result<Sketched, String> {
    let (output, diagnostics) = if with_diagnostics {
        let bytes = pollster::block_on(loader.load(source)).map_err(|e| e.to_string())?;
        let (output, diagnostics) =
            keepsake_pipeline::generate_with_diagnostics(&bytes, config, &WebClock)
                .map_err(|e| e.to_string())?;
        (output, Some(diagnostics))
    } else {
        let output = pollster::block_on(generate_sketch(loader, source, config))
            .map_err(|e| e.to_string())?;
        (output, None)
    };

    std::fs::write(&path, &output.png)
        .map_err(|e| format!("Error writing {}: {e}", path.display()))?;
    tracing::info!(path = %path.display(), dimensions = %output.dimensions, "sketch written");

    Ok(Sketched {
        path,
        output,
        diagnostics,
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(log_level(cli.verbose, cli.quiet))
        .with_writer(std::io::stderr)
        .init();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = std::fs::create_dir_all(&cli.output_dir) {
        eprintln!("Error creating {}: {e}", cli.output_dir.display());
        return ExitCode::FAILURE;
    }

    let loader = cli
        .root
        .as_ref()
        .map_or_else(FsLoader::new, FsLoader::with_root);
    let sources: Vec<SourceRef> = cli.inputs.iter().map(|s| SourceRef::parse(s)).collect();

    let paths = output_paths(&cli.output_dir, &sources);

    let results: Vec<Result<Sketched, String>> = sources
        .par_iter()
        .zip(paths)
        .map(|(source, path)| sketch_one(&loader, source, &config, path, cli.diagnostics))
        .collect();

    let mut failures = 0usize;
    for (source, result) in sources.iter().zip(results) {
        match result {
            Ok(sketched) => {
                eprintln!(
                    "{source} -> {} ({}, {} bytes)",
                    sketched.path.display(),
                    sketched.output.dimensions,
                    sketched.output.png.len(),
                );
                if let Some(diagnostics) = sketched.diagnostics {
                    if cli.json {
                        match serde_json::to_string_pretty(&diagnostics) {
                            Ok(json) => println!("{json}"),
                            Err(e) => eprintln!("Error serializing diagnostics: {e}"),
                        }
                    } else {
                        println!("{}", diagnostics.report());
                    }
                }
            }
            Err(msg) => {
                eprintln!("{source}: {msg}");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        eprintln!("{failures} of {} inputs failed", sources.len());
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
