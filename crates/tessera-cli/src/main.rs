//! Tessera command-line interface.
//!
//! Provides the `tessera` binary. Input is an analysis bundle: a JSON file
//! holding per-file analyses produced by a source analyzer. `build` runs the
//! full pipeline and prints the artifact as JSON; `graph` stops after the
//! dependency graph and prints that instead.
//!
//! Exit codes: 0 = success, 1 = build error, 2 = invalid input,
//! 3 = I/O error. Build errors are printed to stderr as an error payload.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tessera_builder::{AnalysisBundle, BuilderError, BuilderOptions, BuilderSession};
use tessera_check::CyclePolicy;
use tessera_core::{build_graph, CandidateResolver};

/// GraphQL element builder.
#[derive(Parser)]
#[command(name = "tessera", about = "Builds GraphQL elements from analyzed sources")]
struct Cli {
    /// Log at debug level (overrides TESSERA_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the artifact from an analysis bundle.
    Build {
        #[command(flatten)]
        input: InputArgs,

        /// Write the artifact here instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Treat every import cycle as fatal.
        #[arg(long)]
        strict: bool,

        /// Emit one intermediate module instead of one per file.
        #[arg(long)]
        single_chunk: bool,
    },
    /// Print the dependency graph of an analysis bundle.
    Graph {
        #[command(flatten)]
        input: InputArgs,
    },
}

#[derive(clap::Args)]
struct InputArgs {
    /// Path to the analysis bundle (JSON).
    #[arg(short, long)]
    bundle: PathBuf,

    /// Path to a builder options file (JSON).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Entry point file; repeatable. Overrides bundle and config entries.
    #[arg(short, long = "entry")]
    entries: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid input: {0}")]
    Input(BuilderError),

    #[error("failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Build(#[from] BuilderError),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Build(_) | CliError::Serialize(_) => 1,
            CliError::Input(_) => 2,
            CliError::Read { .. } | CliError::Write { .. } => 3,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Build {
            input,
            out,
            strict,
            single_chunk,
        } => run_build(&input, out.as_deref(), strict, single_chunk),
        Commands::Graph { input } => run_graph(&input),
    };

    if let Err(err) = result {
        report(&err);
        process::exit(err.exit_code());
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("TESSERA_LOG").unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn report(err: &CliError) {
    match err {
        CliError::Build(inner) | CliError::Input(inner) => {
            let payload = serde_json::to_string_pretty(&inner.payload())
                .unwrap_or_else(|_| format!("{{\"code\": \"{}\"}}", inner.code()));
            eprintln!("{}", payload);
        }
        other => eprintln!("Error: {}", other),
    }
}

/// Reads the bundle and options, applying entry point precedence:
/// `--entry`, then bundle entries, then config entries, then every file.
fn load_input(input: &InputArgs) -> Result<(AnalysisBundle, BuilderOptions), CliError> {
    let bundle = AnalysisBundle::from_json(&read(&input.bundle)?).map_err(CliError::Input)?;
    let mut options = match &input.config {
        Some(path) => BuilderOptions::from_json(&read(path)?).map_err(CliError::Input)?,
        None => BuilderOptions::default(),
    };

    if !input.entries.is_empty() {
        options.entry_points = input.entries.clone();
    } else if let Some(entries) = &bundle.entry_points {
        options.entry_points = entries.clone();
    } else if options.entry_points.is_empty() {
        options.entry_points = bundle.entry_points_or_all();
    }
    Ok((bundle, options))
}

fn run_build(
    input: &InputArgs,
    out: Option<&Path>,
    strict: bool,
    single_chunk: bool,
) -> Result<(), CliError> {
    let (bundle, mut options) = load_input(input)?;
    if strict {
        options.cycle_policy = CyclePolicy::Strict;
    }
    if single_chunk {
        options.chunked = false;
    }
    tracing::debug!(
        "{} file(s) in bundle, {} entry point(s)",
        bundle.files.len(),
        options.entry_points.len()
    );

    let mut session = BuilderSession::in_memory(bundle.into_analyzer(), options);
    let artifact = session.build(None)?;
    let json = serde_json::to_string_pretty(artifact)?;
    emit(out, &json)
}

fn run_graph(input: &InputArgs) -> Result<(), CliError> {
    let (bundle, options) = load_input(input)?;
    let resolver = CandidateResolver::new(bundle.files.iter().map(|f| f.file_path.clone()))
        .with_candidates(options.candidates());
    let graph = build_graph(&bundle.files, &resolver).map_err(BuilderError::from)?;
    tracing::info!("graph has {} node(s)", graph.len());
    let json = serde_json::to_string_pretty(&graph)?;
    emit(None, &json)
}

fn read(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn emit(out: Option<&Path>, json: &str) -> Result<(), CliError> {
    match out {
        Some(path) => fs::write(path, json).map_err(|source| CliError::Write {
            path: path.to_path_buf(),
            source,
        }),
        None => {
            println!("{}", json);
            Ok(())
        }
    }
}
