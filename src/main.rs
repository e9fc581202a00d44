use anyhow::Result;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use tracing::Level;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use layercaption::pipeline;
use layercaption::plan::{BatchPair, Job, RunPlan};

/// Injects layer captions into a map definition and writes a tree listing
/// next to the annotated output.
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    /// Process one or more MAP:LAYERS pairs
    #[clap(long, num_args = 1.., value_name = "MAP:LAYERS", conflicts_with_all = ["files", "plan"])]
    batch: Option<Vec<String>>,
    /// Output directory for batch pairs (defaults to each map's directory)
    #[clap(long, requires = "batch")]
    outdir: Option<String>,
    /// Run the jobs listed in a YAML plan file
    #[clap(short, long, conflicts_with = "files")]
    plan: Option<PathBuf>,
    /// Re-run whenever an input file changes
    #[clap(short, long)]
    watch: bool,
    /// <MAP> <LAYERS> <OUTPUT>
    #[clap(value_name = "FILE")]
    files: Vec<PathBuf>,
}

impl Cli {
    fn run_plan(&self, base_dir: PathBuf) -> Result<RunPlan, clap::Error> {
        if let Some(tokens) = &self.batch {
            let pairs = BatchPair::parse_all(tokens.as_slice());
            if pairs.is_empty() {
                return Err(Cli::command().error(
                    ErrorKind::ValueValidation,
                    "No pairs provided. Example: --batch map_1.json:layers.json map_2.json:layers2.json",
                ));
            }
            return Ok(RunPlan::batch(base_dir, &pairs, self.outdir.as_deref()));
        }

        if let Some(plan_path) = &self.plan {
            return RunPlan::from_yaml_file(plan_path)
                .map_err(|e| Cli::command().error(ErrorKind::Io, e));
        }

        match self.files.as_slice() {
            [map, layers, output] => Ok(RunPlan::single(base_dir, Job::new(map, layers, output))),
            [] => Err(Cli::command().error(
                ErrorKind::MissingRequiredArgument,
                "expected <MAP> <LAYERS> <OUTPUT>, --batch or --plan",
            )),
            files => Err(Cli::command().error(
                ErrorKind::WrongNumberOfValues,
                format!("expected <MAP> <LAYERS> <OUTPUT>, got {} file(s)", files.len()),
            )),
        }
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    let base_dir = std::env::current_dir()?;
    let plan = args.run_plan(base_dir).unwrap_or_else(|e| e.exit());
    debug!("Resolved {} job(s) against {}", plan.jobs.len(), plan.base_dir.display());

    let reports = pipeline::run_plan(&plan)?;
    info!("Processed {} job(s)", reports.len());

    if args.watch {
        pipeline::watch_for_changes(&plan)?;
    }

    Ok(())
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("notify=warn,{}", log_level)))
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}
