use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use demand_ingestor::models::resolution::Resolution;
use series_harmonizer::config::load_pipeline_path;
use series_harmonizer::gaps::add_missing_time_steps;
use series_harmonizer::pipeline::{self, JobStatus};
use series_harmonizer::{persist, quality};
use shared_utils::config::FoldersConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Electricity demand series harmonizer")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Fetch, normalize and save every configured series.
    Run(RunCmd),
    /// Print a quality summary of a saved series.
    Inspect(InspectCmd),
}

#[derive(Args)]
struct RunCmd {
    #[arg(long, value_name = "FILE")]
    config: PathBuf,
    /// Only run the jobs of this source.
    #[arg(long, value_name = "ID")]
    source: Option<String>,
}

#[derive(Args)]
struct InspectCmd {
    #[arg(long, value_name = "PATH")]
    file: PathBuf,
    /// Grid used to count missing time steps.
    #[arg(long, default_value = "1h")]
    step: Resolution,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Run(RunCmd { config, source }) => run(config, source).await,
        Cmd::Inspect(InspectCmd { file, step }) => inspect(file, step),
    }
}

async fn run(config: PathBuf, source: Option<String>) -> Result<()> {
    // 1) Read configuration
    let cfg = load_pipeline_path(&config)?;
    let folders = FoldersConfig::load(&cfg.directories)
        .with_context(|| format!("load folders from {}", cfg.directories.display()))?;

    // 2) Wire adapters, regions and jobs
    let (registry, regions, plan) = cfg.build(&folders, source.as_deref())?;
    info!(jobs = plan.jobs.len(), output = %plan.output_dir.display(), "starting run");

    // 3) Run
    let outcomes = pipeline::run(&registry, Arc::new(regions), &plan).await;

    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.status {
            JobStatus::Saved { path, .. } => println!("saved   {} -> {}", outcome.job, path.display()),
            other => {
                failed += 1;
                println!("failed  {} ({other:?})", outcome.job);
            }
        }
    }
    if failed == outcomes.len() && !outcomes.is_empty() {
        bail!("no series was saved");
    }
    Ok(())
}

fn inspect(file: PathBuf, step: Resolution) -> Result<()> {
    let stored = persist::load(&file).with_context(|| format!("load {}", file.display()))?;
    let report = quality::inspect(&stored.series);
    let (_, missing_steps) = add_missing_time_steps(&stored.series, step)?;

    println!("file:               {}", file.display());
    println!("variable:           {}", stored.variable_name);
    println!("timezone:           {}", stored.series.timezone_state());
    if let Some(tz) = stored.reference_timezone {
        println!("reference timezone: {tz}");
    }
    println!("rows:               {}", report.rows);
    println!("missing values:     {}", report.missing_values);
    println!("missing {step} steps:  {missing_steps}");
    for (delta, count) in &report.step_counts {
        println!("step {:>8}:      {count}", Resolution::hours_label(*delta));
    }
    Ok(())
}
