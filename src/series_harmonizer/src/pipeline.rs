//! Fetch → normalize → save, one independent task per `(source, code)` job.
//!
//! Jobs share nothing mutable: each gets its adapter handle, a read-only
//! region lookup and the plan's settings, and reports a [`JobOutcome`]. A failing
//! or slow job never affects the others; each one runs under the plan's timeout.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use demand_ingestor::models::resolution::Resolution;
use demand_ingestor::models::time_index::TimezoneState;
use demand_ingestor::region::TimezoneLookup;
use demand_ingestor::sources::{SourceAdapter, SourceError, SourceRegistry};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::clean::{NormalizationReport, NormalizeError, normalize_with_report};
use crate::persist::{self, Format, PersistError};

/// One series to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub source: String,
    /// Region code, `CC` or `CC_SUB`.
    pub code: String,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source, self.code)
    }
}

/// Everything a run needs besides the adapters and the region lookup.
#[derive(Debug, Clone)]
pub struct PipelinePlan {
    pub jobs: Vec<Job>,
    pub output_dir: PathBuf,
    pub format: Format,
    pub target: Resolution,
    pub variable_name: String,
    pub timeout: Duration,
}

impl PipelinePlan {
    /// `<output_dir>/<source>/<code>.<ext>`
    pub fn output_path(&self, job: &Job) -> PathBuf {
        self.output_dir
            .join(&job.source)
            .join(format!("{}.{}", job.code, self.format.extension()))
    }
}

#[derive(Debug)]
pub enum JobStatus {
    Saved {
        path: PathBuf,
        report: NormalizationReport,
    },
    /// The adapter produced no series.
    NoSeries(SourceError),
    /// The raw series could not be normalized.
    Invalid(NormalizeError),
    /// Saving was refused or failed; nothing was left at the destination.
    NotSaved(PersistError),
    TimedOut(Duration),
    /// The job's task panicked or was cancelled.
    Aborted(String),
}

impl JobStatus {
    pub fn is_saved(&self) -> bool {
        matches!(self, JobStatus::Saved { .. })
    }
}

enum Pending {
    Running(JoinHandle<JobStatus>),
    Done(JobStatus),
}

#[derive(Debug)]
pub struct JobOutcome {
    pub job: Job,
    pub status: JobStatus,
}

/// Run every job of `plan` concurrently and collect one outcome per job, in plan order.
pub async fn run<L>(
    registry: &SourceRegistry,
    lookup: Arc<L>,
    plan: &PipelinePlan,
) -> Vec<JobOutcome>
where
    L: TimezoneLookup + Send + Sync + 'static,
{
    let shared = Arc::new(plan.clone());
    let mut pending = Vec::with_capacity(plan.jobs.len());

    for job in &plan.jobs {
        let started = match registry.get(&job.source) {
            Ok(adapter) => Pending::Running(tokio::spawn(run_job(
                adapter,
                Arc::clone(&lookup),
                job.clone(),
                Arc::clone(&shared),
            ))),
            Err(e) => {
                warn!(job = %job, error = %e, "no adapter for job");
                Pending::Done(JobStatus::NoSeries(e))
            }
        };
        pending.push((job.clone(), started));
    }

    let mut outcomes = Vec::with_capacity(pending.len());
    for (job, started) in pending {
        let status = match started {
            Pending::Done(status) => status,
            Pending::Running(task) => task.await.unwrap_or_else(|e| {
                error!(job = %job, error = %e, "job task failed");
                JobStatus::Aborted(e.to_string())
            }),
        };
        outcomes.push(JobOutcome { job, status });
    }

    let saved = outcomes.iter().filter(|o| o.status.is_saved()).count();
    info!(jobs = outcomes.len(), saved, "pipeline run finished");
    outcomes
}

async fn run_job<L>(
    adapter: Arc<dyn SourceAdapter>,
    lookup: Arc<L>,
    job: Job,
    plan: Arc<PipelinePlan>,
) -> JobStatus
where
    L: TimezoneLookup + Send + Sync + 'static,
{
    let work = process(adapter, lookup, job.clone(), Arc::clone(&plan));
    match tokio::time::timeout(plan.timeout, work).await {
        Ok(status) => status,
        Err(_) => {
            warn!(job = %job, timeout = ?plan.timeout, "job timed out");
            JobStatus::TimedOut(plan.timeout)
        }
    }
}

async fn process<L>(
    adapter: Arc<dyn SourceAdapter>,
    lookup: Arc<L>,
    job: Job,
    plan: Arc<PipelinePlan>,
) -> JobStatus
where
    L: TimezoneLookup + Send + Sync + 'static,
{
    let raw = match adapter.fetch(&job.code).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(job = %job, error = %e, "no series produced");
            return JobStatus::NoSeries(e);
        }
    };
    debug!(job = %job, rows = raw.len(), "fetched");

    let path = plan.output_path(&job);
    let blocking_job = job.clone();
    let result = tokio::task::spawn_blocking(move || {
        let (series, report) = match normalize_with_report(raw, plan.target) {
            Ok(ok) => ok,
            Err(e) => return JobStatus::Invalid(e),
        };
        let reference = match series.timezone_state() {
            TimezoneState::Aware => None,
            TimezoneState::Naive => reference_zone(lookup.as_ref(), &blocking_job),
        };
        match persist::save(&series, &path, &plan.variable_name, reference) {
            Ok(()) => JobStatus::Saved { path, report },
            Err(e) => JobStatus::NotSaved(e),
        }
    })
    .await;

    let status = result.unwrap_or_else(|e| JobStatus::Aborted(e.to_string()));
    match &status {
        JobStatus::Saved { path, report } => info!(
            job = %job,
            path = %path.display(),
            duplicates_dropped = report.duplicates_dropped,
            missing_values = report.missing_values,
            resampled = report.resample.is_some(),
            "job done"
        ),
        JobStatus::Invalid(e) => warn!(job = %job, error = %e, "raw series rejected"),
        JobStatus::NotSaved(e) => warn!(job = %job, error = %e, "series not saved"),
        _ => {}
    }
    status
}

fn reference_zone<L: TimezoneLookup + ?Sized>(lookup: &L, job: &Job) -> Option<Tz> {
    match lookup.time_zone(&job.code) {
        Ok(tz) => Some(tz),
        Err(e) => {
            warn!(job = %job, error = %e, "no reference timezone for naive series");
            None
        }
    }
}
