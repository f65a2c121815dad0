//! Many-parcel evaluation on a worker pool. Parcels share nothing, and one
//! parcel's failure never reaches its siblings.

use crate::budget::Budget;
use crate::config::Config;
use crate::error::{ScoreError, SearchError};
use crate::footprint;
use crate::score::{self, ParcelLayers};
use crate::solver::Solver;
use crate::types::{ParcelStatus, Placement, ResultRecord, SearchOutcome};
use ndarray::Array2;
use rayon::prelude::*;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParcelJob {
    pub id: String,
    /// Used only to schedule large parcels first.
    pub size_hint: u64,
}

#[derive(Debug, Clone)]
pub struct ParcelReport {
    pub id: String,
    pub status: ParcelStatus,
    pub placement: Option<Placement>,
    /// Parcel-frame AOI raster, present when a placement was found.
    pub footprint: Option<Array2<u8>>,
    pub elapsed_ms: u128,
}

/// Layers read for a job. `id` replaces the job id when the source names its parcel.
#[derive(Debug, Clone, Default)]
pub struct LoadedParcel {
    pub id: Option<String>,
    pub layers: ParcelLayers,
}

impl From<ParcelLayers> for LoadedParcel {
    fn from(layers: ParcelLayers) -> Self {
        Self { id: None, layers }
    }
}

impl ParcelReport {
    /// Zero report for a parcel whose evaluation died before producing a status.
    pub fn failed(id: &str, detail: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            status: ParcelStatus::Failed(detail.into()),
            placement: None,
            footprint: None,
            elapsed_ms: 0,
        }
    }

    pub fn record(&self) -> ResultRecord {
        ResultRecord::new(&self.id, &self.status, self.placement.as_ref())
    }
}

/// Scores, searches, and projects one parcel end to end.
pub fn evaluate_parcel(
    id: &str,
    layers: Result<ParcelLayers, ScoreError>,
    config: &Config,
) -> ParcelReport {
    let started = Instant::now();
    let mut report = ParcelReport {
        id: id.to_string(),
        status: ParcelStatus::Found,
        placement: None,
        footprint: None,
        elapsed_ms: 0,
    };

    let scored = layers.and_then(|l| score::score_parcel(&l, &config.weights));
    let scored = match scored {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(parcel = id, error = %e, "parcel data unavailable");
            report.status = ParcelStatus::DataUnavailable(e.to_string());
            report.elapsed_ms = started.elapsed().as_millis();
            return report;
        }
    };

    let solver = Solver::new(config.search.clone())
        .with_budget(Budget::from_millis(config.search.deadline_ms));
    match solver.solve(&scored.score, &scored.divider, config.min_acres, config.max_acres) {
        Ok(SearchOutcome::Found(placement)) => {
            report.footprint = Some(footprint::project(
                &placement,
                &scored.score,
                config.footprint_smoothing,
            ));
            report.placement = Some(placement);
        }
        Ok(SearchOutcome::Unusable(reason)) => report.status = ParcelStatus::Unusable(reason),
        Err(e @ (SearchError::Cancelled | SearchError::DeadlineExceeded)) => {
            report.status = ParcelStatus::Cancelled(e.to_string());
        }
        Err(e) => {
            tracing::warn!(parcel = id, error = %e, "parcel search failed");
            report.status = ParcelStatus::Failed(e.to_string());
        }
    }

    report.elapsed_ms = started.elapsed().as_millis();
    tracing::info!(
        parcel = id,
        status = report.status.code(),
        score = report.placement.as_ref().map_or(0.0, |p| p.score),
        elapsed_ms = report.elapsed_ms as u64,
        "parcel evaluated"
    );
    report
}

/// Evaluates every job on a pool of `threads` workers (rayon's default when
/// `None`). Reports come back largest parcel first.
pub fn run<L>(
    mut jobs: Vec<ParcelJob>,
    load: L,
    config: &Config,
    threads: Option<usize>,
) -> Result<Vec<ParcelReport>, rayon::ThreadPoolBuildError>
where
    L: Fn(&str) -> Result<LoadedParcel, ScoreError> + Sync,
{
    jobs.sort_by(|a, b| b.size_hint.cmp(&a.size_hint));

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    let pool = builder.build()?;

    Ok(pool.install(|| {
        jobs.par_iter()
            .map(|job| {
                catch_unwind(AssertUnwindSafe(|| match load(&job.id) {
                    Ok(LoadedParcel { id, layers }) => {
                        evaluate_parcel(id.as_deref().unwrap_or(&job.id), Ok(layers), config)
                    }
                    Err(e) => evaluate_parcel(&job.id, Err(e), config),
                }))
                .unwrap_or_else(|panic| {
                    let msg = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::warn!(parcel = %job.id, %msg, "parcel evaluation panicked");
                    ParcelReport::failed(&job.id, format!("panicked: {msg}"))
                })
            })
            .collect()
    }))
}

/// Writes one summary row per report.
pub fn write_summary<W: std::io::Write>(reports: &[ParcelReport], writer: W) -> Result<(), csv::Error> {
    let mut out = csv::Writer::from_writer(writer);
    for report in reports {
        out.serialize(report.record())?;
    }
    out.flush()?;
    Ok(())
}
