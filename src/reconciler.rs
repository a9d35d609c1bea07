//! The registration reconciliation loop.
use std::time::Duration;

use camino::Utf8Path;

use crate::anonymize::{dispatch_series, SendParams};
use crate::cube_client::CubeClient;
use crate::error::CubeError;
use crate::pfdcm::{PfdcmClient, PfdcmError};
use crate::retry_table::RetryTable;
use crate::series::SeriesDescriptor;
use crate::types::PluginInstanceId;

/// Everything the reconciliation loop needs besides the table itself.
pub(crate) struct ReconcileContext<'a> {
    pub cube: &'a CubeClient,
    pub pfdcm: &'a PfdcmClient,
    pub output_dir: &'a Utf8Path,
    pub send: &'a SendParams,
    pub previous_id: PluginInstanceId,
    pub poll_interval: Duration,
    pub max_poll: u32,
}

/// Errors which abort the whole run. Per-series dispatch failures are *not*
/// among them: those are recorded in [ReconcileOutcome] and the loop moves on.
#[derive(thiserror::Error, Debug)]
pub(crate) enum ReconcileError {
    #[error(transparent)]
    Cube(#[from] CubeError),

    #[error(transparent)]
    Pfdcm(#[from] PfdcmError),

    #[error("failed to write retry audit file: {0}")]
    Audit(#[from] std::io::Error),
}

/// What became of the series of one batch.
#[derive(Debug, Default)]
pub(crate) struct ReconcileOutcome {
    /// Series which never registered within their retry budget.
    pub unresolved: Vec<String>,
    /// Series which registered but whose pipeline dispatch failed.
    pub dispatch_failures: Vec<String>,
}

impl ReconcileOutcome {
    pub fn contains_errors(&self) -> bool {
        !self.unresolved.is_empty() || !self.dispatch_failures.is_empty()
    }
}

/// Reconcile every series in the table against its registration in *CUBE*:
/// dispatch the pipeline for each series which registers, re-request each
/// series which does not, and give up on a series once its retries are spent.
pub(crate) async fn reconcile_registrations(
    mut table: RetryTable,
    ctx: &ReconcileContext<'_>,
) -> Result<ReconcileOutcome, ReconcileError> {
    let mut outcome = ReconcileOutcome::default();
    while !table.is_empty() {
        reconcile_pass(&mut table, ctx, &mut outcome).await?;
    }
    Ok(outcome)
}

/// One pass over a snapshot of the table's series.
async fn reconcile_pass(
    table: &mut RetryTable,
    ctx: &ReconcileContext<'_>,
    outcome: &mut ReconcileOutcome,
) -> Result<(), ReconcileError> {
    for uid in table.uids() {
        let Some(entry) = table.get(&uid) else {
            continue;
        };
        let series = entry.series.clone();
        let registered = poll_for_registration(ctx, &series).await?;
        if registered == 0 {
            retry_series(table, ctx, outcome, &uid).await?;
        } else {
            tracing::info!(
                SeriesInstanceUID = uid.as_str(),
                registered = registered,
                "series is registered, dispatching pipeline"
            );
            if let Err(e) = dispatch_series(ctx.cube, ctx.send, ctx.previous_id, &series).await {
                tracing::error!(
                    SeriesInstanceUID = uid.as_str(),
                    error = e.to_string(),
                    "failed to dispatch pipeline for series"
                );
                outcome.dispatch_failures.push(uid.clone());
            }
            table.remove(&uid);
        }
    }
    Ok(())
}

/// Query the number of registered files of the series, polling until it is
/// nonzero or the poll budget for a series of its size runs out.
async fn poll_for_registration(
    ctx: &ReconcileContext<'_>,
    series: &SeriesDescriptor,
) -> Result<u64, ReconcileError> {
    let uid = series.SeriesInstanceUID.as_str();
    let budget = poll_budget(series.NumberOfSeriesRelatedInstances, ctx.max_poll);
    let mut registered = ctx.cube.count_registered_files(uid).await?;
    let mut polls = 0;
    while registered == 0 && polls < budget {
        tokio::time::sleep(ctx.poll_interval).await;
        registered = ctx.cube.count_registered_files(uid).await?;
        polls += 1;
        tracing::debug!(
            SeriesInstanceUID = uid,
            registered = registered,
            polls = polls,
            "polled CUBE for registered files"
        );
    }
    Ok(registered)
}

/// Ask the PACS to retrieve the series again, record the response, and give
/// up on the series once its budget is spent.
async fn retry_series(
    table: &mut RetryTable,
    ctx: &ReconcileContext<'_>,
    outcome: &mut ReconcileOutcome,
    uid: &str,
) -> Result<(), ReconcileError> {
    let Some(entry) = table.get_mut(uid) else {
        return Ok(());
    };
    if entry.remaining_retries == 0 {
        // only reachable with a zero retry budget
        tracing::error!(SeriesInstanceUID = uid, "series never registered");
        outcome.unresolved.push(uid.to_string());
        table.remove(uid);
        return Ok(());
    }
    let response = ctx.pfdcm.retrieve(&entry.series).await?;
    entry.remaining_retries -= 1;
    let remaining = entry.remaining_retries;
    write_retry_audit(ctx.output_dir, uid, remaining, &response).await?;
    tracing::warn!(
        SeriesInstanceUID = uid,
        remaining_retries = remaining,
        "series not registered, asked PACS to retrieve it again"
    );
    if remaining == 0 {
        tracing::error!(
            SeriesInstanceUID = uid,
            "retries exhausted, series never registered"
        );
        outcome.unresolved.push(uid.to_string());
        table.remove(uid);
    }
    Ok(())
}

/// How many times to poll for a series of `file_count` files: never for an
/// empty series, the default number of times for a small one, and
/// proportionally more for every full hundred files.
pub(crate) fn poll_budget(file_count: u32, default_polls: u32) -> u32 {
    if file_count == 0 {
        0
    } else if file_count < 100 {
        default_polls
    } else {
        default_polls.saturating_mul(file_count / 100)
    }
}

/// Persist pfdcm's response to `{uid}_retrieve_retry_{remaining}.json` in the
/// output directory, where `remaining` counts the retries the series has left
/// *after* this re-request.
async fn write_retry_audit(
    output_dir: &Utf8Path,
    uid: &str,
    remaining: u32,
    response: &serde_json::Value,
) -> Result<(), std::io::Error> {
    let path = output_dir.join(retry_audit_filename(uid, remaining));
    let pretty = serde_json::to_string_pretty(response)?;
    fs_err::tokio::write(&path, pretty).await
}

fn retry_audit_filename(uid: &str, remaining: u32) -> String {
    format!("{uid}_retrieve_retry_{remaining}.json")
}
