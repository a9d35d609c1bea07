use anyhow::Context;

use crate::anonymize::SendParams;
use crate::config::get_config;
use crate::cube_client::CubeClient;
use crate::input::{discover_input_files, read_series_batch};
use crate::pfdcm::PfdcmClient;
use crate::reconciler::{reconcile_registrations, ReconcileContext};
use crate::retry_table::RetryTable;
use crate::settings::RegiflowEnvOptions;
use crate::types::PluginInstanceId;

/// Calls [run_everything] using configuration from environment variables.
///
/// Credentials and the previous plugin instance fall back to the
/// `CHRIS_USER_TOKEN` and `CHRIS_PREV_PLG_INST_ID` variables injected by the
/// ChRIS plugin runtime.
pub async fn run_everything_from_env() -> anyhow::Result<bool> {
    let config = get_config();
    let mut settings: RegiflowEnvOptions = config.extract()?;
    if settings.cube.auth().is_none() {
        settings.cube.token = std::env::var("CHRIS_USER_TOKEN").ok();
    }
    if settings.previous_id.is_none() {
        settings.previous_id = previous_id_from_chris_env()?;
    }
    run_everything(settings).await
}

/// Runs the whole reconciliation:
///
/// 1. Pre-flight: resolve credentials and the plugin instance to schedule
///    after, then check connectivity to *CUBE*. Failure here aborts the run.
/// 2. For every input file, reconcile the registration of every series in it.
///
/// Returns whether any series failed to register or to dispatch.
pub async fn run_everything(
    RegiflowEnvOptions {
        cube,
        pfdcm_url,
        pacs_name,
        previous_id,
        input_dir,
        output_dir,
        input_json_file,
        poll_interval,
        max_poll,
        http_retries,
        neuro_dicom_location,
        neuro_anon_location,
        neuro_nifti_location,
        folder_name,
        recipients: _,
        smtp_server: _,
    }: RegiflowEnvOptions,
) -> anyhow::Result<bool> {
    let auth = cube.auth().context(
        "no CUBE credentials: set REGIFLOW_CUBE_USERNAME and REGIFLOW_CUBE_PASSWORD, or REGIFLOW_CUBE_TOKEN",
    )?;
    let previous_id =
        previous_id.context("no plugin instance to schedule after: set REGIFLOW_PREVIOUS_ID")?;
    let cube = CubeClient::new(cube.url, auth, http_retries);
    cube.health_check()
        .await
        .context("pre-flight connectivity check to CUBE failed")?;

    let pfdcm = PfdcmClient::new(pfdcm_url, pacs_name);
    let send = SendParams {
        dicom_location: neuro_dicom_location,
        anon_location: neuro_anon_location,
        nifti_location: neuro_nifti_location,
        folder_name,
    };

    let inputs = discover_input_files(&input_dir, &input_json_file)?;
    if inputs.is_empty() {
        tracing::warn!(
            input_dir = input_dir.as_str(),
            pattern = input_json_file.as_str(),
            "no input file matches, nothing to reconcile"
        );
        return Ok(false);
    }

    let mut contains_errors = false;
    for input in inputs {
        let batch = read_series_batch(&input).await?;
        let table = RetryTable::new(batch);
        tracing::info!(
            input = input.as_str(),
            series = table.len(),
            "reconciling registration of series batch"
        );
        let ctx = ReconcileContext {
            cube: &cube,
            pfdcm: &pfdcm,
            output_dir: &output_dir,
            send: &send,
            previous_id,
            poll_interval,
            max_poll,
        };
        let outcome = reconcile_registrations(table, &ctx).await?;
        if outcome.contains_errors() {
            contains_errors = true;
        }
        tracing::info!(
            input = input.as_str(),
            unresolved = outcome.unresolved.len(),
            dispatch_failures = outcome.dispatch_failures.len(),
            "batch reconciled"
        );
    }
    Ok(contains_errors)
}

fn previous_id_from_chris_env() -> anyhow::Result<Option<PluginInstanceId>> {
    match std::env::var("CHRIS_PREV_PLG_INST_ID") {
        Ok(value) => {
            let id = value
                .parse()
                .with_context(|| format!("CHRIS_PREV_PLG_INST_ID={value:?} is not a number"))?;
            Ok(Some(PluginInstanceId(id)))
        }
        Err(_) => Ok(None),
    }
}
