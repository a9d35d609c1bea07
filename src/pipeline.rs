//! Dispatch of a named pipeline (a "workflow" in *CUBE* terms).
use std::collections::HashMap;

use serde::Serialize;
use serde_json::json;

use crate::cube_client::CubeClient;
use crate::error::CubeError;
use crate::types::PluginInstanceId;

/// Per-stage parameter overrides, keyed by the stage's title in the pipeline
/// template. Each value is a JSON object mapping parameter names to values.
pub(crate) type StageOverrides = HashMap<&'static str, serde_json::Value>;

#[derive(Serialize)]
struct WorkflowRequest<'a> {
    previous_plugin_inst_id: PluginInstanceId,
    nodes_info: &'a str,
}

/// Schedule an instantiation of the named pipeline to run after the given
/// plugin instance, applying the per-stage parameter overrides. Stage
/// ordering and dependencies are owned by the pipeline template in *CUBE*.
pub(crate) async fn run_pipeline(
    cube: &CubeClient,
    previous: PluginInstanceId,
    pipeline_name: &str,
    overrides: &StageOverrides,
) -> Result<(), CubeError> {
    let pipeline = cube.resolve_pipeline(pipeline_name).await?;
    let nodes_info = nodes_info(overrides);
    let request = WorkflowRequest {
        previous_plugin_inst_id: previous,
        nodes_info: &nodes_info,
    };
    let workflow = cube.create_workflow(pipeline, &request).await?;
    tracing::info!(
        pipeline = pipeline_name,
        workflow_id = workflow,
        previous_plugin_inst_id = previous.0,
        "pipeline scheduled"
    );
    Ok(())
}

/// Encode stage overrides the way *CUBE*'s workflows API wants them: a
/// JSON-string-valued field holding one node object per overridden stage.
fn nodes_info(overrides: &StageOverrides) -> String {
    let mut stages: Vec<_> = overrides.iter().collect();
    stages.sort_by_key(|(title, _)| **title);
    let nodes: Vec<serde_json::Value> = stages
        .into_iter()
        .map(|(title, params)| {
            let defaults: Vec<serde_json::Value> = params
                .as_object()
                .map(|object| {
                    object
                        .iter()
                        .map(|(name, value)| json!({"name": name, "value": value}))
                        .collect()
                })
                .unwrap_or_default();
            json!({"title": title, "plugin_parameter_defaults": defaults})
        })
        .collect();
    serde_json::Value::Array(nodes).to_string()
}
