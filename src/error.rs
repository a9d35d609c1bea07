use crate::types::{PipelineId, PluginId};
use reqwest::Response;

/// Error from a request to the *CUBE* API.
#[derive(thiserror::Error, Debug)]
pub enum CubeError {
    /// Error response status, surfaced after the retry ceiling is spent.
    #[error("({status:?} {reason:?}): {text:?}")]
    Status {
        status: reqwest::StatusCode,
        reason: &'static str,
        text: Result<String, reqwest::Error>,
        source: reqwest::Error,
    },

    #[error(transparent)]
    Request(#[from] reqwest::Error),

    /// The response body is not a collection+json document.
    #[error("response from {url} is not a CUBE collection ({source}): {body:?}")]
    Decode {
        url: String,
        body: String,
        source: serde_json::Error,
    },

    #[error("no plugin found matching name={name:?} version={version:?}")]
    PluginNotFound { name: String, version: String },

    #[error("CUBE did not return an id for the created instance of plugin {plugin}")]
    SchedulingFailed { plugin: PluginId },

    #[error("no pipeline found matching name={name:?}")]
    PipelineNotFound { name: String },

    #[error("CUBE did not return an id for the created workflow of pipeline {pipeline}")]
    PipelineDispatchFailed { pipeline: PipelineId },
}

pub(crate) async fn check(res: Response) -> Result<Response, CubeError> {
    match res.error_for_status_ref() {
        Ok(_) => Ok(res),
        Err(source) => {
            let status = res.status();
            let reason = status.canonical_reason().unwrap_or("unknown reason");
            let text = res.text().await;
            Err(CubeError::Status {
                status,
                reason,
                text,
                source,
            })
        }
    }
}
