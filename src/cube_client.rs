use std::time::Duration;

use reqwest::{RequestBuilder, Response};
use serde::Serialize;

use crate::collection::{Collection, CollectionEnvelope};
use crate::error::{check, CubeError};
use crate::settings::CubeAuth;
use crate::types::{DicomDir, PacsFilePath, PipelineId, PluginId, PluginInstanceId};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the *CUBE* API.
///
/// Every request is retried on transient failure (connection error, timeout,
/// or an error response status) up to the configured number of attempts, with
/// exponential backoff capped at 10 seconds between attempts.
pub struct CubeClient {
    client: reqwest::Client,
    url: String,
    auth: CubeAuth,
    retries: u32,
}

/// Search terms identifying one plugin in *CUBE*.
#[derive(Serialize)]
pub struct PluginSearch<'a> {
    pub name: &'a str,
    pub version: &'a str,
}

#[derive(Serialize)]
#[allow(non_snake_case)]
struct PacsFileSearch<'a> {
    SeriesInstanceUID: &'a str,
    limit: u32,
}

impl CubeClient {
    pub fn new(url: String, auth: CubeAuth, retries: u32) -> Self {
        let url = if url.ends_with('/') {
            url
        } else {
            format!("{url}/")
        };
        Self {
            client: reqwest::ClientBuilder::new()
                .use_rustls_tls()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap(),
            url,
            auth,
            retries: retries.max(1),
        }
    }

    /// Verify connectivity and credentials by requesting the API root.
    pub async fn health_check(&self) -> Result<(), CubeError> {
        self.request_collection(|client| client.get(&self.url), &self.url)
            .await
            .map(|_| ())
    }

    /// Look up the identifier of a plugin by name and version.
    pub async fn resolve_plugin(&self, plugin: &PluginSearch<'_>) -> Result<PluginId, CubeError> {
        let url = format!("{}plugins/search/", self.url);
        let collection = self.get_collection(&url, plugin).await?;
        collection
            .first_id()
            .map(PluginId)
            .ok_or_else(|| CubeError::PluginNotFound {
                name: plugin.name.to_string(),
                version: plugin.version.to_string(),
            })
    }

    /// Request creation of an instance of a plugin, returning the new
    /// instance's identifier.
    pub async fn create_plugin_instance<P: Serialize>(
        &self,
        plugin: PluginId,
        parameters: &P,
    ) -> Result<PluginInstanceId, CubeError> {
        let url = format!("{}plugins/{}/instances/", self.url, plugin);
        let collection = self.post_collection(&url, parameters).await?;
        collection
            .first_id()
            .map(PluginInstanceId)
            .ok_or(CubeError::SchedulingFailed { plugin })
    }

    /// Number of files of the series registered in *CUBE* so far.
    pub async fn count_registered_files(
        &self,
        series_instance_uid: &str,
    ) -> Result<u64, CubeError> {
        let collection = self.search_pacsfiles(series_instance_uid).await?;
        Ok(collection.total())
    }

    /// Locate the storage folder containing the series' registered files.
    /// [None] means no file of the series is registered.
    pub async fn files_dir_of(
        &self,
        series_instance_uid: &str,
    ) -> Result<Option<DicomDir>, CubeError> {
        let collection = self.search_pacsfiles(series_instance_uid).await?;
        let dir = collection
            .first_value_of("fname")
            .and_then(|value| value.as_str())
            .map(PacsFilePath::from)
            .map(DicomDir::from);
        Ok(dir)
    }

    /// Look up the identifier of a pipeline by its exact name.
    pub async fn resolve_pipeline(&self, name: &str) -> Result<PipelineId, CubeError> {
        let url = format!("{}pipelines/search/", self.url);
        let collection = self.get_collection(&url, &[("name", name)]).await?;
        collection
            .first_id()
            .map(PipelineId)
            .ok_or_else(|| CubeError::PipelineNotFound {
                name: name.to_string(),
            })
    }

    /// Request creation of a workflow (an instantiation of a pipeline),
    /// returning the new workflow's identifier.
    pub async fn create_workflow<B: Serialize>(
        &self,
        pipeline: PipelineId,
        workflow: &B,
    ) -> Result<u32, CubeError> {
        let url = format!("{}pipelines/{}/workflows/", self.url, pipeline);
        let collection = self.post_collection(&url, workflow).await?;
        collection
            .first_id()
            .ok_or(CubeError::PipelineDispatchFailed { pipeline })
    }

    async fn search_pacsfiles(&self, series_instance_uid: &str) -> Result<Collection, CubeError> {
        let url = format!("{}pacsfiles/search/", self.url);
        let query = PacsFileSearch {
            SeriesInstanceUID: series_instance_uid,
            limit: 1,
        };
        self.get_collection(&url, &query).await
    }

    async fn get_collection<Q: Serialize>(
        &self,
        url: &str,
        query: &Q,
    ) -> Result<Collection, CubeError> {
        self.request_collection(|client| client.get(url).query(query), url)
            .await
    }

    async fn post_collection<B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<Collection, CubeError> {
        self.request_collection(|client| client.post(url).json(body), url)
            .await
    }

    async fn request_collection<F>(&self, build: F, url: &str) -> Result<Collection, CubeError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let body = self.send_with_retries(build).await?.text().await?;
        serde_json::from_str::<CollectionEnvelope>(&body)
            .map(|envelope| envelope.collection)
            .map_err(|source| CubeError::Decode {
                url: url.to_string(),
                body,
                source,
            })
    }

    async fn send_with_retries<F>(&self, build: F) -> Result<Response, CubeError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let mut last_error = None;
        for attempt in 1..=self.retries {
            match send_checked(self.prepare(build(&self.client))).await {
                Ok(res) => return Ok(res),
                Err(e) if should_retry(&e) => {
                    if attempt != self.retries {
                        let duration = backoff(attempt);
                        tracing::warn!(
                            "Error from CUBE: {:?}. Going to retry after {}s",
                            &e,
                            duration.as_secs()
                        );
                        tokio::time::sleep(duration).await;
                    }
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap())
    }

    fn prepare(&self, req: RequestBuilder) -> RequestBuilder {
        let req = req.header(reqwest::header::ACCEPT, "application/vnd.collection+json");
        match &self.auth {
            CubeAuth::Basic { username, password } => req.basic_auth(username, Some(password)),
            CubeAuth::Token { token } => req.bearer_auth(token),
        }
    }
}

async fn send_checked(req: RequestBuilder) -> Result<Response, CubeError> {
    let res = req.send().await?;
    check(res).await
}

fn should_retry(e: &CubeError) -> bool {
    match e {
        CubeError::Status { .. } => true,
        CubeError::Request(e) => e.is_connect() || e.is_timeout(),
        _ => false,
    }
}

/// Produce duration to sleep for (will never exceed 10 seconds).
fn backoff(attempt: u32) -> Duration {
    let seconds = std::cmp::min(2u64.saturating_pow(attempt), 10);
    Duration::from_secs(seconds)
}
