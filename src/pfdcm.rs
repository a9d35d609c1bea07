//! Client for *pfdcm*, the PACS retrieval service.
use std::time::Duration;

use serde::Serialize;

use crate::series::SeriesDescriptor;
use crate::types::PacsName;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(thiserror::Error, Debug)]
pub enum PfdcmError {
    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

/// Client for *pfdcm*'s pypx thread API.
///
/// Unlike requests to *CUBE*, a retrieve request is not retried: issuing it
/// twice would queue duplicate work on the PACS, and the reconciliation loop
/// cannot make progress without knowing whether the first one was accepted.
pub struct PfdcmClient {
    client: reqwest::Client,
    url: String,
    pacs_name: PacsName,
}

impl PfdcmClient {
    pub fn new(url: String, pacs_name: PacsName) -> Self {
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
            pacs_name,
        }
    }

    /// Ask the PACS (through *pfdcm*) to push the series to *CUBE* again.
    /// Returns *pfdcm*'s response verbatim for the caller to persist.
    pub async fn retrieve(
        &self,
        series: &SeriesDescriptor,
    ) -> Result<serde_json::Value, PfdcmError> {
        let url = format!("{}api/v1/PACS/thread/pypx/", self.url);
        let body = PypxRequest::retrieve(&self.pacs_name, series);
        let res = self
            .client
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(res.json().await?)
    }
}

/// Body of a request to the pypx thread API.
#[derive(Serialize)]
pub(crate) struct PypxRequest<'a> {
    #[serde(rename = "PACSservice")]
    pacs_service: PypxValue<&'a PacsName>,
    #[serde(rename = "listenerService")]
    listener_service: PypxValue<&'static str>,
    #[serde(rename = "PACSdirective")]
    directive: PypxDirective<'a>,
}

#[derive(Serialize)]
struct PypxValue<T> {
    value: T,
}

/// A pypx directive: the series description plus what to do about it.
#[derive(Serialize)]
struct PypxDirective<'a> {
    #[serde(flatten)]
    series: &'a SeriesDescriptor,
    #[serde(rename = "withFeedBack")]
    with_feedback: bool,
    then: &'static str,
    #[serde(rename = "thenArgs")]
    then_args: &'static str,
    json_response: bool,
}

impl<'a> PypxRequest<'a> {
    fn retrieve(pacs_name: &'a PacsName, series: &'a SeriesDescriptor) -> Self {
        Self {
            pacs_service: PypxValue { value: pacs_name },
            listener_service: PypxValue { value: "default" },
            directive: PypxDirective {
                series,
                with_feedback: false,
                then: "retrieve",
                then_args: "",
                json_response: true,
            },
        }
    }
}
