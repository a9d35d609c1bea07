//! Regiflow settings, which are configurable using environment variables.
use crate::types::{PacsName, PluginInstanceId};
use camino::Utf8PathBuf;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct RegiflowEnvOptions {
    pub cube: CubeSettings,
    pub pfdcm_url: String,
    #[serde(default = "default_pacs_name")]
    pub pacs_name: PacsName,
    /// Plugin instance to schedule the pipeline after. When unset, the
    /// `CHRIS_PREV_PLG_INST_ID` variable of the ChRIS plugin runtime is used.
    #[serde(default)]
    pub previous_id: Option<PluginInstanceId>,
    pub input_dir: Utf8PathBuf,
    pub output_dir: Utf8PathBuf,
    /// Glob matched against file names in `input_dir` to find input batches.
    pub input_json_file: String,
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,
    #[serde(default = "default_max_poll")]
    pub max_poll: u32,
    #[serde(default = "default_http_retries")]
    pub http_retries: u32,
    pub neuro_dicom_location: Utf8PathBuf,
    pub neuro_anon_location: Utf8PathBuf,
    pub neuro_nifti_location: Utf8PathBuf,
    pub folder_name: String,
    #[serde(default)]
    pub recipients: String,
    #[serde(default)]
    pub smtp_server: Option<String>,
}

/// Connection details for the *CUBE* API.
#[derive(Debug, Deserialize)]
pub struct CubeSettings {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

/// Credentials for the *CUBE* API.
#[derive(Debug, Clone)]
pub enum CubeAuth {
    Basic { username: String, password: String },
    Token { token: String },
}

impl CubeSettings {
    /// The configured credentials, preferring basic credentials when both
    /// kinds are set.
    pub fn auth(&self) -> Option<CubeAuth> {
        match (&self.username, &self.password, &self.token) {
            (Some(username), Some(password), _) => Some(CubeAuth::Basic {
                username: username.clone(),
                password: password.clone(),
            }),
            (_, _, Some(token)) => Some(CubeAuth::Token {
                token: token.clone(),
            }),
            _ => None,
        }
    }
}

fn default_pacs_name() -> PacsName {
    PacsName::from("MINICHRISORTHANC")
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_max_poll() -> u32 {
    50
}

fn default_http_retries() -> u32 {
    5
}
