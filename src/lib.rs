mod anonymize;
mod collection;
mod config;
mod cube_client;
mod error;
mod input;
mod pfdcm;
mod pipeline;
mod reconciler;
mod retry_table;
mod run_everything;
mod series;
mod settings;
mod types;

pub use cube_client::{CubeClient, PluginSearch};
pub use error::CubeError;
pub use input::InputError;
pub use pfdcm::{PfdcmClient, PfdcmError};
pub use run_everything::{run_everything, run_everything_from_env};
pub use series::SeriesDescriptor;
pub use settings::{CubeAuth, CubeSettings, RegiflowEnvOptions};
pub use types::{DicomDir, PacsName, PipelineId, PluginId, PluginInstanceId};
