//! The per-series dispatch path: copy the registered files into a new feed,
//! then schedule the anonymization pipeline on the copy.
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde_json::json;

use crate::cube_client::{CubeClient, PluginSearch};
use crate::error::CubeError;
use crate::pipeline::{run_pipeline, StageOverrides};
use crate::series::SeriesDescriptor;
use crate::types::{DicomDir, PluginInstanceId};

/// The plugin which copies the series' files out of PACS storage into a feed.
const DSDIRCOPY: PluginSearch<'static> = PluginSearch {
    name: "pl-dsdircopy",
    version: "1.0.2",
};

/// Pipeline applied to every registered series.
const ANONYMIZATION_PIPELINE: &str =
    "DICOM anonymization, niftii conversion, and push to neuro tree v20250326";

pub(crate) const STAGE_DICOM_PUSH: &str = "send-dicoms-to-neuro-FS";
pub(crate) const STAGE_ANON_PUSH: &str = "send-anon-dicoms-to-neuro-FS";
pub(crate) const STAGE_NIFTI_PUSH: &str = "send-niftii-to-neuro-FS";

/// Destinations on the neuro tree for the pipeline's push stages.
#[derive(Debug, Clone)]
pub(crate) struct SendParams {
    pub dicom_location: Utf8PathBuf,
    pub anon_location: Utf8PathBuf,
    pub nifti_location: Utf8PathBuf,
    pub folder_name: String,
}

#[derive(thiserror::Error, Debug)]
pub(crate) enum DispatchError {
    #[error("no registered file of SeriesInstanceUID={uid} is visible in CUBE")]
    NoFilesFound { uid: String },

    #[error("registered file of SeriesInstanceUID={uid} has no parent folder")]
    EmptyDicomDir { uid: String },

    #[error(transparent)]
    Cube(#[from] CubeError),
}

/// Copy the series' registered files into a new feed and schedule the
/// anonymization pipeline on the copy.
pub(crate) async fn dispatch_series(
    cube: &CubeClient,
    send: &SendParams,
    previous: PluginInstanceId,
    series: &SeriesDescriptor,
) -> Result<(), DispatchError> {
    let uid = &series.SeriesInstanceUID;
    let dir = cube
        .files_dir_of(uid)
        .await?
        .ok_or_else(|| DispatchError::NoFilesFound { uid: uid.clone() })?;
    if dir.as_str().is_empty() {
        return Err(DispatchError::EmptyDicomDir { uid: uid.clone() });
    }
    let dircopy = cube.resolve_plugin(&DSDIRCOPY).await?;
    let params = DircopyParams {
        previous_id: previous,
        dir: &dir,
    };
    let instance = cube.create_plugin_instance(dircopy, &params).await?;
    tracing::info!(
        SeriesInstanceUID = uid.as_str(),
        dir = dir.as_str(),
        plugin_instance_id = instance.0,
        "dircopy instance created"
    );
    let overrides = stage_overrides(send);
    run_pipeline(cube, instance, ANONYMIZATION_PIPELINE, &overrides).await?;
    Ok(())
}

/// Parameters of a dircopy plugin instance.
#[derive(Serialize)]
struct DircopyParams<'a> {
    previous_id: PluginInstanceId,
    dir: &'a DicomDir,
}

fn stage_overrides(send: &SendParams) -> StageOverrides {
    StageOverrides::from([
        (
            STAGE_DICOM_PUSH,
            push_stage_params(&send.dicom_location, &send.folder_name, "*.dcm"),
        ),
        (
            STAGE_ANON_PUSH,
            push_stage_params(&send.anon_location, &send.folder_name, "*.dcm"),
        ),
        (
            STAGE_NIFTI_PUSH,
            push_stage_params(&send.nifti_location, &send.folder_name, "*"),
        ),
    ])
}

/// Parameters for one push stage. Values are strings because that is how the
/// push plugin declares its parameters.
fn push_stage_params(location: &Utf8Path, folder_name: &str, include: &str) -> serde_json::Value {
    json!({
        "path": format!("{location}/{folder_name}/"),
        "include": include,
        "min_size": "0",
        "timeout": "0",
        "max_size": "1G",
        "max_depth": "3",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn example_send_params() -> SendParams {
        SendParams {
            dicom_location: Utf8PathBuf::from("/neuro/labs/grantlab/research/dicoms"),
            anon_location: Utf8PathBuf::from("/neuro/labs/grantlab/research/anon"),
            nifti_location: Utf8PathBuf::from("/neuro/labs/grantlab/research/nifti"),
            folder_name: "BCH-20130308".to_string(),
        }
    }

    #[test]
    fn test_every_stage_pushes_into_the_named_folder() {
        let overrides = stage_overrides(&example_send_params());
        assert_eq!(overrides.len(), 3);
        for (stage, location) in [
            (STAGE_DICOM_PUSH, "/neuro/labs/grantlab/research/dicoms"),
            (STAGE_ANON_PUSH, "/neuro/labs/grantlab/research/anon"),
            (STAGE_NIFTI_PUSH, "/neuro/labs/grantlab/research/nifti"),
        ] {
            let path = overrides[stage]["path"].as_str().unwrap();
            assert_eq!(path, format!("{location}/BCH-20130308/"));
        }
    }

    #[test]
    fn test_include_patterns() {
        let overrides = stage_overrides(&example_send_params());
        assert_eq!(overrides[STAGE_DICOM_PUSH]["include"], "*.dcm");
        assert_eq!(overrides[STAGE_ANON_PUSH]["include"], "*.dcm");
        assert_eq!(overrides[STAGE_NIFTI_PUSH]["include"], "*");
        for stage in [STAGE_DICOM_PUSH, STAGE_ANON_PUSH, STAGE_NIFTI_PUSH] {
            assert_eq!(overrides[stage]["max_size"], "1G");
            assert_eq!(overrides[stage]["max_depth"], "3");
        }
    }

    #[test]
    fn test_dircopy_params_shape() {
        let dir = DicomDir::from("SERVICES/PACS/org/1449c1d-anon-20130308/brain_crop");
        let params = DircopyParams {
            previous_id: PluginInstanceId(12),
            dir: &dir,
        };
        let actual = serde_json::to_value(&params).unwrap();
        let expected = json!({
            "previous_id": 12,
            "dir": "SERVICES/PACS/org/1449c1d-anon-20130308/brain_crop"
        });
        assert_eq!(actual, expected);
    }
}
