use aliri_braid::braid;
use serde::{Deserialize, Serialize};

/// Name of a PACS service as configured in *pfdcm*.
#[braid(serde)]
pub struct PacsName;

/// Path in *CUBE* storage to a registered PACS file.
#[braid(serde)]
pub(crate) struct PacsFilePath;

/// Path in *CUBE* storage to the folder containing a series' files.
#[braid(serde)]
pub struct DicomDir;

impl From<PacsFilePath> for DicomDir {
    fn from(path: PacsFilePath) -> Self {
        path.as_str()
            .rsplit_once('/')
            .map(|(dir, _fname)| dir)
            .map(Self::from)
            .unwrap_or_else(|| Self::from(""))
    }
}

/// Identifier of a plugin registered in *CUBE*.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginId(pub u32);

/// Identifier of a plugin instance in *CUBE*.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginInstanceId(pub u32);

/// Identifier of a pipeline registered in *CUBE*.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineId(pub u32);

impl std::fmt::Display for PluginId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for PluginInstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for PipelineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
