#![allow(non_snake_case)]

use serde::{Deserialize, Serialize};

/// Description of a DICOM series whose registration is awaited, one element
/// of the input JSON array produced by an upstream PACS query.
///
/// Field names are the DICOM keywords *pfdcm* and *CUBE* use. All fields are
/// required: a descriptor missing any of them cannot be reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesDescriptor {
    pub SeriesInstanceUID: String,
    pub StudyInstanceUID: String,
    pub AccessionNumber: String,
    pub PatientID: String,
    pub StudyDate: String,
    pub Modality: String,
    pub NumberOfSeriesRelatedInstances: u32,
}

#[cfg(test)]
pub(crate) fn example_series() -> SeriesDescriptor {
    SeriesDescriptor {
        SeriesInstanceUID: "1.3.12.2.1107.5.2.19.45152.2013030808110258929186035.0.0.0"
            .to_string(),
        StudyInstanceUID: "1.2.840.113845.11.1000000001785349915.20130308061609.6346698"
            .to_string(),
        AccessionNumber: "22681485".to_string(),
        PatientID: "1449c1d".to_string(),
        StudyDate: "20130308".to_string(),
        Modality: "MR".to_string(),
        NumberOfSeriesRelatedInstances: 192,
    }
}
