// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::fmt;
use std::path::{Path, PathBuf};

use crate::ds::{Channel, GuardedDataset};
use crate::error::CellrunError;
use crate::im::LabelMask;
use crate::mp::MorphologyTable;

/// Everything the segmentation collaborator receives for one dataset
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationRequest {
    pub dataset_id: String,
    pub image_path: PathBuf,
    pub nucleus: Channel,
    pub membrane: Option<Channel>,
    pub use_wsi: bool,
    pub mpp: Option<f64>,
    pub scratch_dir: PathBuf,
}

impl SegmentationRequest {
    pub fn new(dataset_id: &str, dataset: &GuardedDataset, scratch_dir: &Path) -> Self {
        SegmentationRequest {
            dataset_id: dataset_id.to_string(),
            image_path: dataset.image_path.clone(),
            nucleus: dataset.nucleus.clone(),
            membrane: dataset.membrane.clone(),
            use_wsi: dataset.config.use_wsi,
            mpp: dataset.config.mpp,
            scratch_dir: scratch_dir.to_path_buf(),
        }
    }
}

/// A label mask and the morphology of each of its objects
#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    pub mask: LabelMask,
    pub morphology: MorphologyTable,
}

impl Segmentation {
    /// Measure a mask produced by a collaborator that only returns labels
    pub fn from_mask(mask: LabelMask) -> Segmentation {
        let morphology = MorphologyTable::measure(&mask);
        Segmentation { mask, morphology }
    }
}

/// Failure reported by a segmentation collaborator
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentationError {
    /// The model could not be run (spawn failure, crash, out of memory)
    Command(String),
    /// The model ran but its output could not be used
    Output(String),
}

impl fmt::Display for SegmentationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SegmentationError::Command(message) => write!(f, "Segmentation failed. {}", message),
            SegmentationError::Output(message) => {
                write!(f, "Segmentation output is unusable. {}", message)
            }
        }
    }
}

impl std::error::Error for SegmentationError {}

impl From<SegmentationError> for CellrunError {
    fn from(err: SegmentationError) -> Self {
        CellrunError::SegmentationError(err.to_string())
    }
}

/// Boundary to the external segmentation model
pub trait Segmenter {
    fn segment(&mut self, request: &SegmentationRequest) -> Result<Segmentation, SegmentationError>;
}
