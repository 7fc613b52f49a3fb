// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum CellrunError {
    ConfigMalformed(String),
    SegmentationError(String),
    AnnotationTransient(String),
    AnnotationAuth(String),
    AnnotationRejected(String),
    IoError(String),
    RootError(String),
    AuthError(String),
    ManifestError(String),
    PartitionError(String),
    MaskError(String),
    MaskWriteError(String),
    MetadataError(String),
    NoFileError(String),
    DirError(String),
    OtherError(String),
}

impl CellrunError {
    /// Short machine-readable name written to run summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            CellrunError::ConfigMalformed(_) => "config_malformed",
            CellrunError::SegmentationError(_) => "segmentation_error",
            CellrunError::AnnotationTransient(_) => "annotation_transient",
            CellrunError::AnnotationAuth(_) => "annotation_auth",
            CellrunError::AnnotationRejected(_) => "annotation_rejected",
            CellrunError::IoError(_) => "io_error",
            CellrunError::RootError(_) => "root_error",
            CellrunError::AuthError(_) => "auth_error",
            CellrunError::ManifestError(_) => "manifest_error",
            CellrunError::PartitionError(_) => "partition_error",
            CellrunError::MaskError(_) => "mask_error",
            CellrunError::MaskWriteError(_) => "mask_write_error",
            CellrunError::MetadataError(_) => "metadata_error",
            CellrunError::NoFileError(_) => "no_file_error",
            CellrunError::DirError(_) => "dir_error",
            CellrunError::OtherError(_) => "other_error",
        }
    }
}

impl fmt::Display for CellrunError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CellrunError::ConfigMalformed(message) => {
                write!(
                    f,
                    "[cellrun::ConfigMalformed] Dataset configuration is invalid. {}",
                    message
                )
            }
            CellrunError::SegmentationError(message) => {
                write!(f, "[cellrun::SegmentationError] {}", message)
            }
            CellrunError::AnnotationTransient(message) => {
                write!(
                    f,
                    "[cellrun::AnnotationTransient] Annotation service unavailable. {}",
                    message
                )
            }
            CellrunError::AnnotationAuth(message) => {
                write!(
                    f,
                    "[cellrun::AnnotationAuth] Annotation service rejected the access token. {} Check DEEPCELL_ACCESS_TOKEN and try again.",
                    message
                )
            }
            CellrunError::AnnotationRejected(message) => {
                write!(
                    f,
                    "[cellrun::AnnotationRejected] Annotation service returned an unusable response. {}",
                    message
                )
            }
            CellrunError::IoError(message) => {
                write!(f, "[cellrun::IoError] {}", message)
            }
            CellrunError::RootError(message) => {
                write!(
                    f,
                    "[cellrun::RootError] Root directory is not usable. {}",
                    message
                )
            }
            CellrunError::AuthError(message) => {
                write!(
                    f,
                    "[cellrun::AuthError] No usable access token. {}",
                    message
                )
            }
            CellrunError::ManifestError(message) => {
                write!(f, "[cellrun::ManifestError] {}", message)
            }
            CellrunError::PartitionError(message) => {
                write!(
                    f,
                    "[cellrun::PartitionError] Worker partition must look like <index>/<count>. {}",
                    message
                )
            }
            CellrunError::MaskError(message) => {
                write!(f, "[cellrun::MaskError] Failed to read label mask. {}", message)
            }
            CellrunError::MaskWriteError(message) => {
                write!(
                    f,
                    "[cellrun::MaskWriteError] Failed to write label mask. {}",
                    message
                )
            }
            CellrunError::MetadataError(message) => {
                write!(
                    f,
                    "[cellrun::MetadataError] Image metadata could not be parsed. {}",
                    message
                )
            }
            CellrunError::NoFileError(message) => {
                write!(
                    f,
                    "[cellrun::NoFileError] File could not be found. {}.",
                    message
                )
            }
            CellrunError::DirError(message) => {
                write!(
                    f,
                    "[cellrun::DirError] Directory could not be read. {}.",
                    message
                )
            }
            CellrunError::OtherError(message) => {
                write!(f, "[cellrun::OtherError] Error: {}.", message)
            }
        }
    }
}

impl std::error::Error for CellrunError {}

impl From<std::io::Error> for CellrunError {
    fn from(err: std::io::Error) -> Self {
        CellrunError::IoError(err.to_string())
    }
}
