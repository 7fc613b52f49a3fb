// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::CellrunError;
use crate::ut::path::normalize_dataset_id;

/// One `<dataset id> /<path>` line of a transfer manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub dataset_id: String,
    pub path: String,
}

/// Transfer manifest listing the files delivered for each dataset
///
/// The transfer tool accepts no comment lines and no blank lines, so both
/// are rejected here rather than tolerated. A single trailing newline is
/// allowed.
///
/// # Examples
///
/// ```
/// use cellrun_core::ds::Manifest;
///
/// let manifest = Manifest::parse(
///     "HBM279.TQRS.775 /pipeline_output/expr/reg001_expr.ome.tiff\n\
///      HBM279.TQRS.775 /pipelineConfig.json\n",
/// )
/// .unwrap();
///
/// assert_eq!(manifest.len(), 2);
/// assert!(manifest.dataset_ids().contains("HBM279TQRS775"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Manifest, CellrunError> {
        let path = path.as_ref();

        let text = std::fs::read_to_string(path).map_err(|err| {
            CellrunError::ManifestError(format!("{} could not be read: {}", path.display(), err))
        })?;

        Self::parse(&text).map_err(|err| match err {
            CellrunError::ManifestError(message) => {
                CellrunError::ManifestError(format!("{}: {}", path.display(), message))
            }
            other => other,
        })
    }

    pub fn parse(text: &str) -> Result<Manifest, CellrunError> {
        let body = text.strip_suffix('\n').unwrap_or(text);
        let body = body.strip_suffix('\r').unwrap_or(body);

        if body.is_empty() {
            return Err(CellrunError::ManifestError(
                "Manifest contains no entries".to_string(),
            ));
        }

        let mut entries = Vec::new();

        for (i, line) in body.lines().enumerate() {
            let line_number = i + 1;

            if line.trim().is_empty() {
                return Err(CellrunError::ManifestError(format!(
                    "Line {} is blank",
                    line_number
                )));
            }

            if line.trim_start().starts_with('#') {
                return Err(CellrunError::ManifestError(format!(
                    "Line {} is a comment, which the transfer tool does not accept",
                    line_number
                )));
            }

            let fields: Vec<&str> = line.split_whitespace().collect();

            let [dataset_id, path] = fields.as_slice() else {
                return Err(CellrunError::ManifestError(format!(
                    "Line {} has {} fields, expected `<dataset id> /<path>`",
                    line_number,
                    fields.len()
                )));
            };

            if !path.starts_with('/') {
                return Err(CellrunError::ManifestError(format!(
                    "Line {} path {} must start with '/'",
                    line_number, path
                )));
            }

            entries.push(ManifestEntry {
                dataset_id: dataset_id.to_string(),
                path: path.to_string(),
            });
        }

        Ok(Manifest { entries })
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct dataset identifiers, normalised the way input directories are named
    pub fn dataset_ids(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .map(|entry| normalize_dataset_id(&entry.dataset_id))
            .collect()
    }
}

#[cfg(test)]
mod test {

    use super::*;

    const MANIFEST: &str = "HBM279.TQRS.775 /pipeline_output/expr/reg001_expr.ome.tiff\n\
                            HBM279.TQRS.775 /pipelineConfig.json\n\
                            HBM342.FSLD.938 /stitched/expressions/reg1_stitched_expressions.ome.tiff\n\
                            HBM342.FSLD.938 /pipelineConfig.json";

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::parse(MANIFEST).unwrap();

        assert_eq!(manifest.len(), 4);
        assert_eq!(manifest.entries()[1].path, "/pipelineConfig.json");

        let ids: Vec<String> = manifest.dataset_ids().into_iter().collect();
        assert_eq!(ids, vec!["HBM279TQRS775", "HBM342FSLD938"]);
    }

    #[test]
    fn test_parse_trailing_newline() {
        let text = format!("{}\n", MANIFEST);
        assert_eq!(Manifest::parse(&text).unwrap().len(), 4);
    }

    #[test]
    fn test_parse_rejects_comment() {
        let text = format!("# spleen\n{}", MANIFEST);
        assert!(Manifest::parse(&text).is_err());
    }

    #[test]
    fn test_parse_rejects_blank_line() {
        let text = MANIFEST.replacen('\n', "\n\n", 1);
        assert!(Manifest::parse(&text).is_err());

        let text = format!("{}\n\n", MANIFEST);
        assert!(Manifest::parse(&text).is_err());
    }

    #[test]
    fn test_parse_rejects_bad_fields() {
        assert!(Manifest::parse("HBM279.TQRS.775\n").is_err());
        assert!(Manifest::parse("HBM279.TQRS.775 /a /b\n").is_err());
        assert!(Manifest::parse("HBM279.TQRS.775 relative/path\n").is_err());
        assert!(Manifest::parse("").is_err());
    }

    #[test]
    fn test_open_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest_spleen.txt");
        std::fs::write(&path, MANIFEST).unwrap();

        assert_eq!(Manifest::open(&path).unwrap().len(), 4);
        assert!(matches!(
            Manifest::open(dir.path().join("missing.txt")),
            Err(CellrunError::ManifestError(_))
        ));
    }
}
