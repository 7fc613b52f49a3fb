// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::path::{Path, PathBuf};

use crate::error::CellrunError;

/// Collect the immediate subdirectories of a root in lexicographic order
///
/// # Arguments
///
/// * `root` - Directory whose children are listed
///
/// # Examples
///
/// ```no_run
/// use cellrun_core::ut::path::collect_subdirectories;
/// let datasets = collect_subdirectories("input-data/").unwrap();
/// ```
pub fn collect_subdirectories<P: AsRef<Path>>(root: P) -> Result<Vec<PathBuf>, CellrunError> {
    let root = root.as_ref();

    let mut directories: Vec<PathBuf> = std::fs::read_dir(root)
        .map_err(|err| CellrunError::DirError(format!("{}: {}", root.display(), err)))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();

    directories.sort();

    Ok(directories)
}

/// Collect file paths from a directory with an optional substring filter
///
/// Returned paths are sorted so callers that pick the first match behave
/// the same on every run.
///
/// # Arguments
///
/// * `directory` - Path to directory containing files
/// * `valid_ext` - Accepted (lowercase) file extensions
/// * `substring` - Only include files containing this substring
///
/// # Examples
///
/// ```no_run
/// use cellrun_core::ut::path::collect_file_paths;
/// use cellrun_core::constant::SUPPORTED_IMAGE_FORMATS;
/// let files = collect_file_paths("directory/", SUPPORTED_IMAGE_FORMATS.as_slice(), None);
/// ```
pub fn collect_file_paths<P: AsRef<Path>>(
    directory: P,
    valid_ext: &[&str],
    substring: Option<&str>,
) -> Result<Vec<PathBuf>, CellrunError> {
    let directory = directory.as_ref();

    let mut files: Vec<PathBuf> = std::fs::read_dir(directory)
        .map_err(|err| CellrunError::DirError(format!("{}: {}", directory.display(), err)))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| valid_ext.contains(&ext.to_lowercase().as_str()))
        })
        .collect();

    if let Some(substring) = substring {
        files.retain(|f| {
            f.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.contains(substring))
        });
    }

    files.sort();

    Ok(files)
}

/// Normalise a HuBMAP identifier into a directory-safe dataset identifier
///
/// Raw transfer directories are named `<hubmap id>-<suffix>`; the dataset
/// identifier is the part before the first dash with dots removed.
///
/// # Examples
///
/// ```
/// use cellrun_core::ut::path::normalize_dataset_id;
///
/// assert_eq!(normalize_dataset_id("HBM279.TQRS.775-b3d9"), "HBM279TQRS775");
/// assert_eq!(normalize_dataset_id("HBM279.TQRS.775"), "HBM279TQRS775");
/// ```
pub fn normalize_dataset_id(name: &str) -> String {
    name.split('-').next().unwrap_or(name).replace('.', "")
}

/// Temporary sibling path used while an artifact is being written
pub fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();

    path.with_file_name(format!(".{}{}", name, crate::constant::PARTIAL_SUFFIX))
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_collect_subdirectories_sorted() {
        let root = tempfile::tempdir().unwrap();
        for name in ["c", "a", "b"] {
            std::fs::create_dir(root.path().join(name)).unwrap();
        }
        std::fs::write(root.path().join("file.txt"), "x").unwrap();

        let dirs = collect_subdirectories(root.path()).unwrap();
        let names: Vec<String> = dirs
            .iter()
            .map(|d| d.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_collect_subdirectories_missing_root() {
        let result = collect_subdirectories("DOES_NOT_EXIST_CELLRUN_ROOT");
        assert!(matches!(result, Err(CellrunError::DirError(_))));
    }

    #[test]
    fn test_collect_file_paths_extension_case() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("b.OME.TIFF"), "x").unwrap();
        std::fs::write(root.path().join("a.tif"), "x").unwrap();
        std::fs::write(root.path().join("notes.txt"), "x").unwrap();

        let files = collect_file_paths(root.path(), &["tif", "tiff"], None).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a.tif"));

        let files = collect_file_paths(root.path(), &["tif", "tiff"], Some("OME")).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_partial_path() {
        let path = Path::new("/out/HBM1/HBM1_segmented.tiff");
        assert_eq!(
            partial_path(path),
            PathBuf::from("/out/HBM1/.HBM1_segmented.tiff.partial")
        );
    }
}
