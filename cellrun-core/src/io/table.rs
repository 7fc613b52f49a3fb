// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use std::path::Path;

use polars::prelude::*;

use crate::error::CellrunError;
use crate::io::atomic::write_atomic;

/// Write a table to a CSV file
///
/// The file is produced through [`write_atomic`], so a failed write never
/// leaves a truncated table at `path`.
///
/// # Arguments
///
/// * `df` - A DataFrame
/// * `path` - Output file path
/// * `header` - A boolean indicating whether the output file should contain a header
///
/// # Examples
///
/// ```no_run
/// use polars::prelude::*;
/// use cellrun_core::io::write_table_csv;
///
/// let column = vec![Column::new("area".into(), [2.5, 3.1, 3.4])];
/// let mut df: DataFrame = DataFrame::new(column).unwrap();
///
/// write_table_csv(&mut df, "output.csv", true).unwrap()
/// ```
pub fn write_table_csv<P: AsRef<Path>>(
    df: &mut DataFrame,
    path: P,
    header: bool,
) -> Result<(), CellrunError> {
    let display = path.as_ref().display().to_string();

    write_atomic(path, |output| {
        CsvWriter::new(output)
            .include_header(header)
            .finish(df)
            .map_err(|err| {
                CellrunError::IoError(format!("Failed to write CSV file {}: {}", display, err))
            })
    })
}

#[cfg(test)]
mod test {

    use super::*;

    fn table() -> DataFrame {
        DataFrame::new(vec![
            Column::new("object_id".into(), [1u32, 2u32]),
            Column::new("area".into(), [4u32, 9u32]),
        ])
        .unwrap()
    }

    #[test]
    fn test_write_table_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.csv");

        write_table_csv(&mut table(), &path, true).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "object_id,area\n1,4\n2,9\n");
    }

    #[test]
    fn test_write_table_csv_no_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.csv");

        write_table_csv(&mut table(), &path, false).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "1,4\n2,9\n");
    }

    #[test]
    fn test_write_table_csv_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("table.csv");

        assert!(write_table_csv(&mut table(), &path, true).is_err());
        assert!(!path.exists());
    }
}
