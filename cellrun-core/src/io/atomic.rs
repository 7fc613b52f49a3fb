// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::CellrunError;
use crate::ut::path::partial_path;

/// Write an artifact through a temporary sibling and rename it into place
///
/// The writer receives a handle to `.<name>.partial` in the destination
/// directory. Only when it returns `Ok` is the file flushed, synced and
/// renamed onto `path`; on error the partial file is removed and nothing
/// appears at `path`. If the process dies mid-write, at most the partial
/// file remains.
///
/// # Arguments
///
/// * `path` - Final artifact path
/// * `write` - Closure that fills the temporary file
///
/// # Examples
///
/// ```no_run
/// use std::io::Write;
/// use cellrun_core::io::write_atomic;
///
/// write_atomic("summary.json", |file| {
///     file.write_all(b"{}")?;
///     Ok(())
/// })
/// .unwrap();
/// ```
pub fn write_atomic<P, F>(path: P, write: F) -> Result<(), CellrunError>
where
    P: AsRef<Path>,
    F: FnOnce(&mut File) -> Result<(), CellrunError>,
{
    let path = path.as_ref();
    let partial = partial_path(path);

    let mut file = File::create(&partial).map_err(|err| {
        CellrunError::IoError(format!("Failed to create {}: {}", partial.display(), err))
    })?;

    let written = write(&mut file).and_then(|_| {
        file.flush()?;
        file.sync_all()?;
        Ok(())
    });

    drop(file);

    if let Err(err) = written {
        let _ = std::fs::remove_file(&partial);
        return Err(err);
    }

    std::fs::rename(&partial, path).map_err(|err| {
        let _ = std::fs::remove_file(&partial);
        CellrunError::IoError(format!("Failed to move {} into place: {}", path.display(), err))
    })
}

/// Atomically write a byte buffer
pub fn write_bytes_atomic<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<(), CellrunError> {
    write_atomic(path, |file| {
        file.write_all(bytes)?;
        Ok(())
    })
}

/// Atomically copy a file
pub fn copy_atomic<P: AsRef<Path>, Q: AsRef<Path>>(from: P, to: Q) -> Result<u64, CellrunError> {
    let mut source = File::open(from.as_ref()).map_err(|err| {
        CellrunError::NoFileError(format!("{}: {}", from.as_ref().display(), err))
    })?;

    let mut copied = 0u64;
    write_atomic(to, |file| {
        copied = std::io::copy(&mut source, file)?;
        Ok(())
    })?;

    Ok(copied)
}
