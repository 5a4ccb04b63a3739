use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// Error that occurs when opening a file fails.
#[derive(Debug, thiserror::Error)]
#[error("failed to open file `{path}`: {source}")]
pub struct FileOpenError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Error that occurs when opening or reading a file fails.
#[derive(Debug, thiserror::Error)]
pub enum FileReadError {
    #[error(transparent)]
    Open(#[from] FileOpenError),
    #[error("failed to read file `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Opens a file at the given path and wraps it in a [`BufReader`].
///
/// # Errors
///
/// Returns a [`FileOpenError`] if the file cannot be opened.
///
/// # Example
/// ```no_run
/// # use container_identity::fsutil;
/// let reader = fsutil::open_file_reader("/some/file.txt")?;
/// # Ok::<(), fsutil::FileOpenError>(())
/// ```
pub fn open_file_reader(path: impl AsRef<Path>) -> Result<BufReader<File>, FileOpenError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| FileOpenError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}

/// Reads a whole file into a string, replacing invalid UTF-8 sequences.
///
/// System tables copied out of containers are not guaranteed to be valid UTF-8,
/// and a single bad byte in an unrelated line must not make them unreadable.
///
/// # Errors
///
/// Returns a [`FileReadError`] if the file cannot be opened or read.
pub fn read_to_string_lossy(path: impl AsRef<Path>) -> Result<String, FileReadError> {
    let path = path.as_ref();
    let mut reader = open_file_reader(path)?;
    let mut buf = Vec::new();
    reader
        .read_to_end(&mut buf)
        .map_err(|source| FileReadError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(String::from_utf8_lossy(&buf).into_owned())
}
