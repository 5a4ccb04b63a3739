use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::error::{Error, Result};

const SCRATCH_PREFIX: &str = "extract-";

/// A file copied out of a container into its own scratch directory.
///
/// The scratch directory and everything in it are removed when the handle is
/// dropped, whichever way the caller leaves its scope.
#[derive(Debug)]
pub struct ExtractedFile {
    directory: TempDir,
    relative: PathBuf,
}

impl ExtractedFile {
    pub(super) fn new(directory: TempDir, relative: PathBuf) -> Self {
        Self {
            directory,
            relative,
        }
    }

    /// The scratch directory owned by this handle.
    pub fn directory(&self) -> &Path {
        self.directory.path()
    }

    pub fn file_name(&self) -> &str {
        self.relative
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }

    /// Absolute path of the extracted file.
    pub fn path(&self) -> PathBuf {
        self.directory.path().join(&self.relative)
    }
}

/// Creates a uniquely named scratch directory below `root`, creating `root`
/// itself on demand.
pub(super) fn create_scratch_dir(root: &Path) -> Result<TempDir> {
    std::fs::create_dir_all(root).map_err(|source| Error::ScratchRoot {
        path: root.to_path_buf(),
        source,
    })?;

    tempfile::Builder::new()
        .prefix(SCRATCH_PREFIX)
        .tempdir_in(root)
        .map_err(|source| Error::ScratchDir {
            root: root.to_path_buf(),
            source,
        })
}
