//! Copying single files out of a container's filesystem.
//!
//! The runtime hands out a tar stream for a path. [`Extractor`] spools that
//! stream into an unnamed file inside a fresh scratch directory, unpacks the
//! single entry next to it and returns an [`ExtractedFile`] that owns the
//! directory. Dropping the handle removes the directory again, so nothing
//! extracted outlives the call that needed it.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use crate::container::ContainerID;
use crate::runtime::{ArchiveStream, ContainerRuntime};

mod error;
mod scratch;

pub use error::{Error, Result};
pub use scratch::ExtractedFile;

#[derive(Debug, Clone)]
pub struct Extractor {
    scratch_root: PathBuf,
}

impl Extractor {
    pub fn new(scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            scratch_root: scratch_root.into(),
        }
    }

    pub fn scratch_root(&self) -> &Path {
        &self.scratch_root
    }

    /// Copies the regular file at `path` out of container `id`.
    ///
    /// A symbolic link is followed once, to the target the runtime reports.
    ///
    /// # Errors
    ///
    /// * [`Error::PathIsDirectory`] if `path` (or its link target) is a directory.
    /// * [`Error::Runtime`] if the runtime cannot stat or copy the path.
    /// * any other variant if the scratch directory cannot be prepared or the
    ///   archive cannot be received or unpacked.
    pub async fn extract<R: ContainerRuntime>(
        &self,
        runtime: &R,
        id: &ContainerID,
        path: &str,
    ) -> Result<ExtractedFile> {
        let source = resolve_source(runtime, id, path).await?;
        let (stream, _) = runtime.copy_from_container(id, &source).await?;

        let root = self.scratch_root.clone();
        let owned = path.to_owned();
        let (directory, archive) = blocking(path, move || {
            let directory = scratch::create_scratch_dir(&root)?;
            let archive =
                tempfile::tempfile_in(directory.path()).map_err(|source| Error::Spool {
                    path: owned,
                    source,
                })?;
            Ok((directory, archive))
        })
        .await?;
        let archive = spool(stream, archive, path).await?;

        let owned = path.to_owned();
        let file = blocking(path, move || {
            let relative = unpack(archive, directory.path(), &owned)?;
            Ok(ExtractedFile::new(directory, relative))
        })
        .await?;
        log::debug!(
            "extracted {path} from container {id} to {}",
            file.directory().display()
        );
        Ok(file)
    }
}

/// Runs filesystem work for `path` on the blocking pool.
async fn blocking<T, F>(path: &str, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|source| Error::Task {
            path: path.to_owned(),
            source,
        })?
}

/// Stats `path` and returns the path that actually has to be copied.
async fn resolve_source<R: ContainerRuntime>(
    runtime: &R,
    id: &ContainerID,
    path: &str,
) -> Result<String> {
    let stat = runtime.stat_path(id, path).await?;
    if stat.is_dir() {
        return Err(Error::PathIsDirectory {
            container_id: id.clone(),
            path: path.to_owned(),
        });
    }
    if !stat.is_symlink() {
        return Ok(path.to_owned());
    }

    let target = link_target(path, &stat.link_target);
    log::debug!("container {id}: following {path} -> {target}");
    let stat = runtime.stat_path(id, &target).await?;
    if stat.is_dir() {
        return Err(Error::PathIsDirectory {
            container_id: id.clone(),
            path: target,
        });
    }
    if stat.is_symlink() {
        return Err(Error::SymlinkChain {
            path: path.to_owned(),
            target,
        });
    }
    Ok(target)
}

/// Resolves a relative link target against the directory holding the link.
fn link_target(path: &str, target: &str) -> String {
    if target.starts_with('/') {
        return target.to_owned();
    }
    match path.rsplit_once('/') {
        Some(("", _)) => format!("/{target}"),
        Some((parent, _)) => format!("{parent}/{target}"),
        None => target.to_owned(),
    }
}

/// Writes the whole archive stream to `file` and rewinds it for reading.
async fn spool(
    mut stream: ArchiveStream,
    file: std::fs::File,
    path: &str,
) -> Result<std::fs::File> {
    let spool_err = |source| Error::Spool {
        path: path.to_owned(),
        source,
    };

    let mut file = tokio::fs::File::from_std(file);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| Error::Stream {
            path: path.to_owned(),
            source,
        })?;
        file.write_all(&chunk).await.map_err(spool_err)?;
    }
    file.flush().await.map_err(spool_err)?;
    file.seek(SeekFrom::Start(0)).await.map_err(spool_err)?;
    Ok(file.into_std().await)
}

/// Unpacks the first archive entry into `directory` and returns its relative path.
fn unpack(archive: std::fs::File, directory: &Path, path: &str) -> Result<PathBuf> {
    let unpack_err = |source| Error::Unpack {
        path: path.to_owned(),
        source,
    };

    let mut archive = tar::Archive::new(archive);
    let mut entries = archive.entries().map_err(unpack_err)?;
    let mut entry = entries
        .next()
        .ok_or_else(|| Error::EmptyArchive {
            path: path.to_owned(),
        })?
        .map_err(unpack_err)?;

    let entry_type = entry.header().entry_type();
    if !entry_type.is_file() {
        return Err(Error::NotRegularFile {
            path: path.to_owned(),
            entry_type: format!("{entry_type:?}"),
        });
    }

    let relative = entry.path().map_err(unpack_err)?.into_owned();
    if !entry.unpack_in(directory).map_err(unpack_err)? {
        return Err(Error::UnsafeEntry {
            path: path.to_owned(),
            entry: relative,
        });
    }
    Ok(relative)
}
