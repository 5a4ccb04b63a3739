use std::path::PathBuf;

use crate::container::ContainerID;
use crate::fsutil::FileReadError;
use crate::runtime;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Runtime(#[from] runtime::Error),
    #[error("`{path}` in container `{container_id}` is a directory")]
    PathIsDirectory {
        container_id: ContainerID,
        path: String,
    },
    #[error("`{path}` links to `{target}`, which is itself a link")]
    SymlinkChain { path: String, target: String },
    #[error("failed to create scratch root `{path}`: {source}")]
    ScratchRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create scratch directory in `{root}`: {source}")]
    ScratchDir {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to receive archive of `{path}`: {source}")]
    Stream {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to spool archive of `{path}`: {source}")]
    Spool {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to unpack archive of `{path}`: {source}")]
    Unpack {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("archive of `{path}` is empty")]
    EmptyArchive { path: String },
    #[error("`{path}` is not a regular file ({entry_type})")]
    NotRegularFile { path: String, entry_type: String },
    #[error("archive of `{path}` contains an entry outside the scratch directory: `{}`", .entry.display())]
    UnsafeEntry { path: String, entry: PathBuf },
    #[error(transparent)]
    Read(#[from] FileReadError),
    #[error("blocking work on `{path}` did not complete: {source}")]
    Task {
        path: String,
        #[source]
        source: tokio::task::JoinError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
