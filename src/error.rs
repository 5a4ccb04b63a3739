use std::fmt;

use crate::container::{self, ContainerID};
use crate::{extract, netns, passwd, runtime};

/// The object a failed lookup was looking for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Container(String),
    Image(String),
    Path(String),
    Uid(u32),
    Process(u32),
    Port(u16),
    Interface(String),
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Container(id) => write!(f, "container `{id}`"),
            Lookup::Image(id) => write!(f, "image `{id}`"),
            Lookup::Path(path) => write!(f, "path `{path}`"),
            Lookup::Uid(uid) => write!(f, "passwd entry for uid {uid}"),
            Lookup::Process(pid) => write!(f, "container owning process {pid}"),
            Lookup::Port(port) => write!(f, "container publishing port {port}"),
            Lookup::Interface(name) => write!(f, "container behind interface `{name}`"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("container runtime is unavailable: {0}")]
    RuntimeUnavailable(#[source] runtime::Error),
    #[error("{0} not found")]
    NotFound(Lookup),
    #[error("container inspection failed: {0}")]
    InspectionFailed(#[source] runtime::Error),
    #[error("`{path}` in container `{container_id}` is a directory")]
    PathIsDirectory {
        container_id: ContainerID,
        path: String,
    },
    #[error("uid {uid} matches {matches} passwd entries")]
    AmbiguousMatch { uid: u32, matches: usize },
    #[error("failed to resolve network namespace of container `{container_id}`: {source}")]
    NamespaceResolutionFailed {
        container_id: ContainerID,
        #[source]
        source: netns::Error,
    },
    #[error("extraction failed: {0}")]
    Extraction(#[source] extract::Error),
    #[error("passwd lookup failed: {0}")]
    Passwd(#[source] passwd::Error),
    #[error(transparent)]
    InvalidIdentifier(#[from] container::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Classifies a runtime failure that happened while scanning the inventory.
    ///
    /// Only an unreachable daemon keeps its identity. Everything else, a
    /// container vanishing between list and inspect included, aborts the scan.
    pub(crate) fn scan(err: runtime::Error) -> Self {
        if err.is_unavailable() {
            Error::RuntimeUnavailable(err)
        } else {
            Error::InspectionFailed(err)
        }
    }
}

impl From<runtime::Error> for Error {
    fn from(err: runtime::Error) -> Self {
        match err {
            runtime::Error::Unavailable { .. } => Error::RuntimeUnavailable(err),
            runtime::Error::NotFound { kind, id } => Error::NotFound(match kind {
                runtime::ObjectKind::Container => Lookup::Container(id),
                runtime::ObjectKind::Image => Lookup::Image(id),
                runtime::ObjectKind::Path => Lookup::Path(id),
            }),
            other => Error::InspectionFailed(other),
        }
    }
}

impl From<extract::Error> for Error {
    fn from(err: extract::Error) -> Self {
        match err {
            extract::Error::Runtime(err) => err.into(),
            extract::Error::PathIsDirectory { container_id, path } => {
                Error::PathIsDirectory { container_id, path }
            }
            other => Error::Extraction(other),
        }
    }
}

impl From<passwd::Error> for Error {
    fn from(err: passwd::Error) -> Self {
        match err {
            passwd::Error::UidNotFound(uid) => Error::NotFound(Lookup::Uid(uid)),
            passwd::Error::Ambiguous { uid, matches } => Error::AmbiguousMatch { uid, matches },
            other => Error::Passwd(other),
        }
    }
}

pub trait ResultOkLogExt<T, E> {
    fn ok_log(self) -> Option<T>;
}

impl<T, E> ResultOkLogExt<T, E> for std::result::Result<T, E>
where
    E: std::error::Error,
{
    fn ok_log(self) -> Option<T> {
        match self {
            Ok(ok) => Some(ok),
            Err(err) => {
                log::error!("{err}");
                None
            }
        }
    }
}
