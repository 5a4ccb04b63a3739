use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("container runtime socket `{path}` is unreachable: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP exchange for `{endpoint}` failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: hyper::Error,
    },
    #[error("failed to build request for `{endpoint}`: {source}")]
    Request {
        endpoint: String,
        #[source]
        source: hyper::http::Error,
    },
    #[error("{kind} `{id}` not found")]
    NotFound { kind: ObjectKind, id: String },
    #[error("runtime returned status {status} for `{endpoint}`: {message}")]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },
    #[error("failed to decode response of `{endpoint}`: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("missing or malformed path stat for `{path}`")]
    PathStat { path: String },
}

impl Error {
    /// Whether the daemon itself could not be reached.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::Unavailable { .. })
    }
}

/// The kind of runtime object a lookup referred to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Container,
    Image,
    Path,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ObjectKind::Container => "container",
            ObjectKind::Image => "image",
            ObjectKind::Path => "path",
        };
        write!(f, "{name}")
    }
}

pub type Result<T> = std::result::Result<T, Error>;
