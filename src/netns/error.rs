use std::path::PathBuf;
use std::process::ExitStatus;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to create namespace directory `{path}`: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to bind namespace `{target}` to `{link}`: {source}")]
    Bind {
        link: PathBuf,
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("required tool `{tool}` is not installed: {source}")]
    ToolMissing {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("`{command}` produced no output")]
    EmptyOutput { command: String },
    #[error("no link index found for interface `{iface}` in namespace `{label}`")]
    IndexNotFound { label: String, iface: String },
    #[error("no host interface found at index {index}")]
    InterfaceNotFound { index: u32 },
}

pub type Result<T> = std::result::Result<T, Error>;
