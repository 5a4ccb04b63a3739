//! Process configuration, read once from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::runtime::default_socket_path;

const DOCKER_HOST: &str = "DOCKER_HOST";
const NETNS_ROOT: &str = "NETNS_ROOT";
const PROC_ROOT: &str = "PROC_ROOT";
const SCRATCH_ROOT: &str = "SCRATCH_ROOT";
const API_LISTEN_ADDR: &str = "API_LISTEN_ADDR";

const UNIX_SCHEME: &str = "unix://";
const SCRATCH_DIR_NAME: &str = "container-identity";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("`{var}` must use the `unix://` scheme, got `{value}`")]
    UnsupportedDockerHost { var: &'static str, value: String },
    #[error("`{var}` is not a valid socket address: `{value}`")]
    InvalidListenAddr {
        var: &'static str,
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("`{var}` is not valid unicode")]
    NotUnicode { var: &'static str },
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub docker_socket: PathBuf,
    pub netns_root: PathBuf,
    pub proc_root: PathBuf,
    pub scratch_root: PathBuf,
    pub listen_addr: SocketAddr,
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var_os(var))
    }

    /// Reads the configuration through `lookup`, which maps a variable name to
    /// its value if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<std::ffi::OsString>,
    {
        let path_or = |var: &str, default: PathBuf| {
            lookup(var)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
                .unwrap_or(default)
        };

        let docker_socket = match lookup(DOCKER_HOST).filter(|value| !value.is_empty()) {
            None => default_socket_path(),
            Some(value) => {
                let value = value
                    .into_string()
                    .map_err(|_| Error::NotUnicode { var: DOCKER_HOST })?;
                match value.strip_prefix(UNIX_SCHEME) {
                    Some(path) => PathBuf::from(path),
                    None => {
                        return Err(Error::UnsupportedDockerHost {
                            var: DOCKER_HOST,
                            value,
                        });
                    }
                }
            }
        };

        let listen_addr = match lookup(API_LISTEN_ADDR).filter(|value| !value.is_empty()) {
            None => SocketAddr::from(([0, 0, 0, 0], 3000)),
            Some(value) => {
                let value = value
                    .into_string()
                    .map_err(|_| Error::NotUnicode { var: API_LISTEN_ADDR })?;
                value.parse().map_err(|source| Error::InvalidListenAddr {
                    var: API_LISTEN_ADDR,
                    value,
                    source,
                })?
            }
        };

        Ok(Self {
            docker_socket,
            netns_root: path_or(NETNS_ROOT, PathBuf::from("/var/run/netns")),
            proc_root: path_or(PROC_ROOT, PathBuf::from("/proc")),
            scratch_root: path_or(SCRATCH_ROOT, std::env::temp_dir().join(SCRATCH_DIR_NAME)),
            listen_addr,
        })
    }
}
