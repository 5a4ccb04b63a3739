//! Wire-level shapes of the runtime's container and image inventory.
//!
//! Field names follow the Docker Engine API, which the mock runtime mirrors as
//! well. Only the fields the normalizer reads are modelled; everything else in
//! a response is ignored during deserialization.

use std::collections::HashMap;

use serde::Deserialize;

/// Go's `os.ModeDir` bit, as transported in a path stat's `mode`.
const MODE_DIR: u32 = 1 << 31;
/// Go's `os.ModeSymlink` bit.
const MODE_SYMLINK: u32 = 1 << 27;

/// Entry of the running-container listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerSummary {
    pub id: String,
    pub names: Vec<String>,
    pub image: String,
    pub ports: Vec<Port>,
    pub state: String,
}

/// A port exposed by a listed container.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Port {
    #[serde(rename = "IP")]
    pub ip: Option<String>,
    pub private_port: u16,
    /// Host-facing port, absent when the port is exposed but not published.
    pub public_port: Option<u16>,
    #[serde(rename = "Type")]
    pub protocol: String,
}

/// Full inspection result of a single container.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerDetail {
    pub id: String,
    pub name: String,
    pub image: String,
    pub created: String,
    pub state: ContainerState,
    pub host_config: HostConfig,
    pub config: ContainerConfig,
    pub network_settings: NetworkSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerState {
    pub status: String,
    pub running: bool,
    /// Host pid of the container's main process; `0` when not running.
    pub pid: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HostConfig {
    pub network_mode: String,
    pub pid_mode: String,
    pub privileged: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerConfig {
    pub cmd: Option<Vec<String>>,
    /// Declared volumes; the daemon sends an object whose keys are the paths.
    pub volumes: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NetworkSettings {
    /// Keyed by `"<port>/<proto>"`; `None` for exposed but unpublished ports.
    pub ports: Option<HashMap<String, Option<Vec<PortBinding>>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PortBinding {
    pub host_ip: String,
    pub host_port: String,
}

/// Entry of the image listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImageSummary {
    pub id: String,
    pub repo_tags: Option<Vec<String>>,
    /// Build time as seconds since the unix epoch.
    pub created: i64,
    pub size: u64,
}

/// Full inspection result of a single image.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImageDetail {
    pub id: String,
    pub metadata: Option<ImageMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImageMetadata {
    pub last_tag_time: Option<String>,
}

/// Stat information about a path inside a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PathStat {
    pub name: String,
    pub size: i64,
    pub mode: u32,
    pub mtime: String,
    /// Fully resolved target for symbolic links, empty otherwise.
    pub link_target: String,
}

impl PathStat {
    pub fn is_dir(&self) -> bool {
        self.mode & MODE_DIR != 0
    }

    pub fn is_symlink(&self) -> bool {
        self.mode & MODE_SYMLINK != 0
    }
}
