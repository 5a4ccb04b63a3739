//! Normalised snapshots of runtime objects.
//!
//! Records are built fresh for every query and never cached. Enrichment that
//! depends on the host (`proxy_pid`, `virtual_interface`) is filled in by the
//! caller after the record has been normalised from the runtime detail.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::container::{self, ContainerID};
use crate::runtime::{ContainerDetail, ImageDetail, ImageSummary, RuntimeKind};

mod normalize;
mod proxy;

pub use normalize::{
    container_name, first_command_token, listen_port_map, parse_timestamp, split_repo_tag,
};
pub use proxy::{find_proxy_pid, proxy_host_port};

/// How a container is attached to the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum NetworkMode {
    Bridge,
    Host,
    Container { id: String },
    None,
    Default,
    UserDefined { name: String },
}

impl NetworkMode {
    /// Classifies the runtime's raw network mode. The first matching form wins.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "bridge" => NetworkMode::Bridge,
            "host" => NetworkMode::Host,
            _ if raw.starts_with("container:") => NetworkMode::Container {
                id: raw["container:".len()..].to_owned(),
            },
            "none" => NetworkMode::None,
            "default" => NetworkMode::Default,
            _ => NetworkMode::UserDefined {
                name: raw.to_owned(),
            },
        }
    }

    /// Whether the container has a network namespace with its own veth pair.
    pub fn has_own_interface(&self) -> bool {
        !matches!(
            self,
            NetworkMode::Host | NetworkMode::Container { .. } | NetworkMode::None
        )
    }
}

/// Which pid namespace a container runs in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ProcessMode {
    Private,
    Host,
    Container { id: String },
}

impl ProcessMode {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "host" => ProcessMode::Host,
            _ if raw.starts_with("container:") => ProcessMode::Container {
                id: raw["container:".len()..].to_owned(),
            },
            _ => ProcessMode::Private,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerRecord {
    pub kind: RuntimeKind,
    pub name: String,
    pub container_id: ContainerID,
    pub image_id: String,
    /// Host port to container port.
    pub listen_port_map: BTreeMap<u16, u16>,
    pub proxy_pid: Option<u32>,
    pub privileged: bool,
    pub network_mode: NetworkMode,
    pub process_mode: ProcessMode,
    pub volumes: BTreeSet<String>,
    pub virtual_interface: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub cmdline: String,
}

impl ContainerRecord {
    /// Normalises an inspected container.
    ///
    /// # Errors
    ///
    /// Returns [`container::Error::InvalidContainerID`] if the runtime reported
    /// an id that fails validation.
    pub fn from_detail(kind: RuntimeKind, detail: &ContainerDetail) -> container::Result<Self> {
        let container_id = ContainerID::new(&detail.id)?;
        let created_at = parse_timestamp(&detail.created);
        if created_at.is_none() {
            log::warn!(
                "container {container_id}: unusable creation time `{}`",
                detail.created
            );
        }

        Ok(Self {
            kind,
            name: container_name(&detail.name).to_owned(),
            image_id: detail.image.clone(),
            listen_port_map: listen_port_map(&detail.network_settings),
            proxy_pid: None,
            privileged: detail.host_config.privileged,
            network_mode: NetworkMode::parse(&detail.host_config.network_mode),
            process_mode: ProcessMode::parse(&detail.host_config.pid_mode),
            volumes: detail
                .config
                .volumes
                .iter()
                .flat_map(|volumes| volumes.keys().cloned())
                .collect(),
            virtual_interface: None,
            created_at,
            cmdline: first_command_token(detail.config.cmd.as_deref()),
            container_id,
        })
    }

    pub fn host_ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.listen_port_map.keys().copied().filter(|port| *port != 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRecord {
    pub id: String,
    pub name: String,
    pub tag: String,
    pub modified_at: Option<DateTime<Utc>>,
    pub size_bytes: u64,
    pub built_at: Option<DateTime<Utc>>,
}

impl ImageRecord {
    /// Normalises an image summary, with the detail when the runtime provided one.
    pub fn from_summary(summary: &ImageSummary, detail: Option<&ImageDetail>) -> Self {
        let (name, tag) = summary
            .repo_tags
            .as_deref()
            .and_then(<[String]>::first)
            .map(|tag| split_repo_tag(tag))
            .unwrap_or_else(|| ("<none>".to_owned(), "<none>".to_owned()));

        let modified_at = detail
            .and_then(|detail| detail.metadata.as_ref())
            .and_then(|metadata| metadata.last_tag_time.as_deref())
            .and_then(parse_timestamp);

        Self {
            id: summary.id.clone(),
            name,
            tag,
            modified_at,
            size_bytes: summary.size,
            built_at: DateTime::from_timestamp(summary.created, 0).filter(|t| t.timestamp() > 0),
        }
    }
}
