//! In-memory [`ContainerRuntime`] for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;

use crate::container::ContainerID;

use super::{
    ArchiveStream, ContainerDetail, ContainerRuntime, ContainerSummary, Error, ImageDetail,
    ImageSummary, ObjectKind, PathStat, Port, Result, RuntimeKind,
};

const MODE_DIR: u32 = 1 << 31;
const MODE_SYMLINK: u32 = 1 << 27;

#[derive(Debug, Clone)]
pub(crate) enum MockPath {
    File(Vec<u8>),
    Dir,
    Symlink(String),
    /// A file whose archive stream breaks after the first chunk.
    BrokenFile,
}

#[derive(Debug, Default)]
pub(crate) struct MockRuntime {
    unavailable: bool,
    containers: Vec<ContainerDetail>,
    published_ports: HashMap<String, Vec<u16>>,
    images: Vec<ImageSummary>,
    image_details: HashMap<String, ImageDetail>,
    paths: HashMap<(String, String), MockPath>,
    failing_inspections: HashSet<String>,
    inspections: AtomicUsize,
}

impl MockRuntime {
    pub(crate) fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Default::default()
        }
    }

    pub(crate) fn with_container(mut self, detail: ContainerDetail) -> Self {
        self.containers.push(detail);
        self
    }

    pub(crate) fn with_published_port(mut self, id: &str, port: u16) -> Self {
        self.published_ports
            .entry(id.to_owned())
            .or_default()
            .push(port);
        self
    }

    pub(crate) fn with_image(mut self, summary: ImageSummary, detail: Option<ImageDetail>) -> Self {
        if let Some(detail) = detail {
            self.image_details.insert(summary.id.clone(), detail);
        }
        self.images.push(summary);
        self
    }

    pub(crate) fn with_path(mut self, id: &str, path: &str, entry: MockPath) -> Self {
        self.paths.insert((id.to_owned(), path.to_owned()), entry);
        self
    }

    pub(crate) fn with_failing_inspection(mut self, id: &str) -> Self {
        self.failing_inspections.insert(id.to_owned());
        self
    }

    pub(crate) fn inspections(&self) -> usize {
        self.inspections.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            return Err(Error::Unavailable {
                path: "/nonexistent/docker.sock".into(),
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            });
        }
        Ok(())
    }

    fn container(&self, id: &ContainerID) -> Result<&ContainerDetail> {
        self.containers
            .iter()
            .find(|c| c.id == id.as_str() || c.name.trim_start_matches('/') == id.as_str())
            .ok_or_else(|| Error::NotFound {
                kind: ObjectKind::Container,
                id: id.to_string(),
            })
    }

    fn lookup_path(&self, id: &ContainerID, path: &str) -> Result<(PathStat, &MockPath)> {
        let container = self.container(id)?;
        let entry = self
            .paths
            .get(&(container.id.clone(), path.to_owned()))
            .ok_or_else(|| Error::NotFound {
                kind: ObjectKind::Path,
                id: path.to_owned(),
            })?;

        let name = path.rsplit('/').next().unwrap_or(path).to_owned();
        let stat = match entry {
            MockPath::File(data) => PathStat {
                name,
                size: data.len() as i64,
                mode: 0o644,
                ..Default::default()
            },
            MockPath::BrokenFile => PathStat {
                name,
                size: 1024,
                mode: 0o644,
                ..Default::default()
            },
            MockPath::Dir => PathStat {
                name,
                mode: MODE_DIR | 0o755,
                ..Default::default()
            },
            MockPath::Symlink(target) => PathStat {
                name,
                mode: MODE_SYMLINK | 0o777,
                link_target: target.clone(),
                ..Default::default()
            },
        };

        Ok((stat, entry))
    }
}

/// Builds a single-entry tar archive the way the daemon does for a file.
fn tar_single_file(name: &str, data: &[u8]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_entry_type(tar::EntryType::Regular);
    builder.append_data(&mut header, name, data).unwrap();
    builder.into_inner().unwrap()
}

fn tar_single_symlink(name: &str, target: &str) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(0);
    header.set_entry_type(tar::EntryType::Symlink);
    builder
        .append_link(&mut header, name, target)
        .unwrap();
    builder.into_inner().unwrap()
}

impl ContainerRuntime for MockRuntime {
    fn kind(&self) -> RuntimeKind {
        RuntimeKind::Docker
    }

    async fn ping(&self) -> Result<()> {
        self.check_available()
    }

    async fn list_containers(&self) -> Result<Vec<ContainerSummary>> {
        self.check_available()?;
        Ok(self
            .containers
            .iter()
            .map(|c| ContainerSummary {
                id: c.id.clone(),
                names: vec![c.name.clone()],
                image: c.image.clone(),
                ports: self
                    .published_ports
                    .get(&c.id)
                    .into_iter()
                    .flatten()
                    .map(|port| Port {
                        ip: Some("0.0.0.0".to_owned()),
                        private_port: 80,
                        public_port: Some(*port),
                        protocol: "tcp".to_owned(),
                    })
                    .collect(),
                state: "running".to_owned(),
            })
            .collect())
    }

    async fn inspect_container(&self, id: &ContainerID) -> Result<ContainerDetail> {
        self.check_available()?;
        self.inspections.fetch_add(1, Ordering::SeqCst);
        if self.failing_inspections.contains(id.as_str()) {
            return Err(Error::Api {
                endpoint: format!("/containers/{id}/json"),
                status: 500,
                message: "inspection failed".to_owned(),
            });
        }
        self.container(id).cloned()
    }

    async fn list_images(&self) -> Result<Vec<ImageSummary>> {
        self.check_available()?;
        Ok(self.images.clone())
    }

    async fn inspect_image(&self, id: &str) -> Result<ImageDetail> {
        self.check_available()?;
        self.image_details
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                kind: ObjectKind::Image,
                id: id.to_owned(),
            })
    }

    async fn stat_path(&self, id: &ContainerID, path: &str) -> Result<PathStat> {
        self.check_available()?;
        self.lookup_path(id, path).map(|(stat, _)| stat)
    }

    async fn copy_from_container(
        &self,
        id: &ContainerID,
        path: &str,
    ) -> Result<(ArchiveStream, PathStat)> {
        self.check_available()?;
        let (stat, entry) = self.lookup_path(id, path)?;
        let chunks: Vec<std::io::Result<Bytes>> = match entry {
            MockPath::File(data) => {
                let archive = tar_single_file(&stat.name, data);
                // split to exercise multi-chunk streaming
                let (head, tail) = archive.split_at(archive.len() / 2);
                vec![
                    Ok(Bytes::copy_from_slice(head)),
                    Ok(Bytes::copy_from_slice(tail)),
                ]
            }
            MockPath::BrokenFile => {
                let archive = tar_single_file(&stat.name, &[0u8; 1024]);
                vec![
                    Ok(Bytes::copy_from_slice(&archive[..512])),
                    Err(std::io::Error::from(std::io::ErrorKind::ConnectionReset)),
                ]
            }
            MockPath::Dir => vec![Ok(Bytes::new())],
            MockPath::Symlink(target) => {
                vec![Ok(Bytes::from(tar_single_symlink(&stat.name, target)))]
            }
        };

        Ok((Box::pin(futures::stream::iter(chunks)), stat))
    }

    async fn start_container(&self, id: &ContainerID) -> Result<()> {
        self.check_available()?;
        self.container(id).map(|_| ())
    }
}

/// A running bridge-networked container with the given id and main pid.
pub(crate) fn running_container(id: &str, pid: u32) -> ContainerDetail {
    let mut detail = ContainerDetail {
        id: id.to_owned(),
        name: format!("/{id}-name"),
        image: "sha256:0123456789abcdef".to_owned(),
        created: "2024-05-01T10:11:12Z".to_owned(),
        ..Default::default()
    };
    detail.state.running = true;
    detail.state.status = "running".to_owned();
    detail.state.pid = pid;
    detail.host_config.network_mode = "bridge".to_owned();
    detail
}
