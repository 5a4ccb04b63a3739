//! Query interface over a container runtime daemon.
//!
//! [`ContainerRuntime`] is the only way the rest of the crate talks to a
//! runtime. [`DockerRuntime`] implements it against the Docker Engine API;
//! tests use an in-memory implementation.
//!
//! Every operation may fail with [`Error::Unavailable`] when the daemon cannot
//! be reached. That condition is kept distinct from [`Error::NotFound`] so
//! callers can tell an absent object apart from an absent daemon.

use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;

mod docker;
mod error;
#[cfg(test)]
pub(crate) mod mock;
mod models;

pub use docker::DockerRuntime;
pub(crate) use docker::default_socket_path;
pub use error::{Error, ObjectKind, Result};
pub use models::{
    ContainerConfig, ContainerDetail, ContainerState, ContainerSummary, HostConfig, ImageDetail,
    ImageMetadata, ImageSummary, NetworkSettings, PathStat, Port, PortBinding,
};

use crate::container::ContainerID;

/// Tar-encoded contents of a path copied out of a container, as a byte stream.
pub type ArchiveStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// The runtime family a record was produced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum RuntimeKind {
    #[serde(rename = "DOCKER")]
    Docker,
}

pub trait ContainerRuntime: Send + Sync {
    fn kind(&self) -> RuntimeKind;

    /// Checks that the daemon answers at all.
    fn ping(&self) -> impl Future<Output = Result<()>> + Send;

    /// Lists running containers.
    fn list_containers(&self) -> impl Future<Output = Result<Vec<ContainerSummary>>> + Send;

    fn inspect_container(
        &self,
        id: &ContainerID,
    ) -> impl Future<Output = Result<ContainerDetail>> + Send;

    fn list_images(&self) -> impl Future<Output = Result<Vec<ImageSummary>>> + Send;

    fn inspect_image(&self, id: &str) -> impl Future<Output = Result<ImageDetail>> + Send;

    /// Stats `path` inside the container without transferring its contents.
    fn stat_path(
        &self,
        id: &ContainerID,
        path: &str,
    ) -> impl Future<Output = Result<PathStat>> + Send;

    /// Copies `path` out of the container as a tar stream.
    fn copy_from_container(
        &self,
        id: &ContainerID,
        path: &str,
    ) -> impl Future<Output = Result<(ArchiveStream, PathStat)>> + Send;

    /// Starts a created container. Only integration tests need this.
    fn start_container(&self, id: &ContainerID) -> impl Future<Output = Result<()>> + Send;
}
