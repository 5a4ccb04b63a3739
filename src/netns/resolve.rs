use crate::container::ContainerID;

use super::error::{Error, Result};
use super::parser::Link;
use super::tool::NetnsTool;

/// Interface name every bridge-networked container sees for its veth end.
pub const CONTAINER_INTERFACE: &str = "eth0";

/// Finds the host-side veth name of a container's network namespace.
#[derive(Debug, Clone)]
pub struct NamespaceResolver<T> {
    tool: T,
}

impl<T: NetnsTool> NamespaceResolver<T> {
    pub fn new(tool: T) -> Self {
        Self { tool }
    }

    pub fn tool(&self) -> &T {
        &self.tool
    }

    /// Returns the host interface paired with `eth0` inside the namespace of `pid`.
    ///
    /// The namespace is bound under the container id first. The host peer is
    /// the link whose index is one greater than the in-namespace index.
    pub async fn resolve(&self, pid: u32, id: &ContainerID) -> Result<String> {
        self.tool.bind_namespace(pid, id.as_str()).await?;

        let ns_index = self
            .tool
            .query_link_index(id.as_str(), CONTAINER_INTERFACE)
            .await?;
        let links = self.tool.query_host_links().await?;

        let peer = find_host_peer(&links, ns_index).ok_or(Error::InterfaceNotFound {
            index: ns_index.saturating_add(1),
        })?;

        log::debug!(
            "container {id}: {CONTAINER_INTERFACE}@{ns_index} pairs with host {}@{}",
            peer.name,
            peer.index
        );
        Ok(peer.name.clone())
    }
}

/// Returns the host link adjacent to the in-namespace index `ns_index`.
pub fn find_host_peer(links: &[Link], ns_index: u32) -> Option<&Link> {
    let target = ns_index.checked_add(1)?;
    links.iter().find(|link| link.index == target)
}
