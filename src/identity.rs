//! Resolution of host observables to the container that owns them.
//!
//! Every lookup is a linear scan over the live inventory; nothing is cached.

use std::fmt;

use crate::container::ContainerID;
use crate::error::{Error, Lookup, Result};
use crate::netns::{NamespaceResolver, NetnsTool};
use crate::record::NetworkMode;
use crate::runtime::{ContainerDetail, ContainerRuntime, ContainerSummary};

/// A host observable that identifies at most one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityQuery {
    ProcessId(u32),
    ListenPort(u16),
    VirtualInterface(String),
}

impl fmt::Display for IdentityQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityQuery::ProcessId(pid) => write!(f, "pid {pid}"),
            IdentityQuery::ListenPort(port) => write!(f, "port {port}"),
            IdentityQuery::VirtualInterface(name) => write!(f, "interface {name}"),
        }
    }
}

async fn list<R: ContainerRuntime>(runtime: &R) -> Result<Vec<ContainerSummary>> {
    runtime.list_containers().await.map_err(Error::scan)
}

async fn inspect<R: ContainerRuntime>(
    runtime: &R,
    summary: &ContainerSummary,
) -> Result<(ContainerID, ContainerDetail)> {
    let id = ContainerID::new(&summary.id)?;
    let detail = runtime.inspect_container(&id).await.map_err(Error::scan)?;
    Ok((id, detail))
}

/// Returns the container whose main process has `pid`.
pub async fn by_process<R: ContainerRuntime>(runtime: &R, pid: u32) -> Result<ContainerID> {
    for summary in list(runtime).await? {
        let (id, detail) = inspect(runtime, &summary).await?;
        if detail.state.pid != 0 && detail.state.pid == pid {
            log::debug!("pid {pid} belongs to container {id}");
            return Ok(id);
        }
    }

    Err(Error::NotFound(Lookup::Process(pid)))
}

/// Returns the container publishing `port` on the host.
pub async fn by_port<R: ContainerRuntime>(runtime: &R, port: u16) -> Result<ContainerID> {
    for summary in list(runtime).await? {
        if summary
            .ports
            .iter()
            .any(|p| p.public_port == Some(port))
        {
            let id = ContainerID::new(&summary.id)?;
            log::debug!("port {port} is published by container {id}");
            return Ok(id);
        }
    }

    Err(Error::NotFound(Lookup::Port(port)))
}

/// Returns the container whose veth pair has `name` as its host end.
///
/// Containers sharing another network namespace, and containers without a
/// running process, have no veth of their own and are skipped.
pub async fn by_interface<R, T>(
    runtime: &R,
    resolver: &NamespaceResolver<T>,
    name: &str,
) -> Result<ContainerID>
where
    R: ContainerRuntime,
    T: NetnsTool,
{
    for summary in list(runtime).await? {
        let (id, detail) = inspect(runtime, &summary).await?;
        let mode = NetworkMode::parse(&detail.host_config.network_mode);
        if !mode.has_own_interface() || detail.state.pid == 0 {
            log::debug!("skipping container {id}: no interface of its own");
            continue;
        }

        let host_name = resolver
            .resolve(detail.state.pid, &id)
            .await
            .map_err(|source| Error::NamespaceResolutionFailed {
                container_id: id.clone(),
                source,
            })?;
        if host_name == name {
            log::debug!("interface {name} belongs to container {id}");
            return Ok(id);
        }
    }

    Err(Error::NotFound(Lookup::Interface(name.to_owned())))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::netns::{self, Link};
    use crate::runtime::mock::{MockRuntime, running_container};

    /// Namespace tooling where container `pid` sees `eth0` at index `pid`.
    struct PidIndexTool {
        host_links: Vec<Link>,
    }

    impl NetnsTool for PidIndexTool {
        async fn bind_namespace(&self, _pid: u32, _label: &str) -> netns::Result<()> {
            Ok(())
        }

        async fn query_link_index(&self, label: &str, _iface: &str) -> netns::Result<u32> {
            let indices: HashMap<&str, u32> = HashMap::from([("web", 10), ("db", 20)]);
            indices
                .get(label)
                .copied()
                .ok_or_else(|| netns::Error::IndexNotFound {
                    label: label.to_owned(),
                    iface: "eth0".to_owned(),
                })
        }

        async fn query_host_links(&self) -> netns::Result<Vec<Link>> {
            Ok(self.host_links.clone())
        }
    }

    fn resolver() -> NamespaceResolver<PidIndexTool> {
        NamespaceResolver::new(PidIndexTool {
            host_links: vec![
                Link { index: 11, name: "vethweb".to_owned() },
                Link { index: 21, name: "vethdb".to_owned() },
            ],
        })
    }

    fn runtime() -> MockRuntime {
        MockRuntime::default()
            .with_container(running_container("web", 100))
            .with_container(running_container("db", 200))
            .with_published_port("db", 5432)
    }

    #[tokio::test]
    async fn test_by_process() {
        let runtime = runtime();
        assert_eq!(by_process(&runtime, 200).await.unwrap().as_str(), "db");
        assert_eq!(by_process(&runtime, 100).await.unwrap().as_str(), "web");
    }

    #[tokio::test]
    async fn test_by_process_not_found() {
        let err = by_process(&runtime(), 999).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(Lookup::Process(999))));
    }

    #[tokio::test]
    async fn test_by_process_never_matches_pid_zero() {
        let mut stopped = running_container("stopped", 0);
        stopped.state.running = false;
        let runtime = MockRuntime::default().with_container(stopped);
        assert!(matches!(
            by_process(&runtime, 0).await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_by_process_aborts_on_inspection_failure() {
        let runtime = runtime().with_failing_inspection("web");
        let err = by_process(&runtime, 200).await.unwrap_err();
        assert!(matches!(err, Error::InspectionFailed(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_by_process_unavailable_runtime() {
        let err = by_process(&MockRuntime::unavailable(), 1).await.unwrap_err();
        assert!(matches!(err, Error::RuntimeUnavailable(_)));
    }

    #[tokio::test]
    async fn test_by_port() {
        let runtime = runtime();
        assert_eq!(by_port(&runtime, 5432).await.unwrap().as_str(), "db");
        assert_eq!(runtime.inspections(), 0);

        let err = by_port(&runtime, 80).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(Lookup::Port(80))));
    }

    #[tokio::test]
    async fn test_by_interface() {
        let runtime = runtime();
        let resolver = resolver();
        assert_eq!(
            by_interface(&runtime, &resolver, "vethdb")
                .await
                .unwrap()
                .as_str(),
            "db"
        );

        let err = by_interface(&runtime, &resolver, "veth0")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(Lookup::Interface(ref n)) if n == "veth0"));
    }

    #[tokio::test]
    async fn test_by_interface_skips_shared_namespaces() {
        let mut host = running_container("hostnet", 300);
        host.host_config.network_mode = "host".to_owned();
        let mut joined = running_container("sidecar", 301);
        joined.host_config.network_mode = "container:web".to_owned();
        let runtime = MockRuntime::default()
            .with_container(host)
            .with_container(joined)
            .with_container(running_container("web", 100));

        // The fake tool has no index for the skipped ids and would fail on them.
        let id = by_interface(&runtime, &resolver(), "vethweb").await.unwrap();
        assert_eq!(id.as_str(), "web");
    }

    #[tokio::test]
    async fn test_by_interface_reports_resolution_failure() {
        let runtime = MockRuntime::default().with_container(running_container("cache", 400));
        let err = by_interface(&runtime, &resolver(), "vethweb")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::NamespaceResolutionFailed { ref container_id, .. } if container_id.as_str() == "cache"
        ));
    }

    #[test]
    fn test_query_display() {
        assert_eq!(IdentityQuery::ProcessId(42).to_string(), "pid 42");
        assert_eq!(
            IdentityQuery::VirtualInterface("veth1".to_owned()).to_string(),
            "interface veth1"
        );
    }
}
