use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::container::{ContainerID, ImageID};
use crate::digest::{self, Sha256Digest};
use crate::error::{Error, Lookup, Result, ResultOkLogExt};
use crate::extract::{self, Extractor};
use crate::fsutil;
use crate::identity::{self, IdentityQuery};
use crate::netns::{NamespaceResolver, NetnsTool};
use crate::passwd::{self, PASSWD_PATH};
use crate::record::{self, ContainerRecord, ImageRecord};
use crate::runtime::ContainerRuntime;

/// Answers identity and content questions about the containers of one runtime.
///
/// Every call queries the runtime afresh. Nothing is cached between calls and
/// the only host state left behind is the namespace binding of containers
/// whose interface was resolved.
#[derive(Debug)]
pub struct Inspector<R, N> {
    runtime: R,
    resolver: NamespaceResolver<N>,
    extractor: Extractor,
    proc_root: PathBuf,
}

impl<R, N> Inspector<R, N>
where
    R: ContainerRuntime,
    N: NetnsTool,
{
    pub fn new(runtime: R, tool: N, extractor: Extractor, proc_root: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            resolver: NamespaceResolver::new(tool),
            extractor,
            proc_root: proc_root.into(),
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn scratch_root(&self) -> &Path {
        self.extractor.scratch_root()
    }

    pub async fn is_runtime_available(&self) -> bool {
        match self.runtime.ping().await {
            Ok(()) => true,
            Err(err) => {
                log::debug!("runtime is not available: {err}");
                false
            }
        }
    }

    pub async fn resolve_by_process(&self, pid: u32) -> Result<ContainerID> {
        identity::by_process(&self.runtime, pid)
            .await
            .inspect_err(|err| log_failure(format_args!("resolving pid {pid}"), err))
    }

    pub async fn resolve_by_port(&self, port: u16) -> Result<ContainerID> {
        identity::by_port(&self.runtime, port)
            .await
            .inspect_err(|err| log_failure(format_args!("resolving port {port}"), err))
    }

    pub async fn resolve_by_interface(&self, name: &str) -> Result<ContainerID> {
        identity::by_interface(&self.runtime, &self.resolver, name)
            .await
            .inspect_err(|err| log_failure(format_args!("resolving interface {name}"), err))
    }

    pub async fn resolve(&self, query: &IdentityQuery) -> Result<ContainerID> {
        match query {
            IdentityQuery::ProcessId(pid) => self.resolve_by_process(*pid).await,
            IdentityQuery::ListenPort(port) => self.resolve_by_port(*port).await,
            IdentityQuery::VirtualInterface(name) => self.resolve_by_interface(name).await,
        }
    }

    /// Builds the record of container `id`.
    ///
    /// The docker-proxy pid and the host interface are best effort: failures
    /// to determine them are logged and leave the fields unset.
    pub async fn container_record(&self, id: &ContainerID) -> Result<ContainerRecord> {
        let detail = self.runtime.inspect_container(id).await?;
        let mut record = ContainerRecord::from_detail(self.runtime.kind(), &detail)?;

        let host_ports: BTreeSet<u16> = record.host_ports().collect();
        let proc_root = self.proc_root.clone();
        let scan =
            tokio::task::spawn_blocking(move || record::find_proxy_pid(&proc_root, &host_ports));
        record.proxy_pid = match scan.await {
            Ok(Ok(pid)) => pid,
            Ok(Err(err)) => {
                log::warn!(
                    "container {id}: failed to scan {} for docker-proxy: {err}",
                    self.proc_root.display()
                );
                None
            }
            Err(err) => {
                log::warn!("container {id}: docker-proxy scan did not complete: {err}");
                None
            }
        };

        if record.network_mode.has_own_interface() && detail.state.pid != 0 {
            record.virtual_interface = self
                .resolver
                .resolve(detail.state.pid, &record.container_id)
                .await
                .map_err(|source| Error::NamespaceResolutionFailed {
                    container_id: record.container_id.clone(),
                    source,
                })
                .ok_log();
        }

        Ok(record)
    }

    /// Hashes the regular file at `path` inside container `id`.
    ///
    /// Reading and hashing run on the blocking pool, as files have no size
    /// limit.
    pub async fn hash_path(&self, id: &ContainerID, path: &str) -> Result<Sha256Digest> {
        let context = format!("container {id}: hashing {path}");
        let file = self
            .extractor
            .extract(&self.runtime, id, path)
            .await
            .map_err(Error::from)
            .inspect_err(|err| log_failure(format_args!("{context}"), err))?;

        let digest = run_blocking(path, move || {
            digest::sha256_file(file.path()).map_err(|err| Error::from(extract::Error::from(err)))
        })
        .await
        .inspect_err(|err| log_failure(format_args!("{context}"), err))?;
        log::debug!("container {id}: sha256({path}) = {digest}");
        Ok(digest)
    }

    /// Looks up the name of `uid` in the container's `/etc/passwd`.
    pub async fn resolve_username(&self, id: &ContainerID, uid: u32) -> Result<String> {
        let context = format!("container {id}: resolving uid {uid}");
        let file = self
            .extractor
            .extract(&self.runtime, id, PASSWD_PATH)
            .await
            .map_err(Error::from)
            .inspect_err(|err| log_failure(format_args!("{context}"), err))?;

        run_blocking(PASSWD_PATH, move || {
            let content =
                fsutil::read_to_string_lossy(file.path()).map_err(extract::Error::from)?;
            drop(file);
            Ok(passwd::lookup_username(&content, uid)?)
        })
        .await
        .inspect_err(|err| log_failure(format_args!("{context}"), err))
    }

    /// Builds the record of the image with the given id, `sha256:` prefix optional.
    pub async fn image_record(&self, id: &str) -> Result<ImageRecord> {
        let image_id = ImageID::new(id)?;
        let summary = self
            .runtime
            .list_images()
            .await?
            .into_iter()
            .find(|image| image_id.matches(&image.id))
            .ok_or_else(|| Error::NotFound(Lookup::Image(id.to_owned())))?;

        let detail = self
            .runtime
            .inspect_image(&summary.id)
            .await
            .map_err(Error::from)
            .ok_log();
        Ok(ImageRecord::from_summary(&summary, detail.as_ref()))
    }
}

/// Runs `work` on the blocking pool. `path` names the file it works on.
async fn run_blocking<T, F>(path: &str, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|source| {
            Error::Extraction(extract::Error::Task {
                path: path.to_owned(),
                source,
            })
        })?
}

/// Logs a failed operation. Lookups that find nothing are routine and stay at
/// debug level.
fn log_failure(context: fmt::Arguments<'_>, err: &Error) {
    match err {
        Error::NotFound(_) => log::debug!("{context}: {err}"),
        _ => log::warn!("{context}: {err}"),
    }
}
