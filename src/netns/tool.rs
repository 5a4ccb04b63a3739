use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use super::error::{Error, Result};
use super::parser::{Link, parse_links};

/// Host-side operations needed to find the host end of a container's veth pair.
pub trait NetnsTool: Send + Sync {
    /// Makes the network namespace of `pid` addressable under `label`.
    ///
    /// An existing binding with the same label is replaced.
    fn bind_namespace(&self, pid: u32, label: &str) -> impl Future<Output = Result<()>> + Send;

    /// Returns the kernel index of `iface` as seen inside the namespace `label`.
    fn query_link_index(
        &self,
        label: &str,
        iface: &str,
    ) -> impl Future<Output = Result<u32>> + Send;

    /// Lists the links of the host namespace.
    fn query_host_links(&self) -> impl Future<Output = Result<Vec<Link>>> + Send;
}

/// [`NetnsTool`] backed by `/proc`, `nsenter` and `ip`.
///
/// Namespaces are bound by linking `<netns_root>/<label>` to
/// `<proc_root>/<pid>/ns/net`.
#[derive(Debug, Clone)]
pub struct IpCommand {
    netns_root: PathBuf,
    proc_root: PathBuf,
    ip: PathBuf,
    nsenter: PathBuf,
}

impl IpCommand {
    pub fn new(netns_root: impl Into<PathBuf>, proc_root: impl Into<PathBuf>) -> Self {
        Self {
            netns_root: netns_root.into(),
            proc_root: proc_root.into(),
            ip: PathBuf::from("ip"),
            nsenter: PathBuf::from("nsenter"),
        }
    }

    /// Overrides the `ip` and `nsenter` executables.
    pub fn with_programs(mut self, ip: impl Into<PathBuf>, nsenter: impl Into<PathBuf>) -> Self {
        self.ip = ip.into();
        self.nsenter = nsenter.into();
        self
    }

    fn namespace_path(&self, label: &str) -> PathBuf {
        self.netns_root.join(label)
    }

    /// A fresh hidden name next to the binding of `label`.
    fn staging_path(&self, label: &str) -> PathBuf {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        let seq = NEXT.fetch_add(1, Ordering::Relaxed);
        self.netns_root
            .join(format!(".{label}.{}.{seq}", std::process::id()))
    }

    async fn run(&self, program: &Path, args: &[OsString]) -> Result<String> {
        let command = std::iter::once(program.as_os_str())
            .chain(args.iter().map(OsString::as_os_str))
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        log::debug!("running `{command}`");

        let output = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    Error::ToolMissing {
                        tool: program.display().to_string(),
                        source,
                    }
                } else {
                    Error::Spawn {
                        command: command.clone(),
                        source,
                    }
                }
            })?;

        if !output.status.success() {
            return Err(Error::CommandFailed {
                command,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if stdout.trim().is_empty() {
            return Err(Error::EmptyOutput { command });
        }

        Ok(stdout)
    }
}

impl NetnsTool for IpCommand {
    async fn bind_namespace(&self, pid: u32, label: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.netns_root)
            .await
            .map_err(|source| Error::CreateDir {
                path: self.netns_root.clone(),
                source,
            })?;

        let link = self.namespace_path(label);
        let target = self.proc_root.join(pid.to_string()).join("ns").join("net");
        let bind_err = |source| Error::Bind {
            link: link.clone(),
            target: target.clone(),
            source,
        };

        // rename(2) replaces an existing binding atomically
        let staging = self.staging_path(label);
        tokio::fs::symlink(&target, &staging)
            .await
            .map_err(bind_err)?;
        if let Err(err) = tokio::fs::rename(&staging, &link).await {
            if let Err(cleanup) = tokio::fs::remove_file(&staging).await {
                log::debug!("failed to remove {}: {cleanup}", staging.display());
            }
            return Err(bind_err(err));
        }

        log::debug!("bound {} to {}", target.display(), link.display());
        Ok(())
    }

    async fn query_link_index(&self, label: &str, iface: &str) -> Result<u32> {
        let mut net = OsString::from("--net=");
        net.push(self.namespace_path(label));
        let args = [
            net,
            self.ip.clone().into_os_string(),
            "link".into(),
            "show".into(),
            iface.into(),
        ];

        let output = self.run(&self.nsenter, &args).await?;
        parse_links(&output)
            .into_iter()
            .find(|link| link.name == iface)
            .map(|link| link.index)
            .ok_or_else(|| Error::IndexNotFound {
                label: label.to_owned(),
                iface: iface.to_owned(),
            })
    }

    async fn query_host_links(&self) -> Result<Vec<Link>> {
        let output = self.run(&self.ip, &["link".into(), "show".into()]).await?;
        Ok(parse_links(&output))
    }
}
