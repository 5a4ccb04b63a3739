//! Container identity: resolves host-level observables (process ids, published
//! ports, veth interfaces) to the container that owns them, and extracts
//! verifiable data from a running container's filesystem.
//!
//! The entry point is [`inspector::Inspector`], which composes the runtime
//! facade, the namespace resolver and the filesystem extractor. The binary
//! wires it to the Docker daemon and serves it over HTTP via [`api`].

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod container;
pub mod digest;
pub mod error;
pub mod extract;
pub mod fsutil;
pub mod identity;
pub mod inspector;
pub mod netns;
pub mod passwd;
pub mod record;
pub mod runtime;
pub mod transport;

pub use error::{Error, Result};

/// Runs the container identity service.
///
/// Reads the [`config::Config`] from the environment, connects the inspector
/// to the Docker daemon and serves the HTTP API until the listener fails.
///
/// # Errors
///
/// Possible errors include:
/// - Invalid configuration values (e.g., a `tcp://` `DOCKER_HOST`).
/// - Failure to bind the API listen address.
pub async fn run() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let config = config::Config::from_env()?;
    log::debug!("Configuration: {config:?}");

    let runtime = runtime::DockerRuntime::new(&config.docker_socket);
    let tool = netns::IpCommand::new(&config.netns_root, &config.proc_root);
    let extractor = extract::Extractor::new(&config.scratch_root);
    let inspector = Arc::new(inspector::Inspector::new(
        runtime,
        tool,
        extractor,
        &config.proc_root,
    ));

    if inspector.is_runtime_available().await {
        log::info!(
            "Connected to container runtime at `{}`",
            config.docker_socket.display()
        );
    } else {
        log::warn!(
            "Container runtime at `{}` is not reachable; requests will fail until it is",
            config.docker_socket.display()
        );
    }

    api::APIServer::new(inspector)
        .listen(config.listen_addr)
        .await?;
    Ok(())
}
