/// Entry point for the container identity service.
///
/// Resolves process ids, published ports and veth interfaces to the Docker
/// container that owns them and serves container, image and file data over a
/// JSON HTTP API.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the API listener fails.
///
/// # Examples
///
/// ```bash
/// RUST_LOG=debug API_LISTEN_ADDR=127.0.0.1:3000 cargo run
/// ```
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let result = container_identity::run().await;
    if let Err(err) = &result {
        log::error!("{err}");
    }
    log::logger().flush();
    result
}
