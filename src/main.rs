/// Entry point of the network card monitor.
///
/// Periodically enumerates the host's network cards, fills in the addresses of
/// veth peers living in container namespaces, samples per-card traffic and serves
/// the latest results over HTTP.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the host root mount is
/// missing while running inside a container.
///
/// # Examples
///
/// ```bash
/// RUST_LOG=debug NETCARD_INTERVAL_SECS=5 cargo run
/// ```
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    netcard_monitor::run().await
}
