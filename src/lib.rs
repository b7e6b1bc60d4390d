//! Netcard Monitor: enumerates the host's network cards, resolves the addresses of
//! veth peers living in container network namespaces and samples per-card traffic.
//!
//! The card enumeration lives in [`netcard`], traffic counters in [`flow`]. The
//! [`run`] loop publishes both through the HTTP API in [`api`].

use std::collections::HashSet;
use std::sync::Arc;

use error::ResultOkLogExt;

pub mod api;
pub mod config;
pub mod environment;
pub mod error;
pub mod flow;
pub mod fsutil;
pub mod netcard;

// In a container the monitor needs `--privileged --pid=host --network=host` and the
// host root mounted at ROOTFS_MOUNT_PATH:
//  - `--network=host` so getifaddrs and /proc/net/dev show the host cards
//  - `--pid=host` and the rootfs mount so /proc/<pid>/ns/net of containers is visible
//  - CAP_SYS_ADMIN for setns(2)

/// Traffic counters of the network namespace this process runs in.
const PROC_NET_DEV: &str = "/proc/net/dev";

/// Runs the network card monitor.
///
/// # Errors
///
/// Possible errors include:
/// - Invalid environment variables (see [`config::Config`]).
/// - Running in a container without the host root mount.
/// - A panicked enumeration task.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::Config::from_env()?;
    log::debug!("Config: {:?}", config);

    let rootfs = environment::resolve_rootfs(&config.rootfs_mount)?;
    log::debug!("Final rootfs: {}", rootfs.display());
    if !environment::shares_host_network(&rootfs) {
        log::warn!(
            "Not running in the host network namespace, only the cards of this namespace are visible"
        );
    }

    let enumerator = Arc::new(
        netcard::Enumerator::new(netcard::host_facility(&rootfs))
            .with_container_scan(config.container_scan),
    );

    let snapshot = api::SharedSnapshot::default();
    {
        let snapshot = Arc::clone(&snapshot);
        let addr = config.api_addr.clone();
        tokio::spawn(async move {
            if let Err(err) = api::APIServer::new(snapshot).listen(addr.as_str()).await {
                log::error!("API server on `{}` stopped: {}", addr, err);
            }
        });
    }

    let mut flow_tracker = flow::FlowTracker::default();
    let mut interval = tokio::time::interval(config.interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)?
            .as_secs();
        log::trace!("Enumerating network cards@{timestamp}");

        // The namespace scan spawns its own throwaway thread, so this pool thread
        // never leaves the host namespace.
        let enumeration = {
            let enumerator = Arc::clone(&enumerator);
            tokio::task::spawn_blocking(move || {
                let before = std::time::Instant::now();
                let result = enumerator.enumerate();
                log::trace!("enumerate() took {} microseconds", before.elapsed().as_micros());
                result
            })
            .await?
        };
        let Some(enumeration) = enumeration.ok_log("failed to enumerate network cards") else {
            continue;
        };
        if !enumeration.failures.is_empty() {
            log::warn!(
                "Enumeration finished with {} failures",
                enumeration.failures.len()
            );
            for failure in &enumeration.failures {
                log::debug!("{failure}");
            }
        }

        let names: HashSet<String> = enumeration.cards.keys().cloned().collect();
        let sampled_at = std::time::Instant::now();
        let rates = flow::read_card_flow(PROC_NET_DEV, &names)
            .ok_log("failed to read card flow")
            .and_then(|current| flow_tracker.update(sampled_at, current));

        let mut snapshot = snapshot.write().await;
        snapshot.set_enumeration(timestamp, enumeration);
        if let Some((elapsed_secs, rates)) = rates {
            snapshot.interval_secs = elapsed_secs;
            snapshot.flow = rates;
        }
    }
}
