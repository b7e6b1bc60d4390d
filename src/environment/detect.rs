use std::path::{Path, PathBuf};

use super::checks::{
    Namespace, contains_proc_mount, has_container_indicators, is_namespace_isolated,
    matches_container_cgroup,
};
use super::{Error, Result};

/// Available runtime environments for the monitor.
#[derive(Debug, PartialEq, Eq)]
pub enum RuntimeEnvironment {
    /// Running directly on the host.
    Host,
    /// Running inside a containerized environment (e.g., Docker, Kubernetes, Podman).
    Container,
}

/// Detects whether the current process runs in a container or on the host.
///
/// Checks, in order: a PID namespace differing from PID 1 under `rootfs`,
/// container patterns in `/proc/self/cgroup`, and known marker files or variables.
/// Failing checks are logged as warnings and skipped.
pub fn detect_runtime_environment(rootfs: impl AsRef<Path>) -> RuntimeEnvironment {
    let rootfs = rootfs.as_ref();
    match contains_proc_mount(rootfs) {
        Ok(true) => match is_namespace_isolated(rootfs, Namespace::Pid) {
            Ok(true) => return RuntimeEnvironment::Container,
            Ok(false) => {}
            Err(err) => log::warn!(
                "Namespace check failed when detecting runtime environment: {}",
                err
            ),
        },
        Ok(false) => {}
        Err(err) => log::warn!("Failed to determine presence of /proc in rootfs: {}", err),
    }

    match matches_container_cgroup() {
        Ok(true) => return RuntimeEnvironment::Container,
        Ok(false) => {}
        Err(err) => log::warn!("Cgroup analysis failed during runtime detection: {}", err),
    }

    if has_container_indicators() {
        return RuntimeEnvironment::Container;
    }

    RuntimeEnvironment::Host
}

/// Picks the root under which host `/proc` and `/sys` are reachable.
///
/// On the host this is `/`. In a container it is `mount`, which must exist.
///
/// # Errors
///
/// Returns [`Error::MissingRootfs`] if running in a container without the host mount.
pub fn resolve_rootfs(mount: impl AsRef<Path>) -> Result<PathBuf> {
    let mount = mount.as_ref();
    match detect_runtime_environment(mount) {
        RuntimeEnvironment::Host => Ok(PathBuf::from("/")),
        RuntimeEnvironment::Container if mount.exists() => Ok(mount.to_path_buf()),
        RuntimeEnvironment::Container => Err(Error::MissingRootfs {
            path: mount.to_path_buf(),
        }),
    }
}

/// Returns whether this process shares the network namespace of PID 1 under `rootfs`.
///
/// Address enumeration only sees host cards when it does; without it only the
/// container's own interfaces are listed. Undeterminable cases are logged and
/// reported as shared.
pub fn shares_host_network(rootfs: impl AsRef<Path>) -> bool {
    match is_namespace_isolated(rootfs, Namespace::Net) {
        Ok(isolated) => !isolated,
        Err(err) => {
            log::warn!("Failed to compare network namespaces: {}", err);
            true
        }
    }
}
