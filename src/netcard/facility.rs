//! OS facilities the enumerator reads from, one implementation per platform.
//!
//! [`HostFacility`] names the implementation selected for the build target.

use super::card::{InterfaceAddress, OperState};
use super::namespace::ContainerIpTable;
use super::sysfs::VirtualDevices;
use super::{PeerLinkMap, Result, Scan};

/// Everything [`Enumerator`](super::Enumerator) needs from the operating system.
pub trait NetworkFacility {
    /// All records of the OS address list. Failure is fatal to the enumeration.
    fn interface_addresses(&self) -> Result<Vec<InterfaceAddress>>;
    fn interface_index(&self, name: &str) -> Result<u32>;
    fn peer_links(&self) -> Result<PeerLinkMap>;
    /// Linked ifindex as exposed outside of the link dump (e.g. sysfs).
    fn iflink(&self, name: &str) -> Result<u32>;
    fn virtual_devices(&self) -> Result<VirtualDevices>;
    fn operstate(&self, name: &str) -> Result<OperState>;
    fn speed_mbps(&self, name: &str) -> Result<u64>;
    /// Addresses of interfaces in foreign network namespaces, keyed by host-side ifindex.
    fn container_ips(&self) -> Scan<ContainerIpTable>;
}

#[cfg(target_os = "linux")]
pub type HostFacility = linux::LinuxFacility;
#[cfg(not(target_os = "linux"))]
pub type HostFacility = UnsupportedFacility;

#[cfg(target_os = "linux")]
pub use linux::{LinuxFacility, list_addresses};

/// Builds the facility of this target, reading host state under `rootfs`.
#[cfg(target_os = "linux")]
pub fn host_facility(rootfs: impl AsRef<std::path::Path>) -> HostFacility {
    LinuxFacility::with_rootfs(rootfs)
}

/// Builds the facility of this target, reading host state under `rootfs`.
#[cfg(not(target_os = "linux"))]
pub fn host_facility(_rootfs: impl AsRef<std::path::Path>) -> HostFacility {
    UnsupportedFacility
}

#[cfg(target_os = "linux")]
mod linux {
    use std::net::{IpAddr, SocketAddrV4, SocketAddrV6};
    use std::path::{Path, PathBuf};

    use super::NetworkFacility;
    use crate::netcard::namespace::{self, ContainerIpTable, ProcNamespaces};
    use crate::netcard::sysfs::{self, VirtualDevices};
    use crate::netcard::{Error, InterfaceAddress, OperState, PeerLinkMap, Result, Scan, netlink};

    /// Lists the address records of the calling thread's network namespace.
    pub fn list_addresses() -> Result<Vec<InterfaceAddress>> {
        let addrs = nix::ifaddrs::getifaddrs().map_err(Error::AddressList)?;
        Ok(addrs
            .map(|ifa| {
                let ip = ifa.address.as_ref().and_then(|addr| {
                    if let Some(sin) = addr.as_sockaddr_in() {
                        Some(IpAddr::V4(*SocketAddrV4::from(*sin).ip()))
                    } else {
                        addr.as_sockaddr_in6()
                            .map(|sin6| IpAddr::V6(*SocketAddrV6::from(*sin6).ip()))
                    }
                });
                InterfaceAddress::new(ifa.interface_name, ip)
            })
            .collect())
    }

    /// Linux backend reading sysfs, procfs and netlink.
    ///
    /// Both roots default to `/sys` and `/proc` and can be moved to a host root
    /// mount when running inside a container.
    #[derive(Debug, Clone)]
    pub struct LinuxFacility {
        sys_root: PathBuf,
        proc_root: PathBuf,
    }

    impl Default for LinuxFacility {
        fn default() -> Self {
            Self::with_rootfs("/")
        }
    }

    impl LinuxFacility {
        pub fn new(sys_root: impl Into<PathBuf>, proc_root: impl Into<PathBuf>) -> Self {
            Self {
                sys_root: sys_root.into(),
                proc_root: proc_root.into(),
            }
        }

        /// Uses `<rootfs>/sys` and `<rootfs>/proc`.
        pub fn with_rootfs(rootfs: impl AsRef<Path>) -> Self {
            let rootfs = rootfs.as_ref();
            Self::new(rootfs.join("sys"), rootfs.join("proc"))
        }

        pub fn sys_root(&self) -> &Path {
            &self.sys_root
        }

        pub fn proc_root(&self) -> &Path {
            &self.proc_root
        }
    }

    impl NetworkFacility for LinuxFacility {
        fn interface_addresses(&self) -> Result<Vec<InterfaceAddress>> {
            list_addresses()
        }

        fn interface_index(&self, name: &str) -> Result<u32> {
            nix::net::if_::if_nametoindex(name).map_err(|source| Error::InterfaceIndex {
                name: name.to_owned(),
                source,
            })
        }

        fn peer_links(&self) -> Result<PeerLinkMap> {
            netlink::resolve_peer_links()
        }

        fn iflink(&self, name: &str) -> Result<u32> {
            sysfs::read_iflink(&self.sys_root, name)
        }

        fn virtual_devices(&self) -> Result<VirtualDevices> {
            VirtualDevices::read(&self.sys_root)
        }

        fn operstate(&self, name: &str) -> Result<OperState> {
            sysfs::read_operstate(&self.sys_root, name)
        }

        fn speed_mbps(&self, name: &str) -> Result<u64> {
            sysfs::read_speed(&self.sys_root, name)
        }

        fn container_ips(&self) -> Scan<ContainerIpTable> {
            namespace::run_isolated(ProcNamespaces::new(self.proc_root.clone()))
        }
    }
}

/// Backend for targets without an implementation. Address listing fails, so every
/// enumeration returns [`Error::Unsupported`](super::Error::Unsupported).
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedFacility;

impl NetworkFacility for UnsupportedFacility {
    fn interface_addresses(&self) -> Result<Vec<InterfaceAddress>> {
        Err(super::Error::Unsupported)
    }

    fn interface_index(&self, _name: &str) -> Result<u32> {
        Err(super::Error::Unsupported)
    }

    fn peer_links(&self) -> Result<PeerLinkMap> {
        Err(super::Error::Unsupported)
    }

    fn iflink(&self, _name: &str) -> Result<u32> {
        Err(super::Error::Unsupported)
    }

    fn virtual_devices(&self) -> Result<VirtualDevices> {
        Err(super::Error::Unsupported)
    }

    fn operstate(&self, _name: &str) -> Result<OperState> {
        Err(super::Error::Unsupported)
    }

    fn speed_mbps(&self, _name: &str) -> Result<u64> {
        Err(super::Error::Unsupported)
    }

    fn container_ips(&self) -> Scan<ContainerIpTable> {
        Scan::new(ContainerIpTable::new())
    }
}
