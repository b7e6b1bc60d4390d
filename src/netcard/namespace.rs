//! Collects the addresses of interfaces living in foreign network namespaces.
//!
//! One end of a veth pair usually sits inside a container namespace, where host
//! address enumeration cannot see it. The scanner walks `/proc/<pid>/ns/net`,
//! enters every distinct namespace other than PID 1's, and records the addresses
//! found there under the peer ifindex of each interface, i.e. under the ifindex of
//! the host-side end.
//!
//! Entering a namespace changes state of the calling thread. [`run_isolated`]
//! therefore runs the scan on a freshly spawned thread that is dropped afterwards.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use super::card::{AddressSet, InterfaceAddress, is_link_local};
use super::{Error, PeerLinkMap, Result, Scan};

/// Host-side ifindex -> addresses observed for its peer inside a foreign namespace.
pub type ContainerIpTable = HashMap<u32, AddressSet>;

/// Identity of a network namespace, i.e. the target of `/proc/<pid>/ns/net`
/// (e.g. `net:[4026531840]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespaceId(PathBuf);

impl NamespaceId {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self(target.into())
    }
}

/// OS operations the scanner needs. [`ProcNamespaces`] is the procfs/`setns` implementation.
pub trait NamespaceOps {
    /// Namespace of PID 1, taken as the host namespace.
    fn host_namespace(&self) -> Result<NamespaceId>;
    /// Running processes. Entries that cannot be read are recorded in the failures.
    fn list_pids(&self) -> Scan<Vec<u32>>;
    fn namespace_of(&self, pid: u32) -> Result<NamespaceId>;
    /// Moves the calling thread into the network namespace of `pid`.
    fn enter(&self, pid: u32) -> Result<()>;
    /// Addresses visible from the calling thread's current namespace.
    fn local_addresses(&self) -> Result<Vec<InterfaceAddress>>;
    /// Peer links visible from the calling thread's current namespace.
    fn peer_links(&self) -> Result<PeerLinkMap>;
}

/// Namespace scan over a [`NamespaceOps`] implementation.
#[derive(Debug)]
pub struct NamespaceScanner<O> {
    ops: O,
}

impl<O: NamespaceOps> NamespaceScanner<O> {
    pub fn new(ops: O) -> Self {
        Self { ops }
    }

    /// Scans every foreign namespace once.
    ///
    /// Must run on a thread that is discarded afterwards, see [`run_isolated`].
    /// Failures for individual processes are recorded and the scan moves on.
    pub fn scan(&self) -> Scan<ContainerIpTable> {
        let mut scan = Scan::new(ContainerIpTable::new());

        let Some(host) = scan.absorb("read host network namespace", self.ops.host_namespace())
        else {
            return scan;
        };
        let pids = self.ops.list_pids();
        scan.failures.extend(pids.failures);
        let pids = pids.value;

        let mut scanned = HashSet::new();
        for pid in pids {
            let Some(ns) = scan.absorb(
                "read process network namespace",
                self.ops.namespace_of(pid),
            ) else {
                continue;
            };
            if ns == host || scanned.contains(&ns) {
                continue;
            }

            if scan
                .absorb("enter network namespace", self.ops.enter(pid))
                .is_none()
            {
                continue;
            }
            scanned.insert(ns);

            let Some(addresses) = scan.absorb(
                "list namespace addresses",
                self.ops.local_addresses(),
            ) else {
                continue;
            };
            let Some(links) = scan.absorb("resolve namespace peer links", self.ops.peer_links())
            else {
                continue;
            };
            log::trace!(
                "pid {pid}: {} addresses, {} peer links",
                addresses.len(),
                links.len()
            );
            merge_namespace(&mut scan.value, &addresses, &links);
        }

        log::debug!(
            "scanned {} foreign network namespaces, {} linked interfaces with addresses",
            scanned.len(),
            scan.value.len()
        );
        scan
    }
}

/// Adds the addresses of every linked interface of one namespace to `table`.
fn merge_namespace(table: &mut ContainerIpTable, addresses: &[InterfaceAddress], links: &PeerLinkMap) {
    for address in addresses {
        let (Some(ip), Some(&peer)) = (address.ip, links.get(&address.name)) else {
            continue;
        };
        if !is_link_local(&ip) {
            table.entry(peer).or_default().insert(ip);
        }
    }
}

/// Runs the scan on a dedicated thread, blocks until it finishes and discards the thread.
pub fn run_isolated<O>(ops: O) -> Scan<ContainerIpTable>
where
    O: NamespaceOps + Send + 'static,
{
    let worker = std::thread::Builder::new()
        .name("netns-scan".to_owned())
        .spawn(move || NamespaceScanner::new(ops).scan());

    let mut scan = Scan::new(ContainerIpTable::new());
    match worker {
        Ok(handle) => match handle.join() {
            Ok(done) => return done,
            Err(_) => scan.record("join namespace scan worker", Error::WorkerPanicked),
        },
        Err(err) => scan.record("spawn namespace scan worker", Error::WorkerSpawn(err)),
    }
    scan
}

#[cfg(target_os = "linux")]
pub use proc::ProcNamespaces;

#[cfg(target_os = "linux")]
mod proc {
    use std::path::{Path, PathBuf};

    use nix::sched::{CloneFlags, setns};

    use super::{NamespaceId, NamespaceOps};
    use crate::netcard::{Error, InterfaceAddress, PeerLinkMap, Result, Scan, facility, netlink};

    /// [`NamespaceOps`] backed by procfs and `setns(2)`.
    #[derive(Debug, Clone)]
    pub struct ProcNamespaces {
        proc_root: PathBuf,
    }

    impl ProcNamespaces {
        pub fn new(proc_root: impl Into<PathBuf>) -> Self {
            Self {
                proc_root: proc_root.into(),
            }
        }

        fn ns_path(&self, pid: u32) -> PathBuf {
            self.proc_root.join(pid.to_string()).join("ns/net")
        }

        fn read_namespace(path: &Path) -> Result<NamespaceId> {
            std::fs::read_link(path)
                .map(NamespaceId::new)
                .map_err(|source| Error::ReadSymlink {
                    path: path.to_path_buf(),
                    source,
                })
        }
    }

    impl NamespaceOps for ProcNamespaces {
        fn host_namespace(&self) -> Result<NamespaceId> {
            Self::read_namespace(&self.ns_path(1))
        }

        fn list_pids(&self) -> Scan<Vec<u32>> {
            let mut scan = Scan::new(Vec::new());
            let read_dir_error = |source| Error::ReadDir {
                path: self.proc_root.clone(),
                source,
            };

            let Some(entries) = scan.absorb(
                "list processes",
                std::fs::read_dir(&self.proc_root).map_err(read_dir_error),
            ) else {
                return scan;
            };
            for entry in entries {
                // Processes exiting mid-listing surface as entry errors.
                let Some(entry) = scan.absorb("read process entry", entry.map_err(read_dir_error))
                else {
                    continue;
                };
                if let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse().ok()) {
                    scan.value.push(pid);
                }
            }
            scan.value.sort_unstable();
            scan
        }

        fn namespace_of(&self, pid: u32) -> Result<NamespaceId> {
            Self::read_namespace(&self.ns_path(pid))
        }

        fn enter(&self, pid: u32) -> Result<()> {
            let path = self.ns_path(pid);
            let ns = std::fs::File::open(&path)
                .map_err(|source| Error::NamespaceOpen { path, source })?;
            setns(&ns, CloneFlags::CLONE_NEWNET)
                .map_err(|source| Error::NamespaceEnter { pid, source })
        }

        fn local_addresses(&self) -> Result<Vec<InterfaceAddress>> {
            facility::list_addresses()
        }

        fn peer_links(&self) -> Result<PeerLinkMap> {
            netlink::resolve_peer_links()
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::net::IpAddr;

    /// Per-pid namespace fixture. `enter` switches the "current" namespace used by
    /// `local_addresses` and `peer_links`.
    #[derive(Default)]
    struct FakeNamespaces {
        namespaces: HashMap<u32, &'static str>,
        addresses: HashMap<&'static str, Vec<InterfaceAddress>>,
        links: HashMap<&'static str, PeerLinkMap>,
        failing_enter: HashSet<u32>,
        unreadable_entries: usize,
        current: RefCell<&'static str>,
        entered: RefCell<Vec<u32>>,
    }

    impl FakeNamespaces {
        fn with_process(mut self, pid: u32, ns: &'static str) -> Self {
            self.namespaces.insert(pid, ns);
            self
        }

        fn with_interface(
            mut self,
            ns: &'static str,
            name: &str,
            ip: &str,
            peer: u32,
        ) -> Self {
            self.addresses
                .entry(ns)
                .or_default()
                .push(InterfaceAddress::new(name, Some(ip.parse::<IpAddr>().unwrap())));
            self.links.entry(ns).or_default().insert(name.to_owned(), peer);
            self
        }
    }

    impl NamespaceOps for FakeNamespaces {
        fn host_namespace(&self) -> Result<NamespaceId> {
            self.namespace_of(1)
        }

        fn list_pids(&self) -> Scan<Vec<u32>> {
            let mut pids: Vec<u32> = self.namespaces.keys().copied().collect();
            pids.sort_unstable();
            let mut scan = Scan::new(pids);
            for _ in 0..self.unreadable_entries {
                scan.record(
                    "read process entry",
                    Error::ReadDir {
                        path: PathBuf::from("/proc"),
                        source: std::io::ErrorKind::NotFound.into(),
                    },
                );
            }
            scan
        }

        fn namespace_of(&self, pid: u32) -> Result<NamespaceId> {
            self.namespaces
                .get(&pid)
                .map(|ns| NamespaceId::new(*ns))
                .ok_or_else(|| Error::ReadSymlink {
                    path: PathBuf::from(format!("/proc/{pid}/ns/net")),
                    source: std::io::ErrorKind::NotFound.into(),
                })
        }

        fn enter(&self, pid: u32) -> Result<()> {
            self.entered.borrow_mut().push(pid);
            if self.failing_enter.contains(&pid) {
                return Err(Error::NamespaceOpen {
                    path: PathBuf::from(format!("/proc/{pid}/ns/net")),
                    source: std::io::ErrorKind::PermissionDenied.into(),
                });
            }
            *self.current.borrow_mut() = self.namespaces[&pid];
            Ok(())
        }

        fn local_addresses(&self) -> Result<Vec<InterfaceAddress>> {
            let current = *self.current.borrow();
            Ok(self.addresses.get(current).cloned().unwrap_or_default())
        }

        fn peer_links(&self) -> Result<PeerLinkMap> {
            let current = *self.current.borrow();
            Ok(self.links.get(current).cloned().unwrap_or_default())
        }
    }

    #[test]
    fn test_scan_skips_host_namespace_and_duplicates() {
        let ops = FakeNamespaces::default()
            .with_process(1, "host")
            .with_process(2, "host")
            .with_process(10, "ctr-a")
            .with_process(11, "ctr-a")
            .with_interface("host", "eth0", "192.168.0.2", 2)
            .with_interface("ctr-a", "eth0", "10.1.2.3", 5);
        let scanner = NamespaceScanner::new(ops);

        let scan = scanner.scan();
        assert!(scan.failures.is_empty());
        assert_eq!(*scanner.ops.entered.borrow(), vec![10]);
        assert_eq!(scan.value.len(), 1);
        assert!(scan.value[&5].ipv4.contains("10.1.2.3"));
    }

    #[test]
    fn test_scan_continues_after_enter_failure() {
        let mut ops = FakeNamespaces::default()
            .with_process(1, "host")
            .with_process(10, "ctr-a")
            .with_process(20, "ctr-b")
            .with_interface("ctr-a", "eth0", "10.1.0.2", 5)
            .with_interface("ctr-b", "eth0", "10.2.0.2", 7);
        ops.failing_enter.insert(10);

        let scan = NamespaceScanner::new(ops).scan();
        assert_eq!(scan.failures.len(), 1);
        assert_eq!(scan.failures[0].operation, "enter network namespace");
        assert!(!scan.value.contains_key(&5));
        assert!(scan.value[&7].ipv4.contains("10.2.0.2"));
    }

    #[test]
    fn test_scan_continues_after_unreadable_process_entries() {
        let mut ops = FakeNamespaces::default()
            .with_process(1, "host")
            .with_process(10, "ctr-a")
            .with_interface("ctr-a", "eth0", "10.1.0.2", 5);
        ops.unreadable_entries = 2;

        let scan = NamespaceScanner::new(ops).scan();
        assert_eq!(scan.failures.len(), 2);
        assert!(scan.failures.iter().all(|f| f.operation == "read process entry"));
        assert!(scan.value[&5].ipv4.contains("10.1.0.2"));
    }

    #[test]
    fn test_scan_filters_link_local_and_unlinked() {
        let mut ops = FakeNamespaces::default()
            .with_process(1, "host")
            .with_process(10, "ctr-a")
            .with_interface("ctr-a", "eth0", "fe80::1", 5)
            .with_interface("ctr-a", "eth0", "fd00::5", 5);
        ops.addresses
            .get_mut("ctr-a")
            .unwrap()
            .push(InterfaceAddress::new("lo", Some("127.0.0.1".parse().unwrap())));

        let scan = NamespaceScanner::new(ops).scan();
        assert_eq!(scan.value.len(), 1);
        let set = &scan.value[&5];
        assert!(set.ipv4.is_empty());
        assert_eq!(set.ipv6.iter().collect::<Vec<_>>(), vec!["fd00::5"]);
    }

    #[test]
    fn test_scan_without_host_namespace_is_empty() {
        let ops = FakeNamespaces::default().with_process(10, "ctr-a");
        let scan = NamespaceScanner::new(ops).scan();
        assert!(scan.value.is_empty());
        assert_eq!(scan.failures.len(), 1);
        assert_eq!(scan.failures[0].operation, "read host network namespace");
    }

    struct SendableNamespaces {
        thread_name: std::sync::mpsc::Sender<Option<String>>,
    }

    impl NamespaceOps for SendableNamespaces {
        fn host_namespace(&self) -> Result<NamespaceId> {
            let name = std::thread::current().name().map(str::to_owned);
            self.thread_name.send(name).unwrap();
            Ok(NamespaceId::new("host"))
        }

        fn list_pids(&self) -> Scan<Vec<u32>> {
            Scan::new(vec![1])
        }

        fn namespace_of(&self, _pid: u32) -> Result<NamespaceId> {
            Ok(NamespaceId::new("host"))
        }

        fn enter(&self, _pid: u32) -> Result<()> {
            unreachable!("host namespace is never entered")
        }

        fn local_addresses(&self) -> Result<Vec<InterfaceAddress>> {
            Ok(Vec::new())
        }

        fn peer_links(&self) -> Result<PeerLinkMap> {
            Ok(PeerLinkMap::new())
        }
    }

    #[test]
    fn test_run_isolated_uses_dedicated_thread() {
        let (tx, rx) = std::sync::mpsc::channel();
        let scan = run_isolated(SendableNamespaces { thread_name: tx });

        assert!(scan.failures.is_empty());
        assert_eq!(rx.recv().unwrap().as_deref(), Some("netns-scan"));
    }
}
