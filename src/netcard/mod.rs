//! Network card enumeration with container-IP correlation.
//!
//! [`Enumerator::enumerate`] lists the local cards through a [`NetworkFacility`],
//! classifies them and, when at least one card reports a linked interface other
//! than itself (a veth pair), looks up the addresses of the peers that live in
//! container network namespaces and fills them into cards that have none.
//!
//! # Example
//!
//! ```no_run
//! use netcard_monitor::netcard::{Enumerator, HostFacility};
//!
//! let enumeration = Enumerator::new(HostFacility::default()).enumerate()?;
//! for (name, card) in &enumeration.cards {
//!     println!("{name}: {:?} {:?}", card.addresses.ipv4, card.addresses.ipv6);
//! }
//! for failure in &enumeration.failures {
//!     eprintln!("{failure}");
//! }
//! # Ok::<(), netcard_monitor::netcard::Error>(())
//! ```
mod card;
mod correlate;
mod enumerate;
mod error;
pub mod facility;
pub mod namespace;
#[cfg(target_os = "linux")]
pub mod netlink;
pub mod sysfs;

pub use card::{
    AddressSet, DEFAULT_SPEED_MBPS, InterfaceAddress, NetworkCard, NetworkCards, OperState,
    PeerLinkMap, is_link_local,
};
pub use correlate::correlate;
pub use enumerate::{Enumeration, Enumerator};
pub use error::{Error, Failure, Result, Scan};
pub use facility::{HostFacility, NetworkFacility, UnsupportedFacility, host_facility};
pub use namespace::{ContainerIpTable, NamespaceOps, NamespaceScanner, run_isolated};
