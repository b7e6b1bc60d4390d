use std::collections::{BTreeSet, HashMap};
use std::net::IpAddr;

/// Speed reported for cards whose `speed` file is missing or holds no positive value.
pub const DEFAULT_SPEED_MBPS: u64 = 1000;

/// Network cards keyed by interface name.
pub type NetworkCards = HashMap<String, NetworkCard>;

/// Interface name -> peer ifindex, for every link whose `IFLA_LINK` is present and non-zero.
pub type PeerLinkMap = HashMap<String, u32>;

/// Operational state of a link, as reported by `/sys/class/net/<name>/operstate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperState {
    Up,
    Down,
    #[default]
    Unknown,
}

impl OperState {
    /// Parses the content of an `operstate` file.
    ///
    /// Only the prefixes `up` and `down` are recognised (case-insensitive); every other
    /// kernel state such as `dormant` or `lowerlayerdown` maps to [`OperState::Unknown`].
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim_start().as_bytes();
        if raw.len() >= 2 && raw[..2].eq_ignore_ascii_case(b"up") {
            Self::Up
        } else if raw.len() >= 4 && raw[..4].eq_ignore_ascii_case(b"down") {
            Self::Down
        } else {
            Self::Unknown
        }
    }
}

/// One record of the OS address list. Records without an IP still name an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAddress {
    pub name: String,
    pub ip: Option<IpAddr>,
}

impl InterfaceAddress {
    pub fn new(name: impl Into<String>, ip: Option<IpAddr>) -> Self {
        Self {
            name: name.into(),
            ip,
        }
    }
}

/// Returns true for 169.254.0.0/16 and fe80::/10.
pub fn is_link_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_link_local(),
        IpAddr::V6(v6) => v6.is_unicast_link_local(),
    }
}

/// Address sets of one interface.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize)]
pub struct AddressSet {
    #[serde(rename = "ipv4_addresses")]
    pub ipv4: BTreeSet<String>,
    #[serde(rename = "ipv6_addresses")]
    pub ipv6: BTreeSet<String>,
}

impl AddressSet {
    /// Inserts `ip` unless it is link-local. Returns whether it was inserted.
    pub fn insert(&mut self, ip: IpAddr) -> bool {
        if is_link_local(&ip) {
            return false;
        }
        match ip {
            IpAddr::V4(v4) => self.ipv4.insert(v4.to_string()),
            IpAddr::V6(v6) => self.ipv6.insert(v6.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ipv4.is_empty() && self.ipv6.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ipv4.len() + self.ipv6.len()
    }
}

/// A local network interface as seen from the host network namespace.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct NetworkCard {
    /// Kernel ifindex, `0` if it could not be resolved.
    pub ifindex: u32,
    /// Index of the linked interface; equals `ifindex` unless the card is one end of a pair.
    pub iflink: u32,
    pub state: OperState,
    pub is_down: bool,
    pub is_physical: bool,
    pub real_name: String,
    pub friendly_name: String,
    pub description: String,
    pub receive_speed_mbps: u64,
    pub transmit_speed_mbps: u64,
    #[serde(flatten)]
    pub addresses: AddressSet,
}

impl NetworkCard {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            ifindex: 0,
            iflink: 0,
            state: OperState::Unknown,
            is_down: false,
            is_physical: true,
            friendly_name: name.clone(),
            description: name.clone(),
            real_name: name,
            receive_speed_mbps: DEFAULT_SPEED_MBPS,
            transmit_speed_mbps: DEFAULT_SPEED_MBPS,
            addresses: AddressSet::default(),
        }
    }

    pub fn set_state(&mut self, state: OperState) {
        self.state = state;
        self.is_down = state == OperState::Down;
    }

    pub fn set_speed(&mut self, mbps: u64) {
        self.receive_speed_mbps = mbps;
        self.transmit_speed_mbps = mbps;
    }

    /// Inserts `ip` unless it is link-local. Returns whether it was inserted.
    pub fn insert_address(&mut self, ip: IpAddr) -> bool {
        self.addresses.insert(ip)
    }

    pub fn has_addresses(&self) -> bool {
        !self.addresses.is_empty()
    }

    /// Returns true if the kernel reports a linked interface other than the card itself.
    pub fn is_paired(&self) -> bool {
        self.ifindex != 0 && self.iflink != 0 && self.iflink != self.ifindex
    }
}
