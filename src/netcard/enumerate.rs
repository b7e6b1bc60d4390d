use super::card::{NetworkCard, NetworkCards};
use super::correlate::correlate;
use super::facility::NetworkFacility;
use super::sysfs::VirtualDevices;
use super::{Failure, PeerLinkMap, Result, Scan};

/// Result of one enumeration call.
#[derive(Debug, Default)]
pub struct Enumeration {
    pub cards: NetworkCards,
    /// Non-fatal failures, in the order they happened.
    pub failures: Vec<Failure>,
    /// Whether a veth-type pairing was detected and the container scan ran.
    pub container_scan_ran: bool,
}

/// Builds the card mapping from a [`NetworkFacility`].
#[derive(Debug, Clone)]
pub struct Enumerator<F> {
    facility: F,
    container_scan: bool,
}

impl<F: NetworkFacility> Enumerator<F> {
    pub fn new(facility: F) -> Self {
        Self {
            facility,
            container_scan: true,
        }
    }

    /// Disables the container-IP scan even when a pairing is detected.
    pub fn with_container_scan(mut self, enabled: bool) -> Self {
        self.container_scan = enabled;
        self
    }

    pub fn facility(&self) -> &F {
        &self.facility
    }

    /// Enumerates all local cards.
    ///
    /// Per-card metadata that cannot be read falls back to a default and is recorded
    /// in [`Enumeration::failures`], as are failures of the netlink dump and the
    /// container scan.
    ///
    /// # Errors
    ///
    /// Returns the error of the OS address listing, the only failure that aborts the call.
    pub fn enumerate(&self) -> Result<Enumeration> {
        let addresses = self.facility.interface_addresses()?;

        let mut scan = Scan::new(NetworkCards::new());
        let virtual_devices = scan
            .absorb("list virtual devices", self.facility.virtual_devices())
            .unwrap_or_default();
        let peer_links = scan
            .absorb("resolve peer links", self.facility.peer_links())
            .unwrap_or_default();

        let mut paired = false;
        for address in addresses {
            if !scan.value.contains_key(&address.name) {
                let card = self.describe(&address.name, &virtual_devices, &peer_links, &mut scan);
                if card.is_paired() {
                    log::trace!(
                        "card `{}` is paired: ifindex={} iflink={}",
                        card.real_name,
                        card.ifindex,
                        card.iflink
                    );
                    paired = true;
                }
                scan.value.insert(address.name.clone(), card);
            }
            if let (Some(ip), Some(card)) = (address.ip, scan.value.get_mut(&address.name)) {
                card.insert_address(ip);
            }
        }

        let container_scan_ran = paired && self.container_scan;
        if container_scan_ran {
            let table = self.facility.container_ips();
            scan.failures.extend(table.failures);
            let filled = correlate(&mut scan.value, &table.value);
            log::debug!("filled {filled} cards from container namespaces");
        }

        Ok(Enumeration {
            cards: scan.value,
            failures: scan.failures,
            container_scan_ran,
        })
    }

    /// Resolves the metadata of a card seen for the first time.
    fn describe(
        &self,
        name: &str,
        virtual_devices: &VirtualDevices,
        peer_links: &PeerLinkMap,
        scan: &mut Scan<NetworkCards>,
    ) -> NetworkCard {
        let mut card = NetworkCard::new(name);
        card.is_physical = virtual_devices.is_physical(name);

        if let Some(ifindex) = scan.absorb("resolve ifindex", self.facility.interface_index(name)) {
            card.ifindex = ifindex;
        }
        card.iflink = match peer_links.get(name) {
            Some(&link) => link,
            None => scan
                .absorb("read iflink", self.facility.iflink(name))
                .unwrap_or(card.ifindex),
        };
        if let Some(state) = scan.absorb("read operstate", self.facility.operstate(name)) {
            card.set_state(state);
        }
        if let Some(speed) = scan.absorb("read speed", self.facility.speed_mbps(name)) {
            card.set_speed(speed);
        }
        card
    }
}
