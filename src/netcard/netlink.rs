//! Minimal `NETLINK_ROUTE` client that dumps all links and extracts the peer
//! ifindex (`IFLA_LINK`) of every interface that reports one.
//!
//! Messages are built and parsed with `netlink-packet-route`. [`collect_link_dump`]
//! drives the parser over any datagram source, [`resolve_peer_links`] feeds it from a
//! `netlink-sys` socket opened in the network namespace of the calling thread.

use netlink_packet_core::{
    NLM_F_DUMP, NLM_F_REQUEST, NetlinkHeader, NetlinkMessage, NetlinkPayload,
};
use netlink_packet_route::RouteNetlinkMessage;
use netlink_packet_route::link::{LinkAttribute, LinkMessage};
use netlink_sys::{Socket, SocketAddr, protocols::NETLINK_ROUTE};

use super::{Error, PeerLinkMap, Result};

const RECV_BUF_LEN: usize = 32 * 1024;
const DUMP_SEQ: u32 = 1;

/// Whether a dump needs more datagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpProgress {
    More,
    Done,
}

/// Builds an `RTM_GETLINK` dump request for all links.
pub fn encode_getlink_request(seq: u32) -> Vec<u8> {
    let mut header = NetlinkHeader::default();
    header.flags = NLM_F_REQUEST | NLM_F_DUMP;
    header.sequence_number = seq;

    let mut packet = NetlinkMessage::new(
        header,
        NetlinkPayload::from(RouteNetlinkMessage::GetLink(LinkMessage::default())),
    );
    packet.finalize();

    let mut buf = vec![0; packet.buffer_len()];
    packet.serialize(&mut buf[..]);
    buf
}

/// Walks every netlink message in one received datagram and records the peer
/// links found in `RTM_NEWLINK` messages into `out`.
///
/// # Errors
///
/// - [`Error::NetlinkDecode`] if a message cannot be parsed.
/// - [`Error::NetlinkRejected`] if the kernel answered with a non-zero `NLMSG_ERROR`.
pub fn parse_link_dump(buf: &[u8], out: &mut PeerLinkMap) -> Result<DumpProgress> {
    let mut offset = 0;
    while offset < buf.len() {
        let message = NetlinkMessage::<RouteNetlinkMessage>::deserialize(&buf[offset..])
            .map_err(|err| Error::NetlinkDecode(err.to_string()))?;
        let len = message.header.length as usize;

        match message.payload {
            NetlinkPayload::Done(_) => return Ok(DumpProgress::Done),
            NetlinkPayload::Error(err) => {
                return match err.code {
                    None => Ok(DumpProgress::Done),
                    Some(code) => Err(Error::NetlinkRejected { errno: -code.get() }),
                };
            }
            NetlinkPayload::InnerMessage(RouteNetlinkMessage::NewLink(link)) => {
                if let Some((name, peer)) = peer_link(&link) {
                    out.insert(name, peer);
                }
            }
            _ => {}
        }

        if len == 0 {
            return Err(Error::NetlinkMalformed("zero-length message"));
        }
        offset += len;
    }
    Ok(DumpProgress::More)
}

/// `(IFLA_IFNAME, IFLA_LINK)` of one link, if both are present and the link is non-zero.
fn peer_link(link: &LinkMessage) -> Option<(String, u32)> {
    let mut name = None;
    let mut peer = None;
    for attr in &link.attributes {
        match attr {
            LinkAttribute::IfName(ifname) => name = Some(ifname.clone()),
            LinkAttribute::Link(index) if *index != 0 => peer = Some(*index),
            _ => {}
        }
    }
    Some((name?, peer?))
}

/// Reads datagrams from `recv` until the dump ends and collects the peer links.
///
/// `recv` fills the given buffer with one datagram and returns its length.
///
/// # Errors
///
/// Returns the first error of `recv` or [`parse_link_dump`], or
/// [`Error::NetlinkMalformed`] if `recv` returns `0` before the end of the dump.
pub fn collect_link_dump<R>(mut recv: R) -> Result<PeerLinkMap>
where
    R: FnMut(&mut [u8]) -> Result<usize>,
{
    let mut links = PeerLinkMap::new();
    let mut buf = vec![0u8; RECV_BUF_LEN];
    loop {
        let n = recv(&mut buf)?;
        if n == 0 {
            return Err(Error::NetlinkMalformed("socket closed before end of dump"));
        }
        if parse_link_dump(&buf[..n], &mut links)? == DumpProgress::Done {
            return Ok(links);
        }
    }
}

/// Dumps all links visible in the calling thread's network namespace.
///
/// The socket is owned by this call and closed on every return path.
pub fn resolve_peer_links() -> Result<PeerLinkMap> {
    let mut socket =
        Socket::new(NETLINK_ROUTE).map_err(|source| Error::Netlink { op: "socket", source })?;
    socket
        .bind_auto()
        .map_err(|source| Error::Netlink { op: "bind", source })?;
    socket
        .connect(&SocketAddr::new(0, 0))
        .map_err(|source| Error::Netlink { op: "connect", source })?;

    let request = encode_getlink_request(DUMP_SEQ);
    socket
        .send(&request, 0)
        .map_err(|source| Error::Netlink { op: "send", source })?;

    let links = collect_link_dump(|buf| {
        let mut buf = buf;
        socket
            .recv(&mut buf, 0)
            .map_err(|source| Error::Netlink { op: "recv", source })
    })?;

    log::trace!("netlink link dump returned {} peer links", links.len());
    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;
    use netlink_packet_core::{DoneMessage, ErrorMessage, NLM_F_MULTIPART};
    use std::collections::VecDeque;
    use std::num::NonZeroI32;

    const EPERM: i32 = nix::errno::Errno::EPERM as i32;

    fn serialize(payload: NetlinkPayload<RouteNetlinkMessage>) -> Vec<u8> {
        let mut header = NetlinkHeader::default();
        header.flags = NLM_F_MULTIPART;
        header.sequence_number = DUMP_SEQ;
        let mut packet = NetlinkMessage::new(header, payload);
        packet.finalize();
        let mut buf = vec![0; packet.buffer_len()];
        packet.serialize(&mut buf[..]);
        buf
    }

    fn newlink(name: &str, link: Option<u32>) -> Vec<u8> {
        let mut message = LinkMessage::default();
        message
            .attributes
            .push(LinkAttribute::IfName(name.to_owned()));
        if let Some(link) = link {
            message.attributes.push(LinkAttribute::Link(link));
        }
        message.attributes.push(LinkAttribute::Mtu(1500));
        serialize(NetlinkPayload::from(RouteNetlinkMessage::NewLink(message)))
    }

    fn done() -> Vec<u8> {
        serialize(NetlinkPayload::Done(DoneMessage::default()))
    }

    fn error(code: i32) -> Vec<u8> {
        let mut message = ErrorMessage::default();
        message.code = NonZeroI32::new(code);
        serialize(NetlinkPayload::Error(message))
    }

    /// Replays `datagrams` as consecutive receives, then an empty one.
    fn replay(datagrams: Vec<Vec<u8>>) -> impl FnMut(&mut [u8]) -> Result<usize> {
        let mut datagrams: VecDeque<Vec<u8>> = datagrams.into();
        move |buf: &mut [u8]| match datagrams.pop_front() {
            Some(datagram) => {
                buf[..datagram.len()].copy_from_slice(&datagram);
                Ok(datagram.len())
            }
            None => Ok(0),
        }
    }

    #[test]
    fn test_encode_getlink_request() {
        let req = encode_getlink_request(7);
        let message = NetlinkMessage::<RouteNetlinkMessage>::deserialize(&req).unwrap();
        assert_eq!(message.header.flags, NLM_F_REQUEST | NLM_F_DUMP);
        assert_eq!(message.header.sequence_number, 7);
        assert_eq!(message.header.length as usize, req.len());
        assert!(matches!(
            message.payload,
            NetlinkPayload::InnerMessage(RouteNetlinkMessage::GetLink(_))
        ));
    }

    #[test]
    fn test_parse_records_only_linked_interfaces() {
        let mut buf = newlink("lo", None);
        buf.extend(newlink("eth0", Some(0)));
        buf.extend(newlink("veth0", Some(5)));

        let mut links = PeerLinkMap::new();
        let progress = parse_link_dump(&buf, &mut links).unwrap();
        assert_eq!(progress, DumpProgress::More);
        assert_eq!(links.len(), 1);
        assert_eq!(links.get("veth0"), Some(&5));
    }

    #[test]
    fn test_parse_stops_at_done() {
        let mut buf = newlink("veth0", Some(5));
        buf.extend(done());
        buf.extend(newlink("veth1", Some(9)));

        let mut links = PeerLinkMap::new();
        assert_eq!(
            parse_link_dump(&buf, &mut links).unwrap(),
            DumpProgress::Done
        );
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn test_parse_error_message() {
        let mut links = PeerLinkMap::new();
        let err = parse_link_dump(&error(-EPERM), &mut links).unwrap_err();
        assert!(matches!(err, Error::NetlinkRejected { errno } if errno == EPERM));

        assert_eq!(
            parse_link_dump(&error(0), &mut links).unwrap(),
            DumpProgress::Done
        );
    }

    #[test]
    fn test_parse_truncated_message() {
        let mut buf = newlink("veth0", Some(5));
        buf.truncate(buf.len() - 8);
        let mut links = PeerLinkMap::new();
        assert!(matches!(
            parse_link_dump(&buf, &mut links),
            Err(Error::NetlinkDecode(_))
        ));
    }

    #[test]
    fn test_collect_spans_datagrams() {
        let mut first = newlink("veth0", Some(5));
        first.extend(newlink("lo", None));
        let mut second = newlink("veth1", Some(9));
        second.extend(done());

        let links = collect_link_dump(replay(vec![first, second])).unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links["veth0"], 5);
        assert_eq!(links["veth1"], 9);
    }

    #[test]
    fn test_collect_fails_on_closed_socket() {
        let err = collect_link_dump(replay(vec![newlink("veth0", Some(5))])).unwrap_err();
        assert!(matches!(err, Error::NetlinkMalformed(_)));
    }

    #[test]
    fn test_collect_fails_on_error_mid_dump() {
        let err = collect_link_dump(replay(vec![newlink("veth0", Some(5)), error(-EPERM)]))
            .unwrap_err();
        assert!(matches!(err, Error::NetlinkRejected { errno } if errno == EPERM));
    }

    #[test]
    fn test_collect_propagates_recv_error() {
        let err = collect_link_dump(|_buf: &mut [u8]| {
            Err(Error::Netlink {
                op: "recv",
                source: std::io::ErrorKind::Interrupted.into(),
            })
        })
        .unwrap_err();
        assert!(matches!(err, Error::Netlink { op: "recv", .. }));
    }
}
