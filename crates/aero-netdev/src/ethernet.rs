//! Ethernet link layer: header codec and the [`Ethernet`] link protocol.

use crate::{MacAddr, PacketBuffer, PkbError};
use tracing::debug;

/// Link-layer address length.
pub const ETH_ALEN: usize = 6;
/// Header length: destination, source, EtherType.
pub const ETH_HLEN: usize = 14;
/// Largest frame (header included, FCS excluded) a receive buffer must hold.
pub const ETH_FRAME_LEN: usize = 1514;
/// ARP hardware type for Ethernet.
pub const ARPHRD_ETHER: u16 = 1;

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub dest: MacAddr,
    pub source: MacAddr,
    /// EtherType, host byte order (big-endian on the wire).
    pub net_proto: u16,
}

impl EthernetHeader {
    pub const LEN: usize = ETH_HLEN;

    pub fn parse(buf: &[u8]) -> Option<Self> {
        let header: &[u8; ETH_HLEN] = buf.get(..ETH_HLEN)?.try_into().ok()?;
        let mut dest = [0u8; ETH_ALEN];
        let mut source = [0u8; ETH_ALEN];
        dest.copy_from_slice(&header[0..6]);
        source.copy_from_slice(&header[6..12]);
        Some(Self {
            dest: MacAddr(dest),
            source: MacAddr(source),
            net_proto: u16::from_be_bytes([header[12], header[13]]),
        })
    }

    pub fn write(&self, out: &mut [u8; ETH_HLEN]) {
        out[0..6].copy_from_slice(&self.dest.0);
        out[6..12].copy_from_slice(&self.source.0);
        out[12..14].copy_from_slice(&self.net_proto.to_be_bytes());
    }

    pub fn to_bytes(&self) -> [u8; ETH_HLEN] {
        let mut out = [0u8; ETH_HLEN];
        self.write(&mut out);
        out
    }
}

/// The Ethernet link protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ethernet;

impl Ethernet {
    pub const NAME: &'static str = "Ethernet";
    pub const LL_PROTO: u16 = ARPHRD_ETHER;
    pub const LL_ADDR_LEN: usize = ETH_ALEN;
    pub const LL_BROADCAST: MacAddr = MacAddr::BROADCAST;

    /// Prepend an Ethernet header to the payload in `pkb`.
    ///
    /// On error the buffer is left untouched.
    pub fn tx(
        pkb: &mut PacketBuffer,
        ll_source: MacAddr,
        ll_dest: MacAddr,
        net_proto: u16,
    ) -> Result<(), PkbError> {
        let header = EthernetHeader {
            dest: ll_dest,
            source: ll_source,
            net_proto,
        };
        pkb.push(ETH_HLEN)?.copy_from_slice(&header.to_bytes());
        Ok(())
    }

    /// Strip the Ethernet header off a received frame.
    ///
    /// Frames shorter than a header are expected on a real wire; they are reported at debug level
    /// and yield `None` so the caller simply drops them.
    pub fn rx(pkb: &mut PacketBuffer) -> Option<EthernetHeader> {
        let Some(header) = EthernetHeader::parse(pkb.data()) else {
            debug!(len = pkb.len(), "Ethernet packet too short");
            return None;
        };
        pkb.pull(ETH_HLEN).ok()?;
        Some(header)
    }
}
