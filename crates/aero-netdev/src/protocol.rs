use crate::{MacAddr, NetDeviceId, NetError, PacketBuffer, Result};
use std::collections::HashMap;
use tracing::debug;

/// An upper-layer (network-layer) protocol that receives decapsulated frames.
pub trait NetProtocol {
    fn name(&self) -> &str;

    /// EtherType this protocol is selected by.
    fn net_proto(&self) -> u16;

    /// Take ownership of one received payload.
    ///
    /// `pkb` holds the payload with the link-layer header already stripped; `ll_source` is the
    /// sender's link-layer address.
    fn rx(&mut self, pkb: PacketBuffer, netdev: NetDeviceId, ll_source: MacAddr);
}

/// EtherType-keyed set of [`NetProtocol`]s.
///
/// Populated once at start-up; each EtherType maps to at most one protocol.
#[derive(Default)]
pub struct NetProtocolRegistry {
    protocols: HashMap<u16, Box<dyn NetProtocol>>,
}

impl NetProtocolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, protocol: Box<dyn NetProtocol>) -> Result<()> {
        let net_proto = protocol.net_proto();
        if self.protocols.contains_key(&net_proto) {
            return Err(NetError::DuplicateProtocol { net_proto });
        }
        self.protocols.insert(net_proto, protocol);
        Ok(())
    }

    pub fn find(&self, net_proto: u16) -> Option<&dyn NetProtocol> {
        self.protocols.get(&net_proto).map(|p| p.as_ref())
    }

    pub fn len(&self) -> usize {
        self.protocols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.protocols.is_empty()
    }

    /// Deliver a payload to the protocol registered for `net_proto`.
    ///
    /// Delivery is fire-and-forget. A frame for an unregistered EtherType is not an error; its
    /// buffer is handed back as `Err` so the caller can release it.
    pub fn dispatch(
        &mut self,
        net_proto: u16,
        pkb: PacketBuffer,
        netdev: NetDeviceId,
        ll_source: MacAddr,
    ) -> std::result::Result<(), PacketBuffer> {
        match self.protocols.get_mut(&net_proto) {
            Some(protocol) => {
                protocol.rx(pkb, netdev, ll_source);
                Ok(())
            }
            None => {
                debug!(net_proto, %ll_source, "no protocol registered, dropping frame");
                Err(pkb)
            }
        }
    }
}
