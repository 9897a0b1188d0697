use crate::ethernet::Ethernet;
use crate::{
    HeapPkbAllocator, MacAddr, NetError, NetProtocol, NetProtocolRegistry, PacketBuffer,
    PkbAllocator, Result,
};
use core::fmt;
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info};

/// Handle for a device registered with a [`NetDeviceRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetDeviceId(pub u32);

impl fmt::Display for NetDeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "net{}", self.0)
    }
}

/// Frames collected by one [`NetDeviceOps::poll`] call, in arrival order.
pub type RxQueue = VecDeque<PacketBuffer>;

/// Driver hooks installed on a [`NetDevice`].
pub trait NetDeviceOps {
    /// Drain every frame the hardware currently has queued into `rx`.
    ///
    /// Must not block waiting for traffic: return as soon as the hardware queue is empty or a
    /// buffer/IO failure is hit. Buffers for received frames come from `pool`; a buffer the
    /// driver ends up not queueing must go back to `pool`.
    fn poll(&mut self, pool: &mut dyn PkbAllocator, rx: &mut RxQueue);

    /// Hand one complete link-layer frame to the hardware.
    ///
    /// The driver owns `pkb` from here on and must release it to `pool` exactly once, whether or
    /// not the hardware accepted the frame.
    fn transmit(&mut self, pkb: PacketBuffer, pool: &mut dyn PkbAllocator) -> Result<()>;
}

/// A network device: a link-layer address plus the driver hooks that move frames.
pub struct NetDevice {
    driver: &'static str,
    ll_addr: MacAddr,
    ops: Box<dyn NetDeviceOps>,
}

impl NetDevice {
    pub fn new(driver: &'static str, ll_addr: MacAddr, ops: Box<dyn NetDeviceOps>) -> Self {
        Self {
            driver,
            ll_addr,
            ops,
        }
    }

    pub fn driver(&self) -> &'static str {
        self.driver
    }

    pub fn ll_addr(&self) -> MacAddr {
        self.ll_addr
    }

    pub fn ops_mut(&mut self) -> &mut dyn NetDeviceOps {
        self.ops.as_mut()
    }
}

impl fmt::Debug for NetDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetDevice")
            .field("driver", &self.driver)
            .field("ll_addr", &self.ll_addr)
            .finish_non_exhaustive()
    }
}

/// The set of installed network devices.
#[derive(Debug, Default)]
pub struct NetDeviceRegistry {
    devices: BTreeMap<NetDeviceId, NetDevice>,
    next_id: u32,
}

impl NetDeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, netdev: NetDevice) -> NetDeviceId {
        let id = NetDeviceId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        info!(%id, driver = netdev.driver, ll_addr = %netdev.ll_addr, "registered network device");
        self.devices.insert(id, netdev);
        id
    }

    pub fn unregister(&mut self, id: NetDeviceId) -> Option<NetDevice> {
        let netdev = self.devices.remove(&id)?;
        info!(%id, driver = netdev.driver, "unregistered network device");
        Some(netdev)
    }

    pub fn get(&self, id: NetDeviceId) -> Option<&NetDevice> {
        self.devices.get(&id)
    }

    pub fn get_mut(&mut self, id: NetDeviceId) -> Option<&mut NetDevice> {
        self.devices.get_mut(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = NetDeviceId> + '_ {
        self.devices.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Frame counts from one [`NetStack::poll`].
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollCounts {
    /// Frames handed up by device poll hooks.
    pub rx_frames: usize,
    /// Frames taken by a registered protocol.
    pub delivered: usize,
    /// Frames discarded as too short or for an unregistered EtherType.
    pub dropped: usize,
}

/// Devices, protocols and the buffer allocator, wired together.
pub struct NetStack {
    netdevs: NetDeviceRegistry,
    protocols: NetProtocolRegistry,
    pool: Box<dyn PkbAllocator>,
}

impl Default for NetStack {
    fn default() -> Self {
        Self::new(Box::new(HeapPkbAllocator::default()))
    }
}

impl NetStack {
    pub fn new(pool: Box<dyn PkbAllocator>) -> Self {
        Self {
            netdevs: NetDeviceRegistry::new(),
            protocols: NetProtocolRegistry::new(),
            pool,
        }
    }

    pub fn netdevs(&self) -> &NetDeviceRegistry {
        &self.netdevs
    }

    pub fn netdevs_mut(&mut self) -> &mut NetDeviceRegistry {
        &mut self.netdevs
    }

    pub fn protocols(&self) -> &NetProtocolRegistry {
        &self.protocols
    }

    pub fn register_protocol(&mut self, protocol: Box<dyn NetProtocol>) -> Result<()> {
        self.protocols.register(protocol)
    }

    /// Allocate a buffer for an outgoing payload of up to `len` bytes.
    pub fn alloc_pkb(&mut self, len: usize) -> Option<PacketBuffer> {
        self.pool.alloc_pkb(len)
    }

    /// Poll every device once and dispatch what they received.
    ///
    /// Within a device, frames reach their protocols in the order the hardware reported them.
    pub fn poll(&mut self) -> PollCounts {
        let mut counts = PollCounts::default();
        let mut rx = RxQueue::new();

        for (&id, netdev) in self.netdevs.devices.iter_mut() {
            netdev.ops.poll(self.pool.as_mut(), &mut rx);

            while let Some(mut pkb) = rx.pop_front() {
                counts.rx_frames += 1;

                let Some(header) = Ethernet::rx(&mut pkb) else {
                    counts.dropped += 1;
                    self.pool.free_pkb(pkb);
                    continue;
                };

                match self
                    .protocols
                    .dispatch(header.net_proto, pkb, id, header.source)
                {
                    Ok(()) => counts.delivered += 1,
                    Err(pkb) => {
                        counts.dropped += 1;
                        self.pool.free_pkb(pkb);
                    }
                }
            }
        }

        counts
    }

    /// Encapsulate `pkb` for `ll_dest` and transmit it on `netdev`.
    ///
    /// The buffer is consumed in every case. The result only reports failures that happen before
    /// the frame reaches the driver; what the driver does with the frame is its own business.
    pub fn transmit(
        &mut self,
        netdev: NetDeviceId,
        mut pkb: PacketBuffer,
        net_proto: u16,
        ll_dest: MacAddr,
    ) -> Result<()> {
        let Some(dev) = self.netdevs.devices.get_mut(&netdev) else {
            self.pool.free_pkb(pkb);
            return Err(NetError::UnknownDevice(netdev));
        };

        if let Err(err) = Ethernet::tx(&mut pkb, dev.ll_addr, ll_dest, net_proto) {
            debug!(%netdev, %err, "cannot encapsulate frame");
            self.pool.free_pkb(pkb);
            return Err(err.into());
        }

        dev.ops.transmit(pkb, self.pool.as_mut())
    }
}
