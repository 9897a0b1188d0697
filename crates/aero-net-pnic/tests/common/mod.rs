#![allow(dead_code)]

use aero_net_pnic::model::{register_pnic, PnicModel, SharedPnicModel};
use aero_net_pnic::{PnicConfig, PnicDriver};
use aero_netdev::pci::{PciDevice, PciDriverTable};
use aero_netdev::{
    EthernetHeader, MacAddr, NetDeviceId, NetProtocol, NetStack, PacketBuffer, PkbAllocator,
    DEFAULT_PKB_HEADROOM,
};
use aero_port_io::IoPortBus;
use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

pub const PNIC_BASE: u16 = 0xc100;
pub const PEER: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x99]);

pub type SharedBus = Rc<RefCell<IoPortBus>>;

pub struct Harness {
    pub bus: SharedBus,
    pub model: SharedPnicModel,
}

impl Harness {
    pub fn new(model: PnicModel) -> Self {
        let model = model.into_shared();
        let mut bus = IoPortBus::new();
        register_pnic(&mut bus, PNIC_BASE, &model);
        Self {
            bus: Rc::new(RefCell::new(bus)),
            model,
        }
    }

    pub fn pci_device(&self) -> PciDevice<SharedBus> {
        PciDevice::new(0xfefe, 0xefef, PNIC_BASE, self.bus.clone())
    }
}

pub fn pnic_table(config: PnicConfig) -> PciDriverTable<SharedBus> {
    let mut table = PciDriverTable::new();
    table.register(Box::new(PnicDriver::new(config)));
    table
}

/// Heap allocator that counts traffic and can be told to run dry.
#[derive(Debug, Default)]
pub struct CountingPool {
    /// Successful allocations allowed before every further one fails.
    pub limit: Option<usize>,
    pub allocated: usize,
    pub failed: usize,
    pub freed: usize,
}

impl CountingPool {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Default::default()
        }
    }
}

impl PkbAllocator for CountingPool {
    fn alloc_pkb(&mut self, len: usize) -> Option<PacketBuffer> {
        if self.limit.is_some_and(|limit| self.allocated >= limit) {
            self.failed += 1;
            return None;
        }
        self.allocated += 1;
        Some(PacketBuffer::with_headroom(DEFAULT_PKB_HEADROOM, len))
    }

    fn free_pkb(&mut self, _pkb: PacketBuffer) {
        self.freed += 1;
    }
}

pub type SharedPool = Rc<RefCell<CountingPool>>;

pub fn stack_with_pool(pool: CountingPool) -> (NetStack, SharedPool) {
    let pool = Rc::new(RefCell::new(pool));
    (NetStack::new(Box::new(pool.clone())), pool)
}

pub type Received = Rc<RefCell<Vec<(Vec<u8>, NetDeviceId, MacAddr)>>>;

pub struct Recorder {
    pub net_proto: u16,
    pub received: Received,
}

impl NetProtocol for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn net_proto(&self) -> u16 {
        self.net_proto
    }

    fn rx(&mut self, pkb: PacketBuffer, netdev: NetDeviceId, ll_source: MacAddr) {
        self.received
            .borrow_mut()
            .push((pkb.data().to_vec(), netdev, ll_source));
    }
}

pub fn eth_frame(dest: MacAddr, source: MacAddr, net_proto: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = EthernetHeader {
        dest,
        source,
        net_proto,
    }
    .to_bytes()
    .to_vec();
    frame.extend_from_slice(payload);
    frame
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a thread-local subscriber and return what it logged, one event per line.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .finish();
    let out = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buffer.0.lock().unwrap()).into_owned();
    (out, logs)
}
