use crate::api::{ApiVersion, PnicCommand, PnicStatus, PNIC_API_VERSION, PNIC_PCI_IDS};
use crate::command::{Output, PnicRegs};
use aero_netdev::pci::{PciDevice, PciDriver, PciId};
use aero_netdev::{
    MacAddr, NetDevice, NetDeviceOps, NetDeviceRegistry, NetError, PacketBuffer, PkbAllocator,
    RxQueue, ETH_ALEN, ETH_FRAME_LEN, ETH_HLEN,
};
use aero_port_io::PortIo;
use thiserror::Error;
use tracing::{debug, error, warn};

pub const DRIVER_NAME: &str = "pnic";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PnicConfig {
    /// API revision the driver expects the device to implement. A different revision is reported
    /// but tolerated.
    pub expected_api_version: ApiVersion,
    /// Size of the buffer allocated for each received frame.
    pub rx_frame_len: usize,
}

impl Default for PnicConfig {
    fn default() -> Self {
        Self {
            expected_api_version: PNIC_API_VERSION,
            rx_frame_len: ETH_FRAME_LEN,
        }
    }
}

#[derive(Debug, Error)]
pub enum PnicError {
    #[error("installation check failed with status {0}")]
    InstallationCheck(PnicStatus),

    #[error("receive frame length {0} cannot hold an Ethernet header")]
    RxFrameLen(usize),
}

impl From<PnicError> for NetError {
    fn from(err: PnicError) -> Self {
        NetError::DeviceUnusable {
            driver: DRIVER_NAME,
            reason: err.to_string(),
        }
    }
}

/// Outcome of comparing the device's API revision with the driver's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiCheck {
    pub device: ApiVersion,
    pub driver: ApiVersion,
}

impl ApiCheck {
    pub fn matches(&self) -> bool {
        self.device == self.driver
    }

    /// The device implements an older revision than the driver.
    pub fn needs_upgrade(&self) -> bool {
        self.device < self.driver
    }

    fn report(&self) {
        if !self.matches() {
            warn!(device = %self.device, driver = %self.driver, "PNIC API version mismatch");
        }
        if self.needs_upgrade() {
            warn!("PNIC API is older than the driver's, the emulator may need updating");
        }
    }
}

/// One bound PNIC.
#[derive(Debug)]
pub struct Pnic<IO> {
    regs: PnicRegs<IO>,
    ll_addr: MacAddr,
    api: ApiCheck,
    mac_status: PnicStatus,
    rx_frame_len: usize,
}

impl<IO: PortIo> Pnic<IO> {
    /// Check the device at `ioaddr` answers and read its MAC address.
    ///
    /// Only a failed installation check is fatal. An API mismatch is logged, and so is a failed MAC
    /// read, which leaves the address all zeroes.
    pub fn probe(io: IO, ioaddr: u16, config: &PnicConfig) -> Result<Self, PnicError> {
        if config.rx_frame_len < ETH_HLEN {
            return Err(PnicError::RxFrameLen(config.rx_frame_len));
        }

        let mut regs = PnicRegs::new(io, ioaddr);

        let mut version = [0u8; 2];
        let response =
            regs.command_quiet(PnicCommand::API_VER, None, Output::Exact(&mut version));
        if !response.is_ok() {
            error!(ioaddr, status = %response.status, "PNIC failed installation check");
            return Err(PnicError::InstallationCheck(response.status));
        }
        let api = ApiCheck {
            device: ApiVersion::from_le_bytes(version),
            driver: config.expected_api_version,
        };
        api.report();

        // A failed read is already logged by the noisy variant.
        let mut mac = [0u8; ETH_ALEN];
        let mac_status = regs
            .command(PnicCommand::READ_MAC, None, Output::Exact(&mut mac))
            .status;

        Ok(Self {
            regs,
            ll_addr: MacAddr(mac),
            api,
            mac_status,
            rx_frame_len: config.rx_frame_len,
        })
    }

    pub fn ll_addr(&self) -> MacAddr {
        self.ll_addr
    }

    pub fn api_check(&self) -> ApiCheck {
        self.api
    }

    pub fn mac_status(&self) -> PnicStatus {
        self.mac_status
    }

    pub fn ioaddr(&self) -> u16 {
        self.regs.ioaddr()
    }

    fn rx_qlen(&mut self) -> Option<u16> {
        let mut qlen = [0u8; 2];
        self.regs
            .command(PnicCommand::RECV_QLEN, None, Output::Exact(&mut qlen))
            .is_ok()
            .then(|| u16::from_le_bytes(qlen))
    }
}

impl<IO: PortIo> NetDeviceOps for Pnic<IO> {
    fn poll(&mut self, pool: &mut dyn PkbAllocator, rx: &mut RxQueue) {
        while let Some(qlen) = self.rx_qlen() {
            if qlen == 0 {
                break;
            }
            let Some(mut pkb) = pool.alloc_pkb(self.rx_frame_len) else {
                debug!(qlen, "no packet buffer, leaving frames queued on the device");
                break;
            };

            let room = pkb.tailroom().min(self.rx_frame_len);
            let response = self.regs.command(
                PnicCommand::RECV,
                None,
                Output::UpTo(&mut pkb.tailroom_mut()[..room]),
            );
            if !response.is_ok() {
                pool.free_pkb(pkb);
                break;
            }

            match pkb.put(response.transferred) {
                Ok(_) => rx.push_back(pkb),
                Err(err) => {
                    warn!(%err, "received frame does not fit its buffer");
                    pool.free_pkb(pkb);
                    break;
                }
            }
        }
    }

    /// The device's answer is logged but not reported: the buffer is gone either way and there is
    /// no retry path.
    fn transmit(
        &mut self,
        pkb: PacketBuffer,
        pool: &mut dyn PkbAllocator,
    ) -> aero_netdev::Result<()> {
        self.regs.command(PnicCommand::XMIT, Some(pkb.data()), Output::None);
        pool.free_pkb(pkb);
        Ok(())
    }
}

/// PCI glue: binds [`Pnic`]s to the PNIC id table.
#[derive(Debug, Clone, Default)]
pub struct PnicDriver {
    config: PnicConfig,
}

impl PnicDriver {
    pub fn new(config: PnicConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PnicConfig {
        &self.config
    }
}

impl<IO: PortIo + Clone + 'static> PciDriver<IO> for PnicDriver {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn ids(&self) -> &[PciId] {
        &PNIC_PCI_IDS
    }

    fn probe(
        &self,
        pci: &mut PciDevice<IO>,
        _id: &PciId,
        netdevs: &mut NetDeviceRegistry,
    ) -> aero_netdev::Result<()> {
        let pnic = Pnic::probe(pci.io.clone(), pci.ioaddr, &self.config)?;
        let ll_addr = pnic.ll_addr();
        let netdev = netdevs.register(NetDevice::new(DRIVER_NAME, ll_addr, Box::new(pnic)));
        pci.set_drvdata(netdev);
        Ok(())
    }

    fn remove(&self, pci: &mut PciDevice<IO>, netdevs: &mut NetDeviceRegistry) {
        if let Some(netdev) = pci.take_drvdata() {
            netdevs.unregister(netdev);
        }
        // Best effort; a failure is logged and nothing more can be done.
        PnicRegs::new(pci.io.clone(), pci.ioaddr).command(PnicCommand::RESET, None, Output::None);
    }
}
