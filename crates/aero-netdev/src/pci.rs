//! Runtime PCI driver binding.
//!
//! Drivers register with a [`PciDriverTable`] at start-up. The bus enumerator builds a
//! [`PciDevice`] for every function it finds and calls [`PciDriverTable::probe_device`]; the
//! table picks the driver whose id table matches and lets it bring the device up.

use crate::{NetDeviceId, NetDeviceRegistry, NetError, Result};
use tracing::{debug, info};

/// One entry of a driver's id table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PciId {
    pub vendor_id: u16,
    pub device_id: u16,
    pub name: &'static str,
    pub description: &'static str,
}

impl PciId {
    pub const fn new(
        vendor_id: u16,
        device_id: u16,
        name: &'static str,
        description: &'static str,
    ) -> Self {
        Self {
            vendor_id,
            device_id,
            name,
            description,
        }
    }

    pub fn matches(&self, vendor_id: u16, device_id: u16) -> bool {
        self.vendor_id == vendor_id && self.device_id == device_id
    }
}

/// A discovered PCI function with an I/O port window.
///
/// `io` is the handle drivers use to reach the function's ports. Drivers that keep talking to the
/// device after probe clone it, so it is usually a cheap shared handle.
#[derive(Debug)]
pub struct PciDevice<IO> {
    pub vendor_id: u16,
    pub device_id: u16,
    /// Base of the I/O BAR.
    pub ioaddr: u16,
    pub io: IO,
    drvdata: Option<NetDeviceId>,
    driver: Option<usize>,
}

impl<IO> PciDevice<IO> {
    pub fn new(vendor_id: u16, device_id: u16, ioaddr: u16, io: IO) -> Self {
        Self {
            vendor_id,
            device_id,
            ioaddr,
            io,
            drvdata: None,
            driver: None,
        }
    }

    /// Network device the bound driver created for this function.
    pub fn drvdata(&self) -> Option<NetDeviceId> {
        self.drvdata
    }

    pub fn set_drvdata(&mut self, netdev: NetDeviceId) {
        self.drvdata = Some(netdev);
    }

    pub fn take_drvdata(&mut self) -> Option<NetDeviceId> {
        self.drvdata.take()
    }

    pub fn is_bound(&self) -> bool {
        self.driver.is_some()
    }
}

pub trait PciDriver<IO> {
    fn name(&self) -> &'static str;

    fn ids(&self) -> &[PciId];

    /// Bring up `pci`, registering whatever it exposes with `netdevs`.
    ///
    /// On error nothing may remain registered.
    fn probe(&self, pci: &mut PciDevice<IO>, id: &PciId, netdevs: &mut NetDeviceRegistry)
        -> Result<()>;

    fn remove(&self, pci: &mut PciDevice<IO>, netdevs: &mut NetDeviceRegistry);
}

pub struct PciDriverTable<IO> {
    drivers: Vec<Box<dyn PciDriver<IO>>>,
}

impl<IO> Default for PciDriverTable<IO> {
    fn default() -> Self {
        Self {
            drivers: Vec::new(),
        }
    }
}

impl<IO> PciDriverTable<IO> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, driver: Box<dyn PciDriver<IO>>) {
        debug!(driver = driver.name(), ids = driver.ids().len(), "registered PCI driver");
        self.drivers.push(driver);
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    /// First driver (in registration order) claiming `vendor_id:device_id`.
    pub fn find(&self, vendor_id: u16, device_id: u16) -> Option<(usize, PciId)> {
        self.drivers.iter().enumerate().find_map(|(idx, driver)| {
            driver
                .ids()
                .iter()
                .find(|id| id.matches(vendor_id, device_id))
                .map(|id| (idx, *id))
        })
    }

    pub fn probe_device(
        &self,
        pci: &mut PciDevice<IO>,
        netdevs: &mut NetDeviceRegistry,
    ) -> Result<()> {
        let (vendor, device) = (pci.vendor_id, pci.device_id);
        if pci.is_bound() {
            return Err(NetError::AlreadyBound { vendor, device });
        }
        let (idx, id) = self
            .find(vendor, device)
            .ok_or(NetError::NoDriver { vendor, device })?;

        let driver = &self.drivers[idx];
        info!(
            driver = driver.name(),
            "{vendor:04x}:{device:04x} ({}) at {:#06x}",
            id.description,
            pci.ioaddr
        );
        driver.probe(pci, &id, netdevs)?;
        pci.driver = Some(idx);
        Ok(())
    }

    /// Unbind `pci` from its driver. Does nothing for an unbound device.
    pub fn remove_device(&self, pci: &mut PciDevice<IO>, netdevs: &mut NetDeviceRegistry) {
        let Some(idx) = pci.driver.take() else {
            return;
        };
        if let Some(driver) = self.drivers.get(idx) {
            driver.remove(pci, netdevs);
        }
    }
}
