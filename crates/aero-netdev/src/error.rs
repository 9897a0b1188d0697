use crate::{NetDeviceId, PkbError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NetError>;

/// Errors surfaced by device binding and the network-device / protocol registries.
///
/// Per-frame conditions (short frames, unknown EtherTypes, allocation backpressure) are handled
/// where they occur and never show up here.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("network protocol {net_proto:#06x} is already registered")]
    DuplicateProtocol { net_proto: u16 },

    #[error("no network device with id {0}")]
    UnknownDevice(NetDeviceId),

    #[error("no driver for PCI device {vendor:04x}:{device:04x}")]
    NoDriver { vendor: u16, device: u16 },

    #[error("PCI device {vendor:04x}:{device:04x} is already bound to a driver")]
    AlreadyBound { vendor: u16, device: u16 },

    /// Bring-up failed before the device was registered; all partially acquired state has been
    /// released.
    #[error("{driver}: device not usable: {reason}")]
    DeviceUnusable { driver: &'static str, reason: String },

    #[error(transparent)]
    Pkb(#[from] PkbError),
}
