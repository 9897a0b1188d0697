//! Link-layer plumbing shared by Aero's guest-side NIC drivers.
//!
//! A driver binds to hardware through the [`pci::PciDriverTable`], installs its hooks on a
//! [`NetDevice`] via the [`NetDeviceOps`] trait and registers it with the [`NetStack`]. From then
//! on the stack owns the device:
//!
//! - [`NetStack::poll`] asks every device to drain its receive queue, strips the Ethernet header
//!   from each frame and hands the payload to the [`NetProtocol`] registered for its EtherType.
//! - [`NetStack::transmit`] prepends the Ethernet header for an upper-layer protocol and passes the
//!   frame to the device's transmit hook.
//!
//! Packet storage comes from a [`PkbAllocator`]; buffers are [`PacketBuffer`]s with head room so
//! headers can be prepended without copying the payload.
#![forbid(unsafe_code)]

mod error;
mod mac;
mod netdevice;
mod pkb;
mod protocol;

pub mod ethernet;
pub mod pci;

pub use error::{NetError, Result};
pub use ethernet::{Ethernet, EthernetHeader, ETH_ALEN, ETH_FRAME_LEN, ETH_HLEN};
pub use mac::MacAddr;
pub use netdevice::{
    NetDevice, NetDeviceId, NetDeviceOps, NetDeviceRegistry, NetStack, PollCounts, RxQueue,
};
pub use pkb::{HeapPkbAllocator, PacketBuffer, PkbAllocator, PkbError, DEFAULT_PKB_HEADROOM};
pub use protocol::{NetProtocol, NetProtocolRegistry};
