//! Driver for the Bochs pseudo NIC (PNIC), plus an emulated PNIC to run it against.
//!
//! The PNIC is a paravirtual Ethernet adapter with a command/response interface over four I/O
//! registers (see [`api`]). [`command::PnicRegs`] runs single transactions;
//! [`Pnic`] builds the device lifecycle, the receive drain and the transmit path on top of it and
//! plugs into `aero-netdev` through [`aero_netdev::NetDeviceOps`] and [`PnicDriver`].
//!
//! [`model::PnicModel`] is the device side of the same protocol, for tests and for hosting the
//! driver on an [`aero_port_io::IoPortBus`].
#![forbid(unsafe_code)]

pub mod api;
pub mod command;
pub mod model;

mod driver;

pub use api::{ApiVersion, PnicCommand, PnicStatus, PNIC_API_VERSION};
pub use command::{Output, PnicRegs, Response, TransferAnomaly};
pub use driver::{ApiCheck, Pnic, PnicConfig, PnicDriver, PnicError, DRIVER_NAME};
