//! 16-bit x86-style port I/O.
//!
//! Two sides of the same address space live here:
//!
//! - [`PortIoDevice`] / [`IoPortBus`]: the *device* side. Emulated hardware registers a handler for
//!   a contiguous port window and the bus dispatches `in`/`out` accesses to it.
//! - [`PortIo`]: the *driver* side. Drivers only ever issue byte and word accesses through this
//!   trait, so the same driver code runs against real ports or against an [`IoPortBus`] populated
//!   with device models in tests.
#![forbid(unsafe_code)]

mod access;
mod bus;

pub use access::PortIo;
pub use bus::{IoPortBus, PortIoDevice};
