//! PNIC register map, command and status codes.
//!
//! The device exposes four 16-bit addressed registers starting at its I/O BAR. A transaction
//! streams an optional input payload through `LEN` + `DATA`, writes the command to `CMD`, then
//! reads back `STAT`, the output length from `LEN`, and the output payload from `DATA`.

use aero_netdev::pci::PciId;
use core::fmt;

pub const PNIC_REG_CMD: u16 = 0x00;
pub const PNIC_REG_STAT: u16 = 0x02;
pub const PNIC_REG_LEN: u16 = 0x04;
pub const PNIC_REG_DATA: u16 = 0x06;
/// Size of the decoded port window.
pub const PNIC_REG_NEXT: u16 = 0x08;

/// Interface revision this driver was written against (1.1).
pub const PNIC_API_VERSION: ApiVersion = ApiVersion(0x0101);

pub const PNIC_VENDOR_ID: u16 = 0xfefe;
pub const PNIC_DEVICE_ID: u16 = 0xefef;

pub static PNIC_PCI_IDS: [PciId; 1] = [PciId::new(
    PNIC_VENDOR_ID,
    PNIC_DEVICE_ID,
    "pnic",
    "Bochs Pseudo NIC Adaptor",
)];

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PnicCommand(pub u16);

impl PnicCommand {
    pub const NOOP: Self = Self(0x0000);
    pub const API_VER: Self = Self(0x0001);
    pub const READ_MAC: Self = Self(0x0002);
    pub const RESET: Self = Self(0x0003);
    pub const XMIT: Self = Self(0x0004);
    pub const RECV: Self = Self(0x0005);
    pub const RECV_QLEN: Self = Self(0x0006);
    pub const MASK_IRQ: Self = Self(0x0007);
    pub const FORCE_IRQ: Self = Self(0x0008);

    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::NOOP => "NOOP",
            Self::API_VER => "API_VER",
            Self::READ_MAC => "READ_MAC",
            Self::RESET => "RESET",
            Self::XMIT => "XMIT",
            Self::RECV => "RECV",
            Self::RECV_QLEN => "RECV_QLEN",
            Self::MASK_IRQ => "MASK_IRQ",
            Self::FORCE_IRQ => "FORCE_IRQ",
            _ => return None,
        })
    }
}

impl fmt::Display for PnicCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} ({:#06x})", self.0),
            None => write!(f, "{:#06x}", self.0),
        }
    }
}

impl fmt::Debug for PnicCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Value read back from `STAT` after a command. Anything other than [`PnicStatus::OK`] is a
/// failure; unknown codes are kept verbatim.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PnicStatus(pub u16);

impl PnicStatus {
    /// ASCII "OK".
    pub const OK: Self = Self(0x4f4b);
    pub const UNKNOWN_CMD: Self = Self(0xffff);

    pub fn is_ok(self) -> bool {
        self == Self::OK
    }
}

impl fmt::Display for PnicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::OK => f.write_str("OK"),
            Self::UNKNOWN_CMD => write!(f, "UNKNOWN_CMD ({:#06x})", self.0),
            Self(code) => write!(f, "{code:#06x}"),
        }
    }
}

impl fmt::Debug for PnicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Interface revision, major in the high byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion(pub u16);

impl ApiVersion {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self(((major as u16) << 8) | minor as u16)
    }

    pub const fn major(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn minor(self) -> u8 {
        self.0 as u8
    }

    pub fn from_le_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_le_bytes(bytes))
    }

    pub fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_version_splits_major_minor() {
        assert_eq!(PNIC_API_VERSION, ApiVersion::new(1, 1));
        assert_eq!(PNIC_API_VERSION.to_string(), "1.1");
        assert_eq!(ApiVersion(0x0102).to_string(), "1.2");
        assert_eq!(ApiVersion::from_le_bytes([0x01, 0x00]), ApiVersion(0x0001));
        assert!(ApiVersion(0x0001) < ApiVersion(0x0100));
    }

    #[test]
    fn codes_render_with_names() {
        assert_eq!(PnicCommand::RECV_QLEN.to_string(), "RECV_QLEN (0x0006)");
        assert_eq!(PnicCommand(0x0042).to_string(), "0x0042");
        assert_eq!(PnicStatus::OK.to_string(), "OK");
        assert_eq!(PnicStatus(0x1234).to_string(), "0x1234");
        assert!(!PnicStatus::UNKNOWN_CMD.is_ok());
    }
}
