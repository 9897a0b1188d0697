use crate::api::{
    PnicCommand, PnicStatus, PNIC_REG_CMD, PNIC_REG_DATA, PNIC_REG_LEN, PNIC_REG_STAT,
};
use aero_port_io::PortIo;
use bitflags::bitflags;
use tracing::{error, warn};

bitflags! {
    /// Transport irregularities noticed during one transaction. None of them are fatal.
    #[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
    pub struct TransferAnomaly: u8 {
        /// An exact-length response came back with a different length.
        const LENGTH_MISMATCH = 1 << 0;
        /// The device offered more output than the caller's buffer holds.
        const OUTPUT_TRUNCATED = 1 << 1;
        /// The input payload did not fit the 16-bit `LEN` register.
        const INPUT_TRUNCATED = 1 << 2;
    }
}

/// Where a transaction's output goes.
#[derive(Debug)]
pub enum Output<'a> {
    /// No output expected; the device should report a zero length.
    None,
    /// Exactly `buf.len()` bytes expected.
    Exact(&'a mut [u8]),
    /// Up to `buf.len()` bytes; the actual count is in [`Response::transferred`].
    UpTo(&'a mut [u8]),
}

impl Output<'_> {
    fn capacity(&self) -> usize {
        match self {
            Output::None => 0,
            Output::Exact(buf) | Output::UpTo(buf) => buf.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub status: PnicStatus,
    /// Output length as reported by the device.
    pub declared_len: u16,
    /// Bytes actually copied into the caller's buffer.
    pub transferred: usize,
    pub anomalies: TransferAnomaly,
}

impl Response {
    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }
}

/// The four PNIC registers behind a port I/O handle.
///
/// Transactions are synchronous and have no timeout. The register protocol is not reentrant, so
/// each device must only ever have one `PnicRegs` issuing commands at a time.
#[derive(Debug)]
pub struct PnicRegs<IO> {
    io: IO,
    ioaddr: u16,
}

impl<IO: PortIo> PnicRegs<IO> {
    pub fn new(io: IO, ioaddr: u16) -> Self {
        Self { io, ioaddr }
    }

    pub fn ioaddr(&self) -> u16 {
        self.ioaddr
    }

    /// Run one command without logging a failed status.
    ///
    /// Transport anomalies are still reported. The status is returned as read; a failure is never
    /// turned into an error here.
    pub fn command_quiet(
        &mut self,
        command: PnicCommand,
        input: Option<&[u8]>,
        output: Output<'_>,
    ) -> Response {
        let mut anomalies = TransferAnomaly::empty();
        let cmd_port = self.ioaddr.wrapping_add(PNIC_REG_CMD);
        let stat_port = self.ioaddr.wrapping_add(PNIC_REG_STAT);
        let len_port = self.ioaddr.wrapping_add(PNIC_REG_LEN);
        let data_port = self.ioaddr.wrapping_add(PNIC_REG_DATA);

        if let Some(input) = input {
            let input = match u16::try_from(input.len()) {
                Ok(_) => input,
                Err(_) => {
                    warn!(
                        %command,
                        len = input.len(),
                        "input longer than the LEN register allows, truncating"
                    );
                    anomalies |= TransferAnomaly::INPUT_TRUNCATED;
                    &input[..usize::from(u16::MAX)]
                }
            };
            self.io.outw(len_port, input.len() as u16);
            for &byte in input {
                self.io.outb(data_port, byte);
            }
        }

        self.io.outw(cmd_port, command.0);

        let status = PnicStatus(self.io.inw(stat_port));
        let declared_len = self.io.inw(len_port);

        let capacity = output.capacity();
        if !matches!(output, Output::UpTo(_)) && usize::from(declared_len) != capacity {
            warn!(%command, expected = capacity, got = declared_len, "wrong data length returned");
            anomalies |= TransferAnomaly::LENGTH_MISMATCH;
        }

        let transferred = match output {
            Output::None => 0,
            Output::Exact(buf) | Output::UpTo(buf) => {
                let mut len = usize::from(declared_len);
                if len > buf.len() {
                    warn!(%command, have = buf.len(), need = len, "output buffer too small");
                    anomalies |= TransferAnomaly::OUTPUT_TRUNCATED;
                    len = buf.len();
                }
                for byte in &mut buf[..len] {
                    *byte = self.io.inb(data_port);
                }
                len
            }
        };

        Response {
            status,
            declared_len,
            transferred,
            anomalies,
        }
    }

    /// Like [`command_quiet`](Self::command_quiet), but a non-OK status is logged.
    pub fn command(
        &mut self,
        command: PnicCommand,
        input: Option<&[u8]>,
        output: Output<'_>,
    ) -> Response {
        let input_len = input.map_or(0, <[u8]>::len);
        let response = self.command_quiet(command, input, output);
        if !response.is_ok() {
            error!(%command, input_len, status = %response.status, "PNIC command failed");
        }
        response
    }
}
