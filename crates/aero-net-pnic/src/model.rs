//! Emulated PNIC, the device side of the register protocol.
//!
//! The model mirrors what Bochs exposes: a host-side receive queue the guest drains with
//! `RECV_QLEN`/`RECV`, and a transmit sink fed by `XMIT`. The host harness reaches into the model
//! to inject frames, collect transmitted ones, and provoke failures.
//!
//! ```text
//! guest driver --PortIo--> IoPortBus --PortIoDevice--> PnicPorts --> Rc<RefCell<PnicModel>>
//! ```

use crate::api::{
    ApiVersion, PnicCommand, PnicStatus, PNIC_API_VERSION, PNIC_REG_CMD, PNIC_REG_DATA,
    PNIC_REG_LEN, PNIC_REG_NEXT, PNIC_REG_STAT,
};
use aero_netdev::MacAddr;
use aero_port_io::{IoPortBus, PortIoDevice};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use tracing::trace;

pub type SharedPnicModel = Rc<RefCell<PnicModel>>;

#[derive(Debug)]
pub struct PnicModel {
    api_version: ApiVersion,
    mac: MacAddr,
    rx_queue: VecDeque<Vec<u8>>,
    tx_frames: Vec<Vec<u8>>,
    irq_masked: bool,

    input: Vec<u8>,
    status: PnicStatus,
    output: Vec<u8>,
    output_len: u16,
    output_pos: usize,

    forced_status: HashMap<PnicCommand, PnicStatus>,
    len_override: HashMap<PnicCommand, u16>,
    executed: HashMap<PnicCommand, usize>,
}

impl Default for PnicModel {
    fn default() -> Self {
        Self::new(MacAddr([0x52, 0x54, 0x00, 0x12, 0x34, 0x56]))
    }
}

impl PnicModel {
    pub fn new(mac: MacAddr) -> Self {
        Self {
            api_version: PNIC_API_VERSION,
            mac,
            rx_queue: VecDeque::new(),
            tx_frames: Vec::new(),
            irq_masked: true,
            input: Vec::new(),
            status: PnicStatus::OK,
            output: Vec::new(),
            output_len: 0,
            output_pos: 0,
            forced_status: HashMap::new(),
            len_override: HashMap::new(),
            executed: HashMap::new(),
        }
    }

    pub fn into_shared(self) -> SharedPnicModel {
        Rc::new(RefCell::new(self))
    }

    pub fn set_api_version(&mut self, version: ApiVersion) {
        self.api_version = version;
    }

    pub fn set_mac(&mut self, mac: MacAddr) {
        self.mac = mac;
    }

    /// Queue a frame for the guest to receive.
    pub fn inject_rx(&mut self, frame: impl Into<Vec<u8>>) {
        self.rx_queue.push_back(frame.into());
    }

    pub fn rx_pending(&self) -> usize {
        self.rx_queue.len()
    }

    pub fn tx_frames(&self) -> &[Vec<u8>] {
        &self.tx_frames
    }

    pub fn take_tx_frames(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.tx_frames)
    }

    pub fn irq_masked(&self) -> bool {
        self.irq_masked
    }

    /// Answer every later `command` with `status` instead of executing it. The command produces no
    /// output while forced.
    pub fn force_status(&mut self, command: PnicCommand, status: PnicStatus) {
        self.forced_status.insert(command, status);
    }

    pub fn clear_forced_status(&mut self, command: PnicCommand) {
        self.forced_status.remove(&command);
    }

    /// Report `len` in `LEN` after `command`, whatever the real output length is. Reads past the
    /// real output return zero.
    pub fn override_len(&mut self, command: PnicCommand, len: u16) {
        self.len_override.insert(command, len);
    }

    pub fn clear_len_override(&mut self, command: PnicCommand) {
        self.len_override.remove(&command);
    }

    /// How many times `command` was written to `CMD`.
    pub fn executed(&self, command: PnicCommand) -> usize {
        self.executed.get(&command).copied().unwrap_or(0)
    }

    /// Handle a write of `value` to register `offset`.
    pub fn write_reg(&mut self, offset: u16, value: u16) {
        match offset {
            PNIC_REG_CMD => self.execute(PnicCommand(value)),
            PNIC_REG_LEN => {
                // Starts a new input payload.
                self.input.clear();
                self.input.reserve(usize::from(value));
            }
            PNIC_REG_DATA => self.input.push(value as u8),
            _ => {}
        }
    }

    /// Handle a read of register `offset`.
    pub fn read_reg(&mut self, offset: u16) -> u16 {
        match offset {
            PNIC_REG_STAT => self.status.0,
            PNIC_REG_LEN => self.output_len,
            PNIC_REG_DATA => {
                let byte = self.output.get(self.output_pos).copied().unwrap_or(0);
                self.output_pos += 1;
                u16::from(byte)
            }
            _ => 0,
        }
    }

    /// Device state cleared by the `RESET` command.
    fn reset_state(&mut self) {
        self.rx_queue.clear();
        self.irq_masked = true;
    }

    /// Return to the power-on state, register latches included.
    ///
    /// Host-side hooks stay in place: forced statuses, length overrides, command counts and
    /// transmitted frames.
    pub fn power_on_reset(&mut self) {
        self.reset_state();
        self.input.clear();
        self.status = PnicStatus::OK;
        self.output.clear();
        self.output_len = 0;
        self.output_pos = 0;
    }

    fn execute(&mut self, command: PnicCommand) {
        *self.executed.entry(command).or_insert(0) += 1;
        let input = std::mem::take(&mut self.input);
        self.output.clear();
        self.output_pos = 0;

        let status = match self.forced_status.get(&command) {
            Some(&status) => status,
            None => self.run(command, input),
        };
        self.status = status;
        self.output_len = match self.len_override.get(&command) {
            Some(&len) => len,
            None => self.output.len() as u16,
        };
        trace!(%command, %status, output_len = self.output_len, "pnic model executed command");
    }

    fn run(&mut self, command: PnicCommand, input: Vec<u8>) -> PnicStatus {
        match command {
            PnicCommand::NOOP => {}
            PnicCommand::API_VER => {
                self.output.extend_from_slice(&self.api_version.to_le_bytes());
            }
            PnicCommand::READ_MAC => self.output.extend_from_slice(&self.mac.0),
            PnicCommand::RESET => self.reset_state(),
            PnicCommand::XMIT => self.tx_frames.push(input),
            PnicCommand::RECV => {
                if let Some(frame) = self.rx_queue.pop_front() {
                    self.output = frame;
                }
            }
            PnicCommand::RECV_QLEN => {
                let qlen = u16::try_from(self.rx_queue.len()).unwrap_or(u16::MAX);
                self.output.extend_from_slice(&qlen.to_le_bytes());
            }
            PnicCommand::MASK_IRQ => {
                if let Some(&mask) = input.first() {
                    self.irq_masked = mask != 0;
                }
            }
            PnicCommand::FORCE_IRQ => {}
            _ => return PnicStatus::UNKNOWN_CMD,
        }
        PnicStatus::OK
    }
}

/// Port-window adapter mapping a [`PnicModel`] onto an [`IoPortBus`].
pub struct PnicPorts {
    base: u16,
    model: SharedPnicModel,
}

impl PnicPorts {
    pub fn new(base: u16, model: SharedPnicModel) -> Self {
        Self { base, model }
    }
}

impl PortIoDevice for PnicPorts {
    fn read(&mut self, port: u16, size: u8) -> u32 {
        let value = self.model.borrow_mut().read_reg(port.wrapping_sub(self.base));
        match size {
            1 => u32::from(value & 0xff),
            _ => u32::from(value),
        }
    }

    fn write(&mut self, port: u16, _size: u8, value: u32) {
        self.model
            .borrow_mut()
            .write_reg(port.wrapping_sub(self.base), value as u16);
    }

    fn reset(&mut self) {
        self.model.borrow_mut().power_on_reset();
    }
}

/// Map `model` over `[base, base + PNIC_REG_NEXT)` on `bus`.
pub fn register_pnic(bus: &mut IoPortBus, base: u16, model: &SharedPnicModel) {
    bus.register_range(base, PNIC_REG_NEXT, Box::new(PnicPorts::new(base, model.clone())));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(model: &mut PnicModel, command: PnicCommand, input: &[u8]) -> (PnicStatus, Vec<u8>) {
        model.write_reg(PNIC_REG_LEN, input.len() as u16);
        for &b in input {
            model.write_reg(PNIC_REG_DATA, u16::from(b));
        }
        model.write_reg(PNIC_REG_CMD, command.0);
        let status = PnicStatus(model.read_reg(PNIC_REG_STAT));
        let len = model.read_reg(PNIC_REG_LEN);
        let out = (0..len).map(|_| model.read_reg(PNIC_REG_DATA) as u8).collect();
        (status, out)
    }

    #[test]
    fn receive_queue_drains_in_order() {
        let mut model = PnicModel::default();
        model.inject_rx(b"one".to_vec());
        model.inject_rx(b"two".to_vec());

        assert_eq!(run(&mut model, PnicCommand::RECV_QLEN, &[]).1, vec![2, 0]);
        assert_eq!(run(&mut model, PnicCommand::RECV, &[]).1, b"one");
        assert_eq!(run(&mut model, PnicCommand::RECV, &[]).1, b"two");
        assert_eq!(run(&mut model, PnicCommand::RECV_QLEN, &[]).1, vec![0, 0]);
    }

    #[test]
    fn xmit_captures_input_payload() {
        let mut model = PnicModel::default();
        let (status, out) = run(&mut model, PnicCommand::XMIT, b"frame");
        assert_eq!(status, PnicStatus::OK);
        assert!(out.is_empty());
        assert_eq!(model.tx_frames(), &[b"frame".to_vec()]);
        assert_eq!(model.executed(PnicCommand::XMIT), 1);
    }

    #[test]
    fn unknown_and_forced_commands_fail() {
        let mut model = PnicModel::default();
        assert_eq!(
            run(&mut model, PnicCommand(0x77), &[]).0,
            PnicStatus::UNKNOWN_CMD
        );

        model.force_status(PnicCommand::READ_MAC, PnicStatus(0x0bad));
        assert_eq!(
            run(&mut model, PnicCommand::READ_MAC, &[]),
            (PnicStatus(0x0bad), Vec::new())
        );
        model.clear_forced_status(PnicCommand::READ_MAC);
        assert_eq!(run(&mut model, PnicCommand::READ_MAC, &[]).1, model.mac.0);
    }

    #[test]
    fn mask_irq_and_reset() {
        let mut model = PnicModel::default();
        run(&mut model, PnicCommand::MASK_IRQ, &[0]);
        assert!(!model.irq_masked());

        model.inject_rx(vec![0u8; 60]);
        run(&mut model, PnicCommand::RESET, &[]);
        assert_eq!(model.rx_pending(), 0);
        assert!(model.irq_masked());
    }

    #[test]
    fn bus_reset_returns_to_power_on_state() {
        const BASE: u16 = 0xc100;
        let model = PnicModel::default().into_shared();
        let mut bus = IoPortBus::new();
        register_pnic(&mut bus, BASE, &model);

        bus.write(BASE + PNIC_REG_LEN, 2, 1);
        bus.write(BASE + PNIC_REG_DATA, 1, 0);
        bus.write(BASE + PNIC_REG_CMD, 2, u32::from(PnicCommand::MASK_IRQ.0));
        assert!(!model.borrow().irq_masked());

        model.borrow_mut().inject_rx(vec![0u8; 60]);
        bus.write(BASE + PNIC_REG_CMD, 2, u32::from(PnicCommand::READ_MAC.0));
        assert_eq!(bus.read(BASE + PNIC_REG_LEN, 2), 6);

        bus.reset();
        {
            let model = model.borrow();
            assert!(model.irq_masked());
            assert_eq!(model.rx_pending(), 0);
            // Host-side counters survive.
            assert_eq!(model.executed(PnicCommand::MASK_IRQ), 1);
        }
        assert_eq!(bus.read(BASE + PNIC_REG_STAT, 2), u32::from(PnicStatus::OK.0));
        assert_eq!(bus.read(BASE + PNIC_REG_LEN, 2), 0);
        assert_eq!(bus.read(BASE + PNIC_REG_DATA, 1), 0);
    }
}
