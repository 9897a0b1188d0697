mod common;

use aero_net_pnic::api::PNIC_REG_LEN;
use aero_net_pnic::model::PnicModel;
use aero_net_pnic::{Output, PnicCommand, PnicRegs, PnicStatus, TransferAnomaly};
use aero_netdev::MacAddr;
use aero_port_io::PortIo;
use common::{capture_logs, Harness, PNIC_BASE};
use proptest::prelude::*;

#[test]
fn read_mac_fills_exact_buffer() {
    let mac = MacAddr([0x52, 0x54, 0x00, 0xaa, 0xbb, 0xcc]);
    let harness = Harness::new(PnicModel::new(mac));
    let mut regs = PnicRegs::new(harness.bus.clone(), PNIC_BASE);

    let mut buf = [0u8; 6];
    let response = regs.command(PnicCommand::READ_MAC, None, Output::Exact(&mut buf));
    assert!(response.is_ok());
    assert_eq!(response.declared_len, 6);
    assert_eq!(response.transferred, 6);
    assert!(response.anomalies.is_empty());
    assert_eq!(MacAddr(buf), mac);
}

#[test]
fn unexpected_output_for_exactless_command_is_only_a_warning() {
    let harness = Harness::new(PnicModel::default());
    harness.model.borrow_mut().override_len(PnicCommand::NOOP, 3);
    let mut regs = PnicRegs::new(harness.bus.clone(), PNIC_BASE);

    let (response, logs) = capture_logs(|| regs.command(PnicCommand::NOOP, None, Output::None));
    assert_eq!(response.status, PnicStatus::OK);
    assert_eq!(response.anomalies, TransferAnomaly::LENGTH_MISMATCH);
    assert_eq!(response.transferred, 0);
    assert!(logs.contains("wrong data length returned"), "{logs}");
}

#[test]
fn noisy_variant_logs_failures_quiet_variant_does_not() {
    let harness = Harness::new(PnicModel::default());
    let mut regs = PnicRegs::new(harness.bus.clone(), PNIC_BASE);

    let (quiet, quiet_logs) =
        capture_logs(|| regs.command_quiet(PnicCommand(0x00f0), None, Output::None));
    let (noisy, noisy_logs) =
        capture_logs(|| regs.command(PnicCommand(0x00f0), None, Output::None));

    assert_eq!(quiet.status, PnicStatus::UNKNOWN_CMD);
    assert_eq!(noisy.status, PnicStatus::UNKNOWN_CMD);
    assert!(!quiet_logs.contains("PNIC command failed"), "{quiet_logs}");
    assert!(noisy_logs.contains("PNIC command failed"), "{noisy_logs}");
}

#[test]
fn oversized_input_is_truncated_to_len_register() {
    let harness = Harness::new(PnicModel::default());
    let mut regs = PnicRegs::new(harness.bus.clone(), PNIC_BASE);

    let input = vec![0x5a; usize::from(u16::MAX) + 10];
    let response = regs.command(PnicCommand::XMIT, Some(&input), Output::None);
    assert!(response.is_ok());
    assert_eq!(response.anomalies, TransferAnomaly::INPUT_TRUNCATED);

    let model = harness.model.borrow();
    assert_eq!(model.tx_frames().len(), 1);
    assert_eq!(model.tx_frames()[0].len(), usize::from(u16::MAX));
}

#[test]
fn registers_sit_at_their_offsets() {
    let harness = Harness::new(PnicModel::default());
    harness.model.borrow_mut().inject_rx(vec![1, 2, 3]);

    let mut regs = PnicRegs::new(harness.bus.clone(), PNIC_BASE);
    let mut qlen = [0u8; 2];
    regs.command(PnicCommand::RECV_QLEN, None, Output::Exact(&mut qlen));
    assert_eq!(u16::from_le_bytes(qlen), 1);

    // LEN still holds the last output length.
    assert_eq!(harness.bus.clone().inw(PNIC_BASE + PNIC_REG_LEN), 2);
}

proptest! {
    #[test]
    fn output_is_clamped_to_capacity(
        frame in proptest::collection::vec(any::<u8>(), 0..256),
        declared in proptest::option::of(0u16..512),
        capacity in 0usize..300,
    ) {
        let harness = Harness::new(PnicModel::default());
        {
            let mut model = harness.model.borrow_mut();
            model.inject_rx(frame.clone());
            if let Some(len) = declared {
                model.override_len(PnicCommand::RECV, len);
            }
        }
        let declared_len = declared.unwrap_or(frame.len() as u16);
        let mut regs = PnicRegs::new(harness.bus.clone(), PNIC_BASE);

        let mut buf = vec![0xEEu8; capacity];
        let response = regs.command_quiet(PnicCommand::RECV, None, Output::UpTo(&mut buf));

        let expected = usize::from(declared_len).min(capacity);
        prop_assert_eq!(response.status, PnicStatus::OK);
        prop_assert_eq!(response.declared_len, declared_len);
        prop_assert_eq!(response.transferred, expected);
        prop_assert_eq!(
            response.anomalies.contains(TransferAnomaly::OUTPUT_TRUNCATED),
            usize::from(declared_len) > capacity
        );
        prop_assert!(!response.anomalies.contains(TransferAnomaly::LENGTH_MISMATCH));

        // Bytes past what the device really had read back as zero.
        for (i, &byte) in buf[..expected].iter().enumerate() {
            prop_assert_eq!(byte, frame.get(i).copied().unwrap_or(0));
        }
        prop_assert!(buf[expected..].iter().all(|&b| b == 0xEE));
    }
}
