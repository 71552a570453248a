//! Engine phase-order, bit-order and acknowledge properties, checked both on the
//! bare engine and through the clocked testbench.

#![allow(clippy::pedantic, clippy::nursery, clippy::too_many_lines)]

use futures as _;
use i2c_core::{
    AckPolicy, Direction, DriverStrategy, EngineInputs, EngineOutputs, GeneratorConfig,
    MemoryTrace, ProtocolEngine, ProtocolState, SimConfig, Testbench, TransactionOutcome,
    TransactionPacket, NACK_TRANSACTION_EDGES, TRANSACTION_EDGES,
};
use proptest::prelude::*;
use rand as _;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use tempfile as _;
use thiserror as _;
use tracing as _;

const fn bit(value: u8, index: u8) -> bool {
    (value >> index) & 1 == 1
}

fn bits_msb_first(value: u8, width: u8) -> Vec<bool> {
    (0..width).rev().map(|index| bit(value, index)).collect()
}

fn acknowledged_phase_order() -> Vec<ProtocolState> {
    let mut states = vec![ProtocolState::Start];
    states.extend([ProtocolState::Address; 7]);
    states.extend([ProtocolState::Direction, ProtocolState::AddrAck]);
    states.extend([ProtocolState::Data; 8]);
    states.extend([ProtocolState::DataAck, ProtocolState::Stop]);
    states
}

/// Drives the bare engine from IDLE back to IDLE, playing the slave side.
fn run_engine(
    engine: &mut ProtocolEngine,
    packet: TransactionPacket,
    address_ack: bool,
) -> Vec<EngineOutputs> {
    let request = EngineInputs {
        address: packet.address(),
        data_byte: packet.data(),
        direction: packet.direction(),
        ..EngineInputs::default()
    };
    let mut outputs = vec![engine.step(&request)];
    while engine.state() != ProtocolState::Idle {
        let data_line = match engine.state() {
            ProtocolState::AddrAck => !address_ack,
            ProtocolState::DataAck => false,
            ProtocolState::Data if packet.direction() == Direction::Read => {
                bit(packet.data(), engine.data_bit_index())
            }
            _ => true,
        };
        outputs.push(engine.step(&EngineInputs {
            data_line,
            ..request
        }));
    }
    outputs
}

fn driven_in(outputs: &[EngineOutputs], state: ProtocolState) -> Vec<bool> {
    outputs
        .iter()
        .filter(|out| out.executed == state && out.data_drive_enable)
        .map(|out| out.data_out)
        .collect()
}

fn single_packet_config(
    strategy: DriverStrategy,
    packet: TransactionPacket,
    ack_policy: AckPolicy,
) -> SimConfig {
    SimConfig {
        strategy,
        iterations: Some(1),
        generator: GeneratorConfig::fixed(vec![packet]),
        ack_policy,
        ..SimConfig::default()
    }
}

fn packet_strategy() -> impl Strategy<Value = TransactionPacket> {
    (1u8..=0x7F, any::<u8>(), any::<bool>()).prop_map(|(address, data, read)| {
        TransactionPacket::new(address, data, Direction::from_bit(read)).expect("7-bit address")
    })
}

proptest! {
    #[test]
    fn acknowledged_transfers_take_twenty_steps_in_phase_order(packet in packet_strategy()) {
        let mut engine = ProtocolEngine::new();
        let outputs = run_engine(&mut engine, packet, true);

        prop_assert_eq!(outputs[0].executed, ProtocolState::Idle);
        let states: Vec<_> = outputs[1..].iter().map(|out| out.executed).collect();
        prop_assert_eq!(states.len() as u64, TRANSACTION_EDGES);
        prop_assert_eq!(states, acknowledged_phase_order());
    }

    #[test]
    fn address_and_direction_are_driven_msb_first(packet in packet_strategy()) {
        let mut engine = ProtocolEngine::new();
        let outputs = run_engine(&mut engine, packet, true);

        prop_assert_eq!(
            driven_in(&outputs, ProtocolState::Address),
            bits_msb_first(packet.address(), 7)
        );
        prop_assert_eq!(
            driven_in(&outputs, ProtocolState::Direction),
            vec![packet.direction().as_bit()]
        );
    }

    #[test]
    fn data_phase_drives_writes_and_captures_reads(packet in packet_strategy()) {
        let mut engine = ProtocolEngine::new();
        let outputs = run_engine(&mut engine, packet, true);
        let data_steps: Vec<_> = outputs
            .iter()
            .filter(|out| out.executed == ProtocolState::Data)
            .collect();

        match packet.direction() {
            Direction::Write => {
                prop_assert_eq!(
                    driven_in(&outputs, ProtocolState::Data),
                    bits_msb_first(packet.data(), 8)
                );
                prop_assert_eq!(engine.captured_byte(), 0);
            }
            Direction::Read => {
                prop_assert!(data_steps.iter().all(|out| !out.data_drive_enable));
                prop_assert_eq!(engine.captured_byte(), packet.data());
            }
        }
    }

    #[test]
    fn address_nack_aborts_to_stop_without_commit(
        packet in packet_strategy(),
        previous in any::<u8>(),
    ) {
        let mut engine = ProtocolEngine::new();
        let seed = TransactionPacket::new(0x01, previous, Direction::Read).expect("valid packet");
        run_engine(&mut engine, seed, true);
        prop_assert_eq!(engine.captured_byte(), previous);

        let outputs = run_engine(&mut engine, packet, false);
        let states: Vec<_> = outputs[1..].iter().map(|out| out.executed).collect();
        prop_assert_eq!(states.len() as u64, NACK_TRANSACTION_EDGES);
        prop_assert_eq!(states[9], ProtocolState::AddrAck);
        prop_assert_eq!(states[10], ProtocolState::Stop);
        prop_assert!(outputs.iter().all(|out| out.captured_byte.is_none()));
        prop_assert_eq!(engine.captured_byte(), previous);
    }

    #[test]
    fn reset_in_any_state_returns_to_idle(packet in packet_strategy(), at in 0usize..21) {
        let mut engine = ProtocolEngine::new();
        let request = EngineInputs {
            address: packet.address(),
            data_byte: packet.data(),
            direction: packet.direction(),
            data_line: false,
            ..EngineInputs::default()
        };
        for _ in 0..at {
            engine.step(&request);
        }
        let out = engine.step(&EngineInputs { reset: true, ..request });

        prop_assert_eq!(out.next_state, ProtocolState::Idle);
        prop_assert_eq!(engine.address_bit_index(), 6);
        prop_assert_eq!(engine.data_bit_index(), 7);
        prop_assert!(!out.data_drive_enable);
        prop_assert_eq!(engine.captured_byte(), 0);
    }
}

#[test]
fn write_0x55_0xa3_drives_expected_bits_on_the_bus() {
    let packet = TransactionPacket::new(0x55, 0xA3, Direction::Write).expect("valid packet");
    let config = single_packet_config(DriverStrategy::RepeatedWrite, packet, AckPolicy::Always);
    let mut bench = Testbench::new(config).expect("valid config");
    let mut trace = MemoryTrace::new();
    let report = bench.run(&mut trace).expect("run finishes");

    let t = true;
    let f = false;
    assert_eq!(trace.driven_bits(ProtocolState::Start), vec![f]);
    assert_eq!(
        trace.driven_bits(ProtocolState::Address),
        vec![t, f, t, f, t, f, t]
    );
    assert_eq!(trace.driven_bits(ProtocolState::Direction), vec![f]);
    assert_eq!(trace.sampled_bits(ProtocolState::AddrAck), vec![f]);
    assert_eq!(
        trace.driven_bits(ProtocolState::Data),
        vec![t, f, t, f, f, f, t, t]
    );
    assert_eq!(report.captured_byte, 0);
    assert_eq!(
        report.driver.count(TransactionOutcome::Completed),
        1,
        "{report:?}"
    );
}

#[test]
fn read_0x55_captures_0xca_after_stop() {
    let packet = TransactionPacket::new(0x55, 0xCA, Direction::Read).expect("valid packet");
    let config = single_packet_config(DriverStrategy::RepeatedRead, packet, AckPolicy::Always);
    let mut bench = Testbench::new(config).expect("valid config");
    let mut trace = MemoryTrace::new();
    let report = bench.run(&mut trace).expect("run finishes");

    assert_eq!(
        trace.sampled_bits(ProtocolState::Data),
        vec![true, true, false, false, true, false, true, false]
    );
    assert!(trace.driven_bits(ProtocolState::Data).is_empty());
    assert_eq!(report.captured_byte, 0xCA);

    // The output register only changes on the STOP edge.
    let stop_tick = trace
        .falling()
        .find(|sample| sample.state == ProtocolState::Stop)
        .map(|sample| sample.tick)
        .expect("stop executed");
    assert!(trace
        .falling()
        .filter(|sample| sample.tick < stop_tick)
        .all(|sample| sample.captured_byte == 0));
}

#[test]
fn bus_trace_follows_phase_order_after_reset_and_detection() {
    let packet = TransactionPacket::new(0x2B, 0x10, Direction::Write).expect("valid packet");
    let config = single_packet_config(DriverStrategy::RepeatedWrite, packet, AckPolicy::Always);
    let mut bench = Testbench::new(config).expect("valid config");
    let mut trace = MemoryTrace::new();
    bench.run(&mut trace).expect("run finishes");

    let states = trace.states();
    assert_eq!(states[0], ProtocolState::Idle, "startup reset tick");
    assert_eq!(states[1], ProtocolState::Idle, "request detection");
    assert_eq!(states[2..].to_vec(), acknowledged_phase_order());
}

#[test]
fn clock_is_gated_only_between_start_and_stop() {
    let packet = TransactionPacket::new(0x2B, 0x10, Direction::Write).expect("valid packet");
    let config = single_packet_config(DriverStrategy::RepeatedWrite, packet, AckPolicy::Always);
    let mut bench = Testbench::new(config).expect("valid config");
    let mut trace = MemoryTrace::new();
    bench.run(&mut trace).expect("run finishes");

    for sample in trace.falling() {
        let gated = sample.state.gates_clock();
        assert_eq!(
            sample.clock,
            !gated,
            "tick {} in {}",
            sample.tick,
            sample.state
        );
    }
    assert!(trace
        .samples()
        .iter()
        .filter(|sample| sample.phase == i2c_core::ClockPhase::Rising)
        .all(|sample| sample.clock));
}

/// Ticks at which the data line fell while the clock stayed high.
fn start_conditions(trace: &MemoryTrace) -> Vec<(u64, ProtocolState)> {
    trace
        .samples()
        .windows(2)
        .filter(|pair| pair[0].clock && pair[1].clock && pair[0].data_line && !pair[1].data_line)
        .map(|pair| (pair[1].tick, pair[1].state))
        .collect()
}

#[rstest]
#[case::write(DriverStrategy::RepeatedWrite, Direction::Write)]
#[case::read(DriverStrategy::RepeatedRead, Direction::Read)]
fn acknowledged_transfer_has_a_single_start_and_a_clean_stop(
    #[case] strategy: DriverStrategy,
    #[case] direction: Direction,
) {
    let packet = TransactionPacket::new(0x2B, 0x7E, direction).expect("valid packet");
    let config = single_packet_config(strategy, packet, AckPolicy::Always);
    let mut bench = Testbench::new(config).expect("valid config");
    let mut trace = MemoryTrace::new();
    bench.run(&mut trace).expect("run finishes");
    bench.tick(&mut trace);

    assert_eq!(start_conditions(&trace), vec![(2, ProtocolState::Start)]);
    let tail: Vec<_> = trace
        .samples()
        .iter()
        .rev()
        .take(4)
        .rev()
        .map(|sample| (sample.state, sample.clock, sample.data_line))
        .collect();
    assert_eq!(
        tail,
        vec![
            (ProtocolState::Stop, true, false),
            (ProtocolState::Stop, true, false),
            (ProtocolState::Idle, true, true),
            (ProtocolState::Idle, true, true),
        ]
    );
}

#[test]
fn nack_on_bus_is_short_and_keeps_previous_capture() {
    let read = TransactionPacket::new(0x55, 0xCA, Direction::Read).expect("valid packet");
    let other = TransactionPacket::new(0x22, 0x11, Direction::Read).expect("valid packet");
    let config = SimConfig {
        strategy: DriverStrategy::RepeatedRead,
        iterations: Some(2),
        generator: GeneratorConfig::fixed(vec![read, other]),
        ack_policy: AckPolicy::Address(0x55),
        ..SimConfig::default()
    };
    let mut bench = Testbench::new(config).expect("valid config");
    let report = bench.run(&mut MemoryTrace::new()).expect("run finishes");

    let outcomes: Vec<_> = report
        .driver
        .records
        .iter()
        .map(|record| record.outcome)
        .collect();
    assert_eq!(
        outcomes,
        vec![TransactionOutcome::Completed, TransactionOutcome::NotAcknowledged]
    );
    assert_eq!(report.captured_byte, 0xCA);
    assert_eq!(
        report.ticks,
        1 + (1 + TRANSACTION_EDGES) + (1 + NACK_TRANSACTION_EDGES)
    );
}
