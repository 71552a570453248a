//! Seeded-run trace fingerprint used for cross-host determinism comparison.

use futures as _;
use i2c_core::{
    ClockPhase, DriverStrategy, LineOwner, MemoryTrace, SimConfig, Testbench, TraceSample,
};
use proptest as _;
use rand as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use tempfile as _;
use thiserror as _;
use tracing as _;

fn hash_bytes(hash: &mut u64, bytes: &[u8]) {
    for byte in bytes {
        *hash ^= u64::from(*byte);
        *hash = hash.wrapping_mul(0x1000_0000_01B3);
    }
}

fn hash_sample(hash: &mut u64, sample: &TraceSample) {
    hash_bytes(hash, &sample.tick.to_le_bytes());
    let flags = [
        u8::from(sample.phase == ClockPhase::Rising),
        sample.state.code(),
        u8::from(sample.clock),
        u8::from(sample.data_line),
        u8::from(sample.owner == LineOwner::Master),
        u8::from(sample.reset),
        sample.captured_byte,
        sample.sampled.map_or(0xFF, u8::from),
    ];
    hash_bytes(hash, &flags);
}

fn fingerprint() -> String {
    let mut hash = 0xcbf2_9ce4_8422_2325_u64;

    for strategy in DriverStrategy::ALL {
        let mut bench =
            Testbench::new(SimConfig::with_strategy(strategy)).expect("default config is valid");
        let mut trace = MemoryTrace::new();
        let report = bench.run(&mut trace).expect("seeded run should finish");

        hash_bytes(&mut hash, strategy.name().as_bytes());
        hash_bytes(&mut hash, &report.ticks.to_le_bytes());
        hash_bytes(&mut hash, &[report.captured_byte]);
        for record in &report.driver.records {
            hash_bytes(
                &mut hash,
                &[
                    record.packet.address(),
                    record.packet.data(),
                    u8::from(record.direction.as_bit()),
                    record.outcome as u8,
                ],
            );
        }
        for sample in trace.samples() {
            hash_sample(&mut hash, sample);
        }
    }

    format!("{hash:016x}")
}

fn main() {
    println!("{}", fingerprint());
}
