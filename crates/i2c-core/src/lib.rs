//! Cycle-level I2C bus master protocol engine with a cooperative verification harness.

/// Bit widths and per-phase edge counts shared by engine and drivers.
pub mod timing;
pub use timing::{
    phase_edges, Phase, ADDRESS_BITS, ADDRESS_MAX, ADDRESS_MSB_INDEX, DATA_BITS, DATA_MSB_INDEX,
    NACK_TRANSACTION_EDGES, PHASE_EDGE_TABLE, TRANSACTION_EDGES,
};

/// Error taxonomy for packets, configuration, playback and runs.
pub mod error;
pub use error::{ConfigError, DriverError, HarnessError, PacketError};

/// Transaction packets and transfer direction.
pub mod packet;
pub use packet::{Direction, TransactionPacket};

/// Master protocol state machine.
pub mod engine;
pub use engine::{
    evaluate, EngineInputs, EngineOutputs, EngineRegisters, ProtocolEngine, ProtocolState,
};

/// Shared signal bus with explicit data-line ownership.
pub mod bus;
pub use bus::{LineOwner, SharedBus, SignalBus};

/// Edge clock and counting edge-waits.
pub mod sync;
pub use sync::{EdgeClock, EdgeWait};

/// Harness configuration.
pub mod config;
pub use config::{
    AckPolicy, DriverStrategy, GeneratorConfig, PacketSource, SimConfig, DEFAULT_CHANNEL_CAPACITY,
    DEFAULT_ITERATIONS, DEFAULT_PACKET_COUNT, DEFAULT_RANDOM_ITERATIONS, DEFAULT_SEED,
    DEFAULT_TICK_BUDGET,
};

/// Packet generator and bounded packet channel.
pub mod generator;
pub use generator::{packet_channel, Generator};

/// Slave-side stimulus drivers.
pub mod driver;
pub use driver::{
    drive_transaction, effective_direction, Driver, DriverReport, TransactionOutcome,
    TransactionRecord,
};

/// Bus trace samples and sinks.
pub mod trace;
pub use trace::{
    ClockPhase, MemoryTrace, NullTrace, TraceSample, TraceSink, VcdWriter, TICK_PERIOD_NS,
};

/// Clocked harness tying everything together.
pub mod testbench;
pub use testbench::{RunReport, Testbench};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use tempfile as _;
