//! Error types for packets, configuration, driver playback and harness runs.

use thiserror::Error;

use crate::timing::ADDRESS_MAX;

/// Rejected packet construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum PacketError {
    /// Address does not fit in seven bits.
    #[error("address {address:#04x} exceeds the 7-bit range (max {max:#04x})", max = ADDRESS_MAX)]
    AddressOutOfRange {
        /// Offending address value.
        address: u8,
    },
}

/// Invalid harness configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum ConfigError {
    /// The packet channel needs at least one slot.
    #[error("channel capacity must be at least 1")]
    ZeroChannelCapacity,
    /// A run with no tick budget can never make progress.
    #[error("tick budget must be non-zero")]
    ZeroTickBudget,
    /// A driver configured for zero iterations has nothing to play back.
    #[error("driver iteration count must be non-zero")]
    ZeroIterations,
    /// Strategy name did not match any known driver strategy.
    #[error("unknown driver strategy `{0}` (expected count, random, read or write)")]
    UnknownStrategy(String),
    /// Ack policy text could not be parsed.
    #[error("invalid ack policy `{0}` (expected always, never or a 7-bit address)")]
    InvalidAckPolicy(String),
}

/// Failure of a single driver playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum DriverError {
    /// Reset was asserted while the driver was waiting on clock edges.
    #[error("transaction aborted by bus reset")]
    ResetAbort,
}

/// Failure of a complete testbench run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum HarnessError {
    /// Configuration rejected before the run started.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The driver did not finish within the configured tick budget.
    #[error("driver did not finish within {ticks} ticks")]
    TickBudgetExceeded {
        /// Ticks elapsed when the run was abandoned.
        ticks: u64,
    },
    /// The driver task was dropped without reporting.
    #[error("driver task ended without a report")]
    DriverLost,
    /// The executor refused a task.
    #[error("failed to spawn harness task")]
    TaskSpawn,
}

impl HarnessError {
    /// Returns `true` for failures caused by the run itself rather than its setup.
    #[must_use]
    pub const fn is_runtime(&self) -> bool {
        matches!(
            self,
            Self::TickBudgetExceeded { .. } | Self::DriverLost | Self::TaskSpawn
        )
    }
}
