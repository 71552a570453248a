//! Harness configuration.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::packet::TransactionPacket;
use crate::timing::ADDRESS_MAX;

/// Packets published by the generator when no count is configured.
pub const DEFAULT_PACKET_COUNT: usize = 4;

/// Iterations run by channel-fed driver strategies by default.
pub const DEFAULT_ITERATIONS: usize = 4;

/// Iterations run by the fully-randomized strategy by default.
pub const DEFAULT_RANDOM_ITERATIONS: usize = 16;

/// Default packet channel capacity (one slot).
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1;

/// Default upper bound on ticks before a run is abandoned.
pub const DEFAULT_TICK_BUDGET: u64 = 100_000;

/// Default seed for packet generation and the fully-randomized driver.
pub const DEFAULT_SEED: u64 = 0x12C0_FFEE;

/// Driver playback strategy. Exactly one is active per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum DriverStrategy {
    /// Channel-fed; odd iterations write, even iterations read.
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "count"))]
    CountBased,
    /// Builds its own random packets and uses their direction.
    #[cfg_attr(feature = "serde", serde(rename = "random"))]
    FullyRandom,
    /// Channel-fed; every transfer is a read.
    #[cfg_attr(feature = "serde", serde(rename = "read"))]
    RepeatedRead,
    /// Channel-fed; every transfer is a write.
    #[cfg_attr(feature = "serde", serde(rename = "write"))]
    RepeatedWrite,
}

impl DriverStrategy {
    /// All strategies in declaration order.
    pub const ALL: [Self; 4] = [
        Self::CountBased,
        Self::FullyRandom,
        Self::RepeatedRead,
        Self::RepeatedWrite,
    ];

    /// Iteration count used when the configuration leaves it unset.
    #[must_use]
    pub const fn default_iterations(self) -> usize {
        match self {
            Self::FullyRandom => DEFAULT_RANDOM_ITERATIONS,
            Self::CountBased | Self::RepeatedRead | Self::RepeatedWrite => DEFAULT_ITERATIONS,
        }
    }

    /// `true` when the strategy consumes packets from the generator channel.
    #[must_use]
    pub const fn uses_channel(self) -> bool {
        !matches!(self, Self::FullyRandom)
    }

    /// Short name accepted by [`FromStr`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CountBased => "count",
            Self::FullyRandom => "random",
            Self::RepeatedRead => "read",
            Self::RepeatedWrite => "write",
        }
    }
}

impl fmt::Display for DriverStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DriverStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.name() == needle)
            .ok_or_else(|| ConfigError::UnknownStrategy(s.to_owned()))
    }
}

/// Which addresses the slave model acknowledges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub enum AckPolicy {
    /// Every address is acknowledged.
    #[default]
    Always,
    /// No address is acknowledged.
    Never,
    /// Only the given 7-bit address is acknowledged.
    Address(u8),
}

impl AckPolicy {
    /// Returns `true` when the slave pulls `ADDR_ACK` low for `address`.
    #[must_use]
    pub const fn acknowledges(self, address: u8) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Address(expected) => expected == address,
        }
    }
}

impl fmt::Display for AckPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("always"),
            Self::Never => f.write_str("never"),
            Self::Address(address) => write!(f, "{address:#04x}"),
        }
    }
}

impl FromStr for AckPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_ascii_lowercase();
        let invalid = || ConfigError::InvalidAckPolicy(s.to_owned());
        match text.as_str() {
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            _ => {
                let parsed = text.strip_prefix("0x").map_or_else(
                    || text.parse::<u8>(),
                    |hex| u8::from_str_radix(hex, 16),
                );
                match parsed {
                    Ok(address) if address <= ADDRESS_MAX => Ok(Self::Address(address)),
                    _ => Err(invalid()),
                }
            }
        }
    }
}

impl TryFrom<String> for AckPolicy {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AckPolicy> for String {
    fn from(policy: AckPolicy) -> Self {
        policy.to_string()
    }
}

/// Origin of generated packets.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "lowercase"))]
pub enum PacketSource {
    /// Uniformly random packets from a seeded generator.
    Random {
        /// RNG seed.
        seed: u64,
    },
    /// Caller-supplied packets, published in order.
    Fixed {
        /// Packets to publish.
        packets: Vec<TransactionPacket>,
    },
}

impl Default for PacketSource {
    fn default() -> Self {
        Self::Random { seed: DEFAULT_SEED }
    }
}

/// Generator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GeneratorConfig {
    /// Number of random packets to publish. Fixed sources publish their own list.
    pub count: usize,
    /// Where packets come from.
    pub source: PacketSource,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            count: DEFAULT_PACKET_COUNT,
            source: PacketSource::default(),
        }
    }
}

impl GeneratorConfig {
    /// Generator publishing exactly `packets`.
    #[must_use]
    pub const fn fixed(packets: Vec<TransactionPacket>) -> Self {
        Self {
            count: packets.len(),
            source: PacketSource::Fixed { packets },
        }
    }
}

/// Complete configuration of one harness run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimConfig {
    /// Active driver strategy.
    pub strategy: DriverStrategy,
    /// Driver iterations; the strategy default applies when unset.
    pub iterations: Option<usize>,
    /// Packet generator settings.
    pub generator: GeneratorConfig,
    /// Slots in the generator-to-driver channel.
    pub channel_capacity: usize,
    /// Seed for the fully-randomized driver's own RNG.
    pub driver_seed: u64,
    /// Slave acknowledge behavior.
    pub ack_policy: AckPolicy,
    /// Ticks after which an unfinished run fails.
    pub tick_budget: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            strategy: DriverStrategy::default(),
            iterations: None,
            generator: GeneratorConfig::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            driver_seed: DEFAULT_SEED,
            ack_policy: AckPolicy::default(),
            tick_budget: DEFAULT_TICK_BUDGET,
        }
    }
}

impl SimConfig {
    /// Default configuration for the given strategy.
    #[must_use]
    pub fn with_strategy(strategy: DriverStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Iterations the driver will attempt.
    #[must_use]
    pub fn effective_iterations(&self) -> usize {
        self.iterations
            .unwrap_or_else(|| self.strategy.default_iterations())
    }

    /// Checks the configuration before a run.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_capacity == 0 {
            return Err(ConfigError::ZeroChannelCapacity);
        }
        if self.tick_budget == 0 {
            return Err(ConfigError::ZeroTickBudget);
        }
        if matches!(self.iterations, Some(0)) {
            return Err(ConfigError::ZeroIterations);
        }
        Ok(())
    }
}
