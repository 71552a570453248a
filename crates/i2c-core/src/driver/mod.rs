//! Stimulus drivers acting as the slave side of the bus.
//!
//! A [`Driver`] runs one [`DriverStrategy`] for a fixed number of iterations.
//! Each iteration obtains a packet, picks the effective direction and hands
//! both to [`drive_transaction`]. The result of every iteration is kept as a
//! [`TransactionRecord`] in the final [`DriverReport`].

/// Single-transaction playback routine shared by all strategies.
pub mod playback;
pub use playback::drive_transaction;

use std::fmt;

use futures::channel::mpsc;
use futures::StreamExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::bus::SharedBus;
use crate::config::{AckPolicy, DriverStrategy, SimConfig};
use crate::error::DriverError;
use crate::packet::{Direction, TransactionPacket};
use crate::sync::EdgeClock;

/// Result of one driver iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum TransactionOutcome {
    /// All phases ran through STOP.
    Completed,
    /// `ADDR_ACK` sampled high; the engine went straight to STOP.
    NotAcknowledged,
    /// Address zero; nothing was placed on the bus.
    Skipped,
    /// A reset interrupted playback.
    Aborted,
}

impl TransactionOutcome {
    /// Lower-case label used in summaries.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::NotAcknowledged => "not-acknowledged",
            Self::Skipped => "skipped",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for TransactionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One played-back packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TransactionRecord {
    /// Zero-based driver iteration.
    pub iteration: usize,
    /// Packet as obtained by the driver.
    pub packet: TransactionPacket,
    /// Direction actually requested on the bus.
    pub direction: Direction,
    /// How the transaction ended.
    pub outcome: TransactionOutcome,
}

/// Summary of a finished driver.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DriverReport {
    /// Records in iteration order.
    pub records: Vec<TransactionRecord>,
    /// `true` when the packet channel closed before all iterations ran.
    pub starved: bool,
}

impl DriverReport {
    /// Number of records with the given outcome.
    #[must_use]
    pub fn count(&self, outcome: TransactionOutcome) -> usize {
        self.records
            .iter()
            .filter(|record| record.outcome == outcome)
            .count()
    }

    /// Effective directions in iteration order.
    #[must_use]
    pub fn directions(&self) -> Vec<Direction> {
        self.records.iter().map(|record| record.direction).collect()
    }

    /// Records that ran through STOP.
    pub fn completed(&self) -> impl Iterator<Item = &TransactionRecord> {
        self.records
            .iter()
            .filter(|record| record.outcome == TransactionOutcome::Completed)
    }
}

/// Direction a strategy requests on a given iteration.
///
/// The count-based counter starts at one: odd iterations write, even read.
#[must_use]
pub const fn effective_direction(
    strategy: DriverStrategy,
    iteration: usize,
    packet: &TransactionPacket,
) -> Direction {
    match strategy {
        DriverStrategy::CountBased => {
            if (iteration + 1) % 2 == 1 {
                Direction::Write
            } else {
                Direction::Read
            }
        }
        DriverStrategy::FullyRandom => packet.direction(),
        DriverStrategy::RepeatedRead => Direction::Read,
        DriverStrategy::RepeatedWrite => Direction::Write,
    }
}

#[derive(Debug)]
enum PacketFeed {
    Channel(mpsc::Receiver<TransactionPacket>),
    Random(Box<StdRng>),
}

/// Slave-side stimulus task.
#[derive(Debug)]
pub struct Driver {
    strategy: DriverStrategy,
    iterations: usize,
    ack_policy: AckPolicy,
    bus: SharedBus,
    clock: EdgeClock,
    feed: PacketFeed,
}

impl Driver {
    /// Driver fed by the generator channel.
    #[must_use]
    pub fn with_channel(
        config: &SimConfig,
        bus: SharedBus,
        clock: EdgeClock,
        packets: mpsc::Receiver<TransactionPacket>,
    ) -> Self {
        Self::build(config, bus, clock, PacketFeed::Channel(packets))
    }

    /// Driver building its own packets from `config.driver_seed`.
    #[must_use]
    pub fn self_feeding(config: &SimConfig, bus: SharedBus, clock: EdgeClock) -> Self {
        let rng = StdRng::seed_from_u64(config.driver_seed);
        Self::build(config, bus, clock, PacketFeed::Random(Box::new(rng)))
    }

    fn build(config: &SimConfig, bus: SharedBus, clock: EdgeClock, feed: PacketFeed) -> Self {
        Self {
            strategy: config.strategy,
            iterations: config.effective_iterations(),
            ack_policy: config.ack_policy,
            bus,
            clock,
            feed,
        }
    }

    /// Iterations this driver will attempt.
    #[must_use]
    pub const fn iterations(&self) -> usize {
        self.iterations
    }

    #[allow(clippy::future_not_send)]
    async fn next_packet(&mut self) -> Option<TransactionPacket> {
        match &mut self.feed {
            PacketFeed::Channel(rx) => rx.next().await,
            PacketFeed::Random(rng) => Some(TransactionPacket::random(&mut **rng)),
        }
    }

    /// Runs every iteration and reports what happened.
    ///
    /// A reset during playback aborts only the current transaction; the
    /// driver releases the line and moves on to the next packet.
    #[allow(clippy::future_not_send)]
    pub async fn run(mut self) -> DriverReport {
        let mut report = DriverReport::default();
        for iteration in 0..self.iterations {
            let Some(packet) = self.next_packet().await else {
                warn!(
                    iteration,
                    iterations = self.iterations,
                    "packet channel closed; driver stopping early"
                );
                report.starved = true;
                break;
            };
            let direction = effective_direction(self.strategy, iteration, &packet);
            let outcome = self.play(iteration, packet, direction).await;
            report.records.push(TransactionRecord {
                iteration,
                packet,
                direction,
                outcome,
            });
        }
        debug!(
            strategy = %self.strategy,
            records = report.records.len(),
            "driver finished"
        );
        report
    }

    #[allow(clippy::future_not_send)]
    async fn play(
        &self,
        iteration: usize,
        packet: TransactionPacket,
        direction: Direction,
    ) -> TransactionOutcome {
        if !packet.is_issuable() {
            warn!(iteration, %packet, "address zero cannot be issued; skipping");
            return TransactionOutcome::Skipped;
        }
        let acknowledge = self.ack_policy.acknowledges(packet.address());
        match drive_transaction(&self.bus, &self.clock, packet, direction, acknowledge).await {
            Ok(TransactionOutcome::Completed) => {
                info!(iteration, %packet, %direction, "transaction completed");
                TransactionOutcome::Completed
            }
            Ok(outcome) => {
                warn!(iteration, %packet, ?outcome, "transaction not acknowledged");
                outcome
            }
            Err(DriverError::ResetAbort) => {
                let mut bus = self.bus.borrow_mut();
                bus.release();
                bus.clear_request();
                warn!(iteration, %packet, "transaction aborted by reset");
                TransactionOutcome::Aborted
            }
        }
    }
}
