//! Slave-side playback of a single transaction.
//!
//! Edges are counted from the scheduling point where the request is placed on
//! the bus. Every wait is sized from [`crate::timing::PHASE_EDGE_TABLE`].

use tracing::debug;

use crate::bus::SharedBus;
use crate::error::DriverError;
use crate::packet::{Direction, TransactionPacket};
use crate::sync::EdgeClock;
use crate::timing::{phase_edges, Phase, DATA_MSB_INDEX};

use super::TransactionOutcome;

/// Plays `packet` back in `direction`, acting as the slave.
///
/// With `acknowledge` the slave pulls `ADDR_ACK` low and the full timeline runs.
/// Without it the line stays high, the engine aborts to STOP and the driver
/// withdraws the request after that edge.
///
/// # Errors
///
/// Returns [`DriverError::ResetAbort`] when a reset interrupts any wait. The
/// bus is left as it was at the interruption; callers release it.
#[allow(clippy::future_not_send)]
pub async fn drive_transaction(
    bus: &SharedBus,
    clock: &EdgeClock,
    packet: TransactionPacket,
    direction: Direction,
    acknowledge: bool,
) -> Result<TransactionOutcome, DriverError> {
    bus.borrow_mut().set_request(&packet, direction);
    debug!(phase = ?Phase::Start, %packet, %direction, "request placed");
    clock.wait_edges(phase_edges(Phase::Start)).await?;

    debug!(phase = ?Phase::Address, "waiting out address and direction bits");
    clock
        .wait_edges(phase_edges(Phase::Address) + phase_edges(Phase::Direction))
        .await?;

    if acknowledge {
        bus.borrow_mut().pull_low();
    }
    debug!(phase = ?Phase::AddressAck, acknowledge, "address acknowledge");
    clock.wait_edges(phase_edges(Phase::AddressAck)).await?;
    bus.borrow_mut().release();

    if !acknowledge {
        clock.wait_edges(phase_edges(Phase::Stop)).await?;
        bus.borrow_mut().clear_request();
        return Ok(TransactionOutcome::NotAcknowledged);
    }

    debug!(phase = ?Phase::Data, %direction, "data phase");
    match direction {
        Direction::Write => clock.wait_edges(phase_edges(Phase::Data)).await?,
        Direction::Read => {
            let byte = packet.data();
            for index in (0..=DATA_MSB_INDEX).rev() {
                bus.borrow_mut().drive_slave((byte >> index) & 1 == 1);
                clock.wait_edges(1).await?;
            }
            bus.borrow_mut().release();
        }
    }

    // Held through the STOP edge so SDA never falls while SCL is high.
    bus.borrow_mut().pull_low();
    debug!(phase = ?Phase::DataAck, "data acknowledge");
    clock
        .wait_edges(phase_edges(Phase::DataAck) + phase_edges(Phase::Stop))
        .await?;
    {
        let mut bus = bus.borrow_mut();
        bus.release();
        bus.clear_request();
    }
    debug!(phase = ?Phase::Stop, "request withdrawn");
    Ok(TransactionOutcome::Completed)
}
