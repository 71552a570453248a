//! Shared bit widths and per-phase edge counts.
//!
//! The engine sizes its bit counters from these constants and the drivers size
//! their edge-waits from the same table, so the two sides cannot disagree on
//! how long a phase lasts.

/// Width of the target address in bits.
pub const ADDRESS_BITS: u8 = 7;

/// Width of one data byte in bits.
pub const DATA_BITS: u8 = 8;

/// Index of the first (most significant) address bit on the wire.
pub const ADDRESS_MSB_INDEX: u8 = ADDRESS_BITS - 1;

/// Index of the first (most significant) data bit on the wire.
pub const DATA_MSB_INDEX: u8 = DATA_BITS - 1;

/// Largest encodable 7-bit address.
pub const ADDRESS_MAX: u8 = (1 << ADDRESS_BITS) - 1;

/// Playback phases of one transaction, as seen from the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Request detection in IDLE followed by the START condition.
    Start,
    /// Address bits, most significant first.
    Address,
    /// Read/write direction bit.
    Direction,
    /// Acknowledge of the address byte.
    AddressAck,
    /// Data bits, most significant first.
    Data,
    /// Acknowledge of the data byte.
    DataAck,
    /// STOP condition and return to IDLE.
    Stop,
}

impl Phase {
    /// Upper-case phase name as printed in timing tables.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Address => "ADDRESS",
            Self::Direction => "DIRECTION",
            Self::AddressAck => "ADDR_ACK",
            Self::Data => "DATA",
            Self::DataAck => "DATA_ACK",
            Self::Stop => "STOP",
        }
    }
}

/// Falling edges spent in each playback phase, in bus order.
pub const PHASE_EDGE_TABLE: &[(Phase, u8)] = &[
    (Phase::Start, 2),
    (Phase::Address, ADDRESS_BITS),
    (Phase::Direction, 1),
    (Phase::AddressAck, 1),
    (Phase::Data, DATA_BITS),
    (Phase::DataAck, 1),
    (Phase::Stop, 1),
];

/// Edges the engine spends outside IDLE on an acknowledged transaction.
pub const TRANSACTION_EDGES: u64 = 20;

/// Edges the engine spends outside IDLE when the address is not acknowledged.
pub const NACK_TRANSACTION_EDGES: u64 = 11;

/// Looks up the number of falling edges spent in a phase.
#[must_use]
pub fn phase_edges(phase: Phase) -> u64 {
    PHASE_EDGE_TABLE
        .iter()
        .find_map(|(entry, edges)| (*entry == phase).then_some(u64::from(*edges)))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{phase_edges, Phase, NACK_TRANSACTION_EDGES, PHASE_EDGE_TABLE, TRANSACTION_EDGES};

    #[test]
    fn table_contains_unique_phases() {
        let phases: HashSet<_> = PHASE_EDGE_TABLE.iter().map(|(phase, _)| *phase).collect();
        assert_eq!(phases.len(), PHASE_EDGE_TABLE.len());
    }

    #[test]
    fn acknowledged_transaction_spans_table_total_minus_idle_detection() {
        let total: u64 = PHASE_EDGE_TABLE
            .iter()
            .map(|(_, edges)| u64::from(*edges))
            .sum();
        // The first START edge is spent in IDLE detecting the request.
        assert_eq!(total - 1, TRANSACTION_EDGES);
    }

    #[test]
    fn nack_transaction_skips_data_phase_and_its_ack() {
        let skipped = phase_edges(Phase::Data) + phase_edges(Phase::DataAck);
        assert_eq!(TRANSACTION_EDGES - skipped, NACK_TRANSACTION_EDGES);
    }

    #[test]
    fn bit_phases_match_field_widths() {
        assert_eq!(phase_edges(Phase::Address), 7);
        assert_eq!(phase_edges(Phase::Data), 8);
        assert_eq!(phase_edges(Phase::Stop), 1);
    }
}
