//! Transaction packets handed from generators to drivers.

use std::fmt;

use rand::Rng;

use crate::error::PacketError;
use crate::timing::ADDRESS_MAX;

/// Transfer direction as seen from the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    /// Master drives the data byte onto the bus.
    #[default]
    Write,
    /// Master releases the line and captures the slave's byte.
    Read,
}

impl Direction {
    /// Returns the R/W bit as transmitted after the address (read is 1).
    #[must_use]
    pub const fn as_bit(self) -> bool {
        matches!(self, Self::Read)
    }

    /// Converts an R/W bit into a direction.
    #[must_use]
    pub const fn from_bit(bit: bool) -> Self {
        if bit {
            Self::Read
        } else {
            Self::Write
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write => f.write_str("write"),
            Self::Read => f.write_str("read"),
        }
    }
}

/// One requested transfer. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "PacketFields", into = "PacketFields")
)]
pub struct TransactionPacket {
    address: u8,
    data: u8,
    direction: Direction,
}

impl TransactionPacket {
    /// Builds a packet, rejecting addresses wider than seven bits.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::AddressOutOfRange`] when `address > 0x7F`.
    pub const fn new(address: u8, data: u8, direction: Direction) -> Result<Self, PacketError> {
        if address > ADDRESS_MAX {
            return Err(PacketError::AddressOutOfRange { address });
        }
        Ok(Self {
            address,
            data,
            direction,
        })
    }

    /// Samples a packet uniformly over the full address, data and direction domain.
    ///
    /// Address zero is part of the domain even though it can never be issued.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self {
            address: rng.gen_range(0..=ADDRESS_MAX),
            data: rng.gen(),
            direction: Direction::from_bit(rng.gen()),
        }
    }

    /// Target address (7-bit).
    #[must_use]
    pub const fn address(&self) -> u8 {
        self.address
    }

    /// Data byte written by the master, or returned by the slave on reads.
    #[must_use]
    pub const fn data(&self) -> u8 {
        self.data
    }

    /// Direction carried by the packet itself.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// `false` for address zero, which the engine treats as "no request".
    #[must_use]
    pub const fn is_issuable(&self) -> bool {
        self.address != 0
    }

    /// Copy of this packet with its direction replaced.
    #[must_use]
    pub const fn with_direction(self, direction: Direction) -> Self {
        Self { direction, ..self }
    }
}

impl fmt::Display for TransactionPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} addr={:#04x} data={:#04x}",
            self.direction, self.address, self.data
        )
    }
}

/// Unvalidated wire form used when packets are loaded from configuration.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize, serde::Serialize)]
struct PacketFields {
    address: u8,
    data: u8,
    #[serde(default)]
    direction: Direction,
}

#[cfg(feature = "serde")]
impl TryFrom<PacketFields> for TransactionPacket {
    type Error = PacketError;

    fn try_from(fields: PacketFields) -> Result<Self, Self::Error> {
        Self::new(fields.address, fields.data, fields.direction)
    }
}

#[cfg(feature = "serde")]
impl From<TransactionPacket> for PacketFields {
    fn from(packet: TransactionPacket) -> Self {
        Self {
            address: packet.address,
            data: packet.data,
            direction: packet.direction,
        }
    }
}
