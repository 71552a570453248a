use std::fmt;

/// Protocol phase the master engine is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ProtocolState {
    /// Bus free; waiting for a non-zero address request.
    #[default]
    Idle,
    /// Data pulled low while the clock is held high.
    Start,
    /// Shifting out address bits, most significant first.
    Address,
    /// Driving the R/W bit.
    Direction,
    /// Line released; sampling the slave's address acknowledge.
    AddrAck,
    /// Shifting data bits out (write) or in (read).
    Data,
    /// Line released for the data acknowledge (not evaluated).
    DataAck,
    /// Committing the captured byte and issuing the STOP condition.
    Stop,
}

impl ProtocolState {
    /// Returns `true` for states in which the output clock follows the tick.
    #[must_use]
    pub const fn gates_clock(self) -> bool {
        matches!(
            self,
            Self::Address | Self::Direction | Self::AddrAck | Self::Data | Self::DataAck
        )
    }

    /// Short upper-case name used in logs and trace dumps.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Start => "START",
            Self::Address => "ADDRESS",
            Self::Direction => "DIRECTION",
            Self::AddrAck => "ADDR_ACK",
            Self::Data => "DATA",
            Self::DataAck => "DATA_ACK",
            Self::Stop => "STOP",
        }
    }

    /// Numeric encoding used for the state vector in VCD dumps.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
