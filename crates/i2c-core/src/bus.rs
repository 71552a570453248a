//! Shared two-wire bus plus the point-to-point request pins.
//!
//! Open-drain resolution is replaced by an explicit [`LineOwner`] tag. The
//! engine's `data_drive_enable` output decides the tag every tick; while the
//! master owns the line the slave level is invisible, and while the slave owns
//! it the line shows the slave level (high through the pull-up unless the
//! slave pulls low).

use std::cell::RefCell;
use std::rc::Rc;

use crate::engine::{EngineInputs, EngineOutputs};
use crate::packet::{Direction, TransactionPacket};

/// Side currently driving the data line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum LineOwner {
    /// Protocol engine drives the line.
    Master,
    /// Master released the line; the slave side (or pull-up) sets its level.
    #[default]
    Slave,
}

/// Handle to a bus shared between the harness and its cooperative tasks.
pub type SharedBus = Rc<RefCell<SignalBus>>;

/// Bus signal state.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct SignalBus {
    clock: bool,
    clock_enable: bool,
    owner: LineOwner,
    master_level: bool,
    slave_level: bool,
    address: u8,
    data_byte: u8,
    direction: Direction,
    reset: bool,
    captured_byte: u8,
}

impl Default for SignalBus {
    fn default() -> Self {
        Self {
            clock: true,
            clock_enable: false,
            owner: LineOwner::Slave,
            master_level: true,
            slave_level: true,
            address: 0,
            data_byte: 0,
            direction: Direction::Write,
            reset: false,
            captured_byte: 0,
        }
    }
}

impl SignalBus {
    /// Creates an idle bus: both lines high, no request pending.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a fresh bus in a shareable handle.
    #[must_use]
    pub fn shared() -> SharedBus {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Inputs presented to the engine at the next falling edge.
    #[must_use]
    pub const fn engine_inputs(&self) -> EngineInputs {
        EngineInputs {
            data_line: self.slave_level,
            address: self.address,
            data_byte: self.data_byte,
            direction: self.direction,
            reset: self.reset,
        }
    }

    /// Applies one engine step's outputs and moves the clock to its low phase.
    pub const fn apply(&mut self, outputs: &EngineOutputs) {
        self.clock_enable = outputs.clock_enable;
        self.owner = if outputs.data_drive_enable {
            LineOwner::Master
        } else {
            LineOwner::Slave
        };
        self.master_level = outputs.data_out;
        if let Some(byte) = outputs.captured_byte {
            self.captured_byte = byte;
        }
        self.clock = !self.clock_enable;
    }

    /// Moves the clock to its high phase.
    pub const fn rising_edge(&mut self) {
        self.clock = true;
    }

    /// Places a transfer request on the address/data/direction pins.
    pub const fn set_request(&mut self, packet: &TransactionPacket, direction: Direction) {
        self.address = packet.address();
        self.data_byte = packet.data();
        self.direction = direction;
    }

    /// Withdraws the request (address zero).
    pub const fn clear_request(&mut self) {
        self.address = 0;
    }

    /// Slave side pulls the data line low.
    pub const fn pull_low(&mut self) {
        self.slave_level = false;
    }

    /// Slave side releases the data line to the pull-up.
    pub const fn release(&mut self) {
        self.slave_level = true;
    }

    /// Slave side presents `level`; high is the same as releasing.
    pub const fn drive_slave(&mut self, level: bool) {
        self.slave_level = level;
    }

    /// Sets the synchronous reset pin.
    pub const fn set_reset(&mut self, asserted: bool) {
        self.reset = asserted;
    }

    /// Resolved data line level.
    #[must_use]
    pub const fn data_line(&self) -> bool {
        match self.owner {
            LineOwner::Master => self.master_level,
            LineOwner::Slave => self.slave_level,
        }
    }

    /// Current data line owner.
    #[must_use]
    pub const fn owner(&self) -> LineOwner {
        self.owner
    }

    /// `true` while the master owns the data line.
    #[must_use]
    pub const fn data_drive_enable(&self) -> bool {
        matches!(self.owner, LineOwner::Master)
    }

    /// Output clock level.
    #[must_use]
    pub const fn clock(&self) -> bool {
        self.clock
    }

    /// `true` while the output clock follows the tick.
    #[must_use]
    pub const fn clock_enable(&self) -> bool {
        self.clock_enable
    }

    /// Requested address pin.
    #[must_use]
    pub const fn address(&self) -> u8 {
        self.address
    }

    /// Requested direction pin.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Reset pin.
    #[must_use]
    pub const fn reset(&self) -> bool {
        self.reset
    }

    /// Output register.
    ///
    /// Updated at STOP after each completed read, and cleared to zero when the
    /// engine executes a reset edge.
    #[must_use]
    pub const fn captured_byte(&self) -> u8 {
        self.captured_byte
    }
}
