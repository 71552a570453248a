//! I2C master protocol engine.
//!
//! The combinational block is [`evaluate`], a pure function from the current
//! register set and the sampled bus inputs to the outputs for this tick and
//! the register set for the next one. [`ProtocolEngine`] owns the registers
//! and commits each evaluation; it is invoked once per falling clock edge.
//!
//! Within one evaluation the master's release of the data line takes effect
//! before the line is sampled, so `EngineInputs::data_line` is the level the
//! line shows with the master's driver off.
//!
//! STOP releases the clock and drives the data line low on its edge; the
//! following IDLE edge releases it, so the data line rises while the clock is
//! high. On an acknowledged transfer the slave still holds `DATA_ACK` low
//! when STOP executes and the line never falls with the clock high. After an
//! address NACK the line is high going into STOP, so the STOP edge shows a
//! falling data line under a high clock before the closing rise. The engine
//! has a single edge per phase and cannot pre-drive the line low while the
//! clock is still gated.

/// Protocol state enumeration.
pub mod state;

pub use state::ProtocolState;

use tracing::{debug, trace};

use crate::packet::Direction;
use crate::timing::{ADDRESS_MAX, ADDRESS_MSB_INDEX, DATA_MSB_INDEX};

/// Bus values sampled by the engine at a falling edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineInputs {
    /// Data line level with the master released (slave side or pull-up).
    pub data_line: bool,
    /// Requested target address; zero means "no request".
    pub address: u8,
    /// Byte to write on write transfers.
    pub data_byte: u8,
    /// Requested transfer direction.
    pub direction: Direction,
    /// Synchronous reset.
    pub reset: bool,
}

impl Default for EngineInputs {
    fn default() -> Self {
        Self {
            data_line: true,
            address: 0,
            data_byte: 0,
            direction: Direction::Write,
            reset: false,
        }
    }
}

/// Values produced by one engine step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineOutputs {
    /// State whose actions were executed on this edge.
    pub executed: ProtocolState,
    /// State the engine will execute on the next edge.
    pub next_state: ProtocolState,
    /// Output clock follows the tick when set, otherwise it is held high.
    pub clock_enable: bool,
    /// Master owns the data line when set.
    pub data_drive_enable: bool,
    /// Level driven by the master; meaningful only with `data_drive_enable`.
    pub data_out: bool,
    /// Bit sampled from the released line on this edge, if any.
    pub sampled: Option<bool>,
    /// Byte committed to the output register on this edge.
    ///
    /// Set at STOP after a completed read, and to zero on a reset edge: reset
    /// clears the output register along with every other engine register.
    pub captured_byte: Option<u8>,
}

impl EngineOutputs {
    const fn released(executed: ProtocolState) -> Self {
        Self {
            executed,
            next_state: executed,
            clock_enable: false,
            data_drive_enable: false,
            data_out: true,
            sampled: None,
            captured_byte: None,
        }
    }

    const fn drive(&mut self, level: bool) {
        self.data_drive_enable = true;
        self.data_out = level;
    }

    /// Level the data line takes given this step's outputs and the slave side.
    #[must_use]
    pub const fn resolved_data_line(&self, slave_level: bool) -> bool {
        if self.data_drive_enable {
            self.data_out
        } else {
            slave_level
        }
    }
}

/// Complete register set of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineRegisters {
    /// State executed on the next edge.
    pub state: ProtocolState,
    /// Address bit driven on the next ADDRESS edge (6..=0).
    pub address_bit_index: u8,
    /// Data bit driven or captured on the next DATA edge (7..=0).
    pub data_bit_index: u8,
    /// Address latched when the request left IDLE.
    pub latched_address: u8,
    /// Write byte latched when the request left IDLE.
    pub latched_data: u8,
    /// Direction latched when the request left IDLE.
    pub latched_direction: Direction,
    /// Bits captured so far during a read DATA phase.
    pub shift_register: u8,
    /// Set once all read bits are in; cleared by the STOP commit.
    pub capture_ready: bool,
    /// Externally visible output register, updated only in STOP.
    pub captured_byte: u8,
}

impl Default for EngineRegisters {
    fn default() -> Self {
        Self {
            state: ProtocolState::Idle,
            address_bit_index: ADDRESS_MSB_INDEX,
            data_bit_index: DATA_MSB_INDEX,
            latched_address: 0,
            latched_data: 0,
            latched_direction: Direction::Write,
            shift_register: 0,
            capture_ready: false,
            captured_byte: 0,
        }
    }
}

const fn bit(value: u8, index: u8) -> bool {
    (value >> index) & 1 == 1
}

const fn with_bit(value: u8, index: u8, level: bool) -> u8 {
    if level {
        value | (1 << index)
    } else {
        value & !(1 << index)
    }
}

/// Evaluates one falling edge.
///
/// Returns the outputs for this edge and the registers to commit. Reset wins
/// over every state and clears the register set, including the output
/// register.
#[must_use]
pub fn evaluate(regs: &EngineRegisters, inputs: &EngineInputs) -> (EngineOutputs, EngineRegisters) {
    let mut out = EngineOutputs::released(regs.state);
    let mut next = *regs;

    if inputs.reset {
        next = EngineRegisters::default();
        out.next_state = next.state;
        out.captured_byte = Some(next.captured_byte);
        return (out, next);
    }

    match regs.state {
        ProtocolState::Idle => {
            next.address_bit_index = ADDRESS_MSB_INDEX;
            next.data_bit_index = DATA_MSB_INDEX;
            if inputs.address != 0 {
                next.latched_address = inputs.address & ADDRESS_MAX;
                next.latched_data = inputs.data_byte;
                next.latched_direction = inputs.direction;
                next.shift_register = 0;
                next.capture_ready = false;
                next.state = ProtocolState::Start;
            }
        }
        ProtocolState::Start => {
            out.drive(false);
            next.state = ProtocolState::Address;
        }
        ProtocolState::Address => {
            out.clock_enable = true;
            out.drive(bit(regs.latched_address, regs.address_bit_index));
            if regs.address_bit_index == 0 {
                next.state = ProtocolState::Direction;
            } else {
                next.address_bit_index = regs.address_bit_index - 1;
            }
        }
        ProtocolState::Direction => {
            out.clock_enable = true;
            out.drive(regs.latched_direction.as_bit());
            next.state = ProtocolState::AddrAck;
        }
        ProtocolState::AddrAck => {
            out.clock_enable = true;
            out.sampled = Some(inputs.data_line);
            next.state = if inputs.data_line {
                ProtocolState::Stop
            } else {
                ProtocolState::Data
            };
        }
        ProtocolState::Data => {
            out.clock_enable = true;
            let index = regs.data_bit_index;
            match regs.latched_direction {
                Direction::Write => out.drive(bit(regs.latched_data, index)),
                Direction::Read => {
                    out.sampled = Some(inputs.data_line);
                    next.shift_register = with_bit(regs.shift_register, index, inputs.data_line);
                }
            }
            if index == 0 {
                next.capture_ready = regs.latched_direction == Direction::Read;
                next.state = ProtocolState::DataAck;
            } else {
                next.data_bit_index = index - 1;
            }
        }
        ProtocolState::DataAck => {
            // The sample is reported but never evaluated: no NACK handling on data.
            out.clock_enable = true;
            out.sampled = Some(inputs.data_line);
            next.state = ProtocolState::Stop;
        }
        ProtocolState::Stop => {
            out.drive(false);
            if regs.capture_ready {
                next.captured_byte = regs.shift_register;
                next.capture_ready = false;
                out.captured_byte = Some(regs.shift_register);
            }
            next.address_bit_index = ADDRESS_MSB_INDEX;
            next.data_bit_index = DATA_MSB_INDEX;
            next.state = ProtocolState::Idle;
        }
    }

    out.next_state = next.state;
    (out, next)
}

/// Stateful wrapper that commits [`evaluate`] once per falling edge.
#[derive(Debug, Clone, Default)]
pub struct ProtocolEngine {
    regs: EngineRegisters,
}

impl ProtocolEngine {
    /// Creates an engine in IDLE with cleared registers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Executes the current state against `inputs` and advances.
    pub fn step(&mut self, inputs: &EngineInputs) -> EngineOutputs {
        let (out, next) = evaluate(&self.regs, inputs);

        trace!(
            state = %out.executed,
            next = %out.next_state,
            drive = out.data_drive_enable,
            level = out.data_out,
            "engine step"
        );
        if inputs.reset {
            debug!(from = %out.executed, "reset forces IDLE");
        } else if out.executed == ProtocolState::AddrAck && out.next_state == ProtocolState::Stop {
            debug!(
                address = self.regs.latched_address,
                "address not acknowledged; aborting to STOP"
            );
        } else if out.executed != out.next_state {
            debug!(from = %out.executed, to = %out.next_state, "phase transition");
        }
        if let (Some(byte), false) = (out.captured_byte, inputs.reset) {
            debug!(captured = byte, "read byte committed");
        }

        self.regs = next;
        out
    }

    /// State that will execute on the next edge.
    #[must_use]
    pub const fn state(&self) -> ProtocolState {
        self.regs.state
    }

    /// Full register set.
    #[must_use]
    pub const fn registers(&self) -> &EngineRegisters {
        &self.regs
    }

    /// Externally visible output register.
    #[must_use]
    pub const fn captured_byte(&self) -> u8 {
        self.regs.captured_byte
    }

    /// Next address bit index.
    #[must_use]
    pub const fn address_bit_index(&self) -> u8 {
        self.regs.address_bit_index
    }

    /// Next data bit index.
    #[must_use]
    pub const fn data_bit_index(&self) -> u8 {
        self.regs.data_bit_index
    }
}
