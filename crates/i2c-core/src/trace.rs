//! Per-phase bus trace recording.
//!
//! The testbench emits one [`TraceSample`] per clock phase: the falling sample
//! shows what the engine did on that edge, the rising sample shows the bus
//! after every task has reacted. Sinks decide what to keep.

use std::io::{self, Write};

use crate::bus::{LineOwner, SignalBus};
use crate::engine::ProtocolState;

/// Half of the clock period a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ClockPhase {
    /// Engine edge.
    Falling,
    /// Mid-period, after tasks ran.
    Rising,
}

/// Snapshot of the bus at one clock phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TraceSample {
    /// Tick number, starting at zero.
    pub tick: u64,
    /// Clock phase within the tick.
    pub phase: ClockPhase,
    /// State the engine executed on this tick's edge.
    pub state: ProtocolState,
    /// Output clock level.
    pub clock: bool,
    /// Resolved data line level.
    pub data_line: bool,
    /// Data line owner.
    pub owner: LineOwner,
    /// Reset pin.
    pub reset: bool,
    /// Output register.
    pub captured_byte: u8,
    /// Bit sampled by the engine on this edge (falling samples only).
    pub sampled: Option<bool>,
}

/// Nanoseconds per tick in exported waveforms.
pub const TICK_PERIOD_NS: u64 = 10;

impl TraceSample {
    /// Captures the bus as seen at `phase` of `tick`.
    #[must_use]
    pub const fn capture(
        tick: u64,
        phase: ClockPhase,
        state: ProtocolState,
        bus: &SignalBus,
        sampled: Option<bool>,
    ) -> Self {
        Self {
            tick,
            phase,
            state,
            clock: bus.clock(),
            data_line: bus.data_line(),
            owner: bus.owner(),
            reset: bus.reset(),
            captured_byte: bus.captured_byte(),
            sampled,
        }
    }

    /// Waveform timestamp in nanoseconds.
    #[must_use]
    pub const fn time_ns(&self) -> u64 {
        let offset = match self.phase {
            ClockPhase::Falling => 0,
            ClockPhase::Rising => TICK_PERIOD_NS / 2,
        };
        self.tick * TICK_PERIOD_NS + offset
    }
}

/// Receiver for trace samples, in tick order.
pub trait TraceSink {
    /// Records one sample.
    fn on_sample(&mut self, sample: TraceSample);
}

/// Sink that drops every sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTrace;

impl TraceSink for NullTrace {
    fn on_sample(&mut self, _sample: TraceSample) {}
}

/// Sink that keeps every sample in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryTrace {
    samples: Vec<TraceSample>,
}

impl MemoryTrace {
    /// Creates an empty trace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All samples in recording order.
    #[must_use]
    pub fn samples(&self) -> &[TraceSample] {
        &self.samples
    }

    /// Falling-phase samples only, one per tick.
    pub fn falling(&self) -> impl Iterator<Item = &TraceSample> {
        self.samples
            .iter()
            .filter(|sample| sample.phase == ClockPhase::Falling)
    }

    /// Executed engine states, one per tick.
    #[must_use]
    pub fn states(&self) -> Vec<ProtocolState> {
        self.falling().map(|sample| sample.state).collect()
    }

    /// Levels the master drove on each edge executing `state`.
    #[must_use]
    pub fn driven_bits(&self, state: ProtocolState) -> Vec<bool> {
        self.falling()
            .filter(|sample| sample.state == state && sample.owner == LineOwner::Master)
            .map(|sample| sample.data_line)
            .collect()
    }

    /// Levels the engine sampled on each edge executing `state`.
    #[must_use]
    pub fn sampled_bits(&self, state: ProtocolState) -> Vec<bool> {
        self.falling()
            .filter(|sample| sample.state == state)
            .filter_map(|sample| sample.sampled)
            .collect()
    }

    /// Discards recorded samples.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl TraceSink for MemoryTrace {
    fn on_sample(&mut self, sample: TraceSample) {
        self.samples.push(sample);
    }
}

struct VcdSignal {
    id: char,
    name: &'static str,
    width: u8,
}

const fn signal(id: char, name: &'static str, width: u8) -> VcdSignal {
    VcdSignal { id, name, width }
}

const VCD_SIGNALS: [VcdSignal; 6] = [
    signal('!', "scl", 1),
    signal('"', "sda", 1),
    signal('#', "sda_master", 1),
    signal('$', "reset", 1),
    signal('%', "state", 3),
    signal('&', "captured_byte", 8),
];

const fn vcd_values(sample: &TraceSample) -> [u8; 6] {
    [
        sample.clock as u8,
        sample.data_line as u8,
        matches!(sample.owner, LineOwner::Master) as u8,
        sample.reset as u8,
        sample.state.code(),
        sample.captured_byte,
    ]
}

/// Value Change Dump writer.
///
/// Write errors are latched on the first failure and reported by
/// [`VcdWriter::finish`]; later samples are dropped.
#[derive(Debug)]
pub struct VcdWriter<W: Write> {
    out: W,
    last: Option<[u8; 6]>,
    error: Option<io::Error>,
}

impl<W: Write> VcdWriter<W> {
    /// Writes the VCD header and returns a writer ready for samples.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from writing the header.
    pub fn new(mut out: W) -> io::Result<Self> {
        writeln!(out, "$version i2c-sim bus trace $end")?;
        writeln!(out, "$timescale 1ns $end")?;
        writeln!(out, "$scope module i2c $end")?;
        for signal in &VCD_SIGNALS {
            writeln!(
                out,
                "$var wire {} {} {} $end",
                signal.width, signal.id, signal.name
            )?;
        }
        writeln!(out, "$upscope $end")?;
        writeln!(out, "$enddefinitions $end")?;
        Ok(Self {
            out,
            last: None,
            error: None,
        })
    }

    fn write_sample(&mut self, sample: &TraceSample) -> io::Result<()> {
        let values = vcd_values(sample);
        let changed: Vec<usize> = (0..VCD_SIGNALS.len())
            .filter(|&index| !matches!(self.last, Some(last) if last[index] == values[index]))
            .collect();
        if changed.is_empty() {
            return Ok(());
        }
        writeln!(self.out, "#{}", sample.time_ns())?;
        for index in changed {
            let signal = &VCD_SIGNALS[index];
            if signal.width == 1 {
                writeln!(self.out, "{}{}", values[index], signal.id)?;
            } else {
                writeln!(self.out, "b{:b} {}", values[index], signal.id)?;
            }
        }
        self.last = Some(values);
        Ok(())
    }

    /// Flushes the output and hands it back.
    ///
    /// # Errors
    ///
    /// Returns the first write error seen while recording, or the flush error.
    pub fn finish(mut self) -> io::Result<W> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        self.out.flush()?;
        Ok(self.out)
    }
}

impl<W: Write> TraceSink for VcdWriter<W> {
    fn on_sample(&mut self, sample: TraceSample) {
        if self.error.is_some() {
            return;
        }
        if let Err(error) = self.write_sample(&sample) {
            self.error = Some(error);
        }
    }
}
