//! Clocked harness wiring the engine, the bus and the stimulus tasks together.
//!
//! One [`Testbench::tick`] is one full clock period:
//!
//! 1. the engine executes on the falling edge against the current bus inputs;
//! 2. its outputs are applied to the bus and the falling sample is traced;
//! 3. the edge clock is notified;
//! 4. every task runs until it blocks again;
//! 5. the clock rises and the rising sample is traced.
//!
//! Tasks therefore always see the outputs of the edge that woke them.

use std::future::Future;

use futures::channel::oneshot;
use futures::executor::LocalPool;
use futures::task::{LocalSpawnExt, SpawnError};
use tracing::{debug, info};

use crate::bus::{SharedBus, SignalBus};
use crate::config::SimConfig;
use crate::driver::{Driver, DriverReport};
use crate::engine::{EngineOutputs, ProtocolEngine};
use crate::error::HarnessError;
use crate::generator::{packet_channel, Generator};
use crate::sync::EdgeClock;
use crate::trace::{ClockPhase, TraceSample, TraceSink};

/// Outcome of [`Testbench::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Per-iteration driver records.
    pub driver: DriverReport,
    /// Ticks elapsed, including the startup reset.
    pub ticks: u64,
    /// Output register at the end of the run.
    pub captured_byte: u8,
}

/// Harness owning the engine, the shared bus, the edge clock and the task pool.
#[derive(Debug)]
pub struct Testbench {
    config: SimConfig,
    engine: ProtocolEngine,
    bus: SharedBus,
    clock: EdgeClock,
    pool: LocalPool,
    ticks: u64,
}

impl Testbench {
    /// Builds an idle testbench.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] with the error reported by
    /// [`SimConfig::validate`].
    pub fn new(config: SimConfig) -> Result<Self, HarnessError> {
        config.validate()?;
        Ok(Self {
            config,
            engine: ProtocolEngine::new(),
            bus: SignalBus::shared(),
            clock: EdgeClock::new(),
            pool: LocalPool::new(),
            ticks: 0,
        })
    }

    /// Configuration this testbench runs with.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Handle to the shared bus.
    #[must_use]
    pub const fn bus(&self) -> &SharedBus {
        &self.bus
    }

    /// Edge clock that tasks wait on.
    #[must_use]
    pub const fn clock(&self) -> &EdgeClock {
        &self.clock
    }

    /// Protocol engine under test.
    #[must_use]
    pub const fn engine(&self) -> &ProtocolEngine {
        &self.engine
    }

    /// Ticks elapsed so far.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Adds a task to the pool. It first runs on the next tick or stall.
    ///
    /// # Errors
    ///
    /// Propagates the executor's [`SpawnError`].
    pub fn spawn<F>(&self, task: F) -> Result<(), SpawnError>
    where
        F: Future<Output = ()> + 'static,
    {
        self.pool.spawner().spawn_local(task)
    }

    /// Runs tasks until every one of them is blocked.
    pub fn run_until_stalled(&mut self) {
        self.pool.run_until_stalled();
    }

    /// Advances one full clock period and returns the engine outputs.
    pub fn tick(&mut self, sink: &mut dyn TraceSink) -> EngineOutputs {
        let inputs = self.bus.borrow().engine_inputs();
        let outputs = self.engine.step(&inputs);

        let falling = {
            let mut bus = self.bus.borrow_mut();
            bus.apply(&outputs);
            TraceSample::capture(
                self.ticks,
                ClockPhase::Falling,
                outputs.executed,
                &bus,
                outputs.sampled,
            )
        };
        sink.on_sample(falling);

        self.clock.falling_edge();
        self.pool.run_until_stalled();

        let rising = {
            let mut bus = self.bus.borrow_mut();
            bus.rising_edge();
            TraceSample::capture(self.ticks, ClockPhase::Rising, outputs.executed, &bus, None)
        };
        sink.on_sample(rising);

        self.ticks += 1;
        outputs
    }

    /// Holds reset for exactly one tick.
    ///
    /// Every pending edge-wait resolves with a reset abort during that tick.
    pub fn pulse_reset(&mut self, sink: &mut dyn TraceSink) -> EngineOutputs {
        debug!(tick = self.ticks, "asserting reset");
        self.bus.borrow_mut().set_reset(true);
        self.clock.abort_waiters();
        let outputs = self.tick(sink);
        self.bus.borrow_mut().set_reset(false);
        outputs
    }

    /// Runs the configured strategy to completion.
    ///
    /// Applies a one-tick reset, spawns the generator (for channel-fed
    /// strategies) and the driver, then ticks until the driver reports.
    ///
    /// # Errors
    ///
    /// Fails with [`HarnessError::TickBudgetExceeded`] when the driver has not
    /// reported within the tick budget, [`HarnessError::DriverLost`] when the
    /// driver task vanished and [`HarnessError::TaskSpawn`] when the executor
    /// refused a task.
    pub fn run(&mut self, sink: &mut dyn TraceSink) -> Result<RunReport, HarnessError> {
        self.pulse_reset(sink);

        let strategy = self.config.strategy;
        let driver = if strategy.uses_channel() {
            let (tx, rx) = packet_channel(self.config.channel_capacity);
            let generator = Generator::new(&self.config.generator);
            self.spawn(async move {
                generator.run(tx).await;
            })
            .map_err(|_| HarnessError::TaskSpawn)?;
            Driver::with_channel(&self.config, self.bus.clone(), self.clock.clone(), rx)
        } else {
            Driver::self_feeding(&self.config, self.bus.clone(), self.clock.clone())
        };
        info!(
            %strategy,
            iterations = driver.iterations(),
            ack = %self.config.ack_policy,
            "starting run"
        );

        let (report_tx, mut report_rx) = oneshot::channel();
        self.spawn(async move {
            let report = driver.run().await;
            if report_tx.send(report).is_err() {
                debug!("run abandoned before the driver reported");
            }
        })
        .map_err(|_| HarnessError::TaskSpawn)?;
        self.pool.run_until_stalled();

        let start = self.ticks;
        let driver = loop {
            match report_rx.try_recv() {
                Ok(Some(report)) => break report,
                Ok(None) => {}
                Err(oneshot::Canceled) => return Err(HarnessError::DriverLost),
            }
            let elapsed = self.ticks - start;
            if elapsed >= self.config.tick_budget {
                return Err(HarnessError::TickBudgetExceeded { ticks: elapsed });
            }
            self.tick(sink);
        };

        let report = RunReport {
            driver,
            ticks: self.ticks,
            captured_byte: self.bus.borrow().captured_byte(),
        };
        info!(
            ticks = report.ticks,
            records = report.driver.records.len(),
            captured = report.captured_byte,
            "run finished"
        );
        Ok(report)
    }
}
