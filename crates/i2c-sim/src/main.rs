//! CLI entry point for the I2C master testbench.

use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use i2c_core::{
    AckPolicy, DriverStrategy, HarnessError, NullTrace, PacketSource, RunReport, SimConfig,
    Testbench, TransactionOutcome, VcdWriter, PHASE_EDGE_TABLE, TRANSACTION_EDGES,
};
#[cfg(test)]
use tempfile as _;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "i2c-sim", version)]
#[command(about = "Tick-driven testbench for an I2C bus master protocol engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Debug-level logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one driver strategy against the engine and print a summary
    Run(RunArgs),
    /// Print the per-phase edge table
    Phases,
}

#[derive(Debug, Default, Args)]
struct RunArgs {
    /// TOML configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Driver strategy: count, random, read or write
    #[arg(short, long)]
    strategy: Option<DriverStrategy>,
    /// Driver iterations (strategy default when omitted)
    #[arg(short = 'n', long)]
    iterations: Option<usize>,
    /// Number of packets the generator publishes
    #[arg(long)]
    packets: Option<usize>,
    /// Seed for random packet generation
    #[arg(long)]
    seed: Option<u64>,
    /// Seed for the fully-randomized driver
    #[arg(long)]
    driver_seed: Option<u64>,
    /// Slave acknowledge policy: always, never or a 7-bit address
    #[arg(long)]
    ack: Option<AckPolicy>,
    /// Tick budget before the run is abandoned
    #[arg(long)]
    tick_budget: Option<u64>,
    /// Write a Value Change Dump of the bus to this path
    #[arg(long)]
    vcd: Option<PathBuf>,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &RunArgs) -> Result<SimConfig, String> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
            toml::from_str::<SimConfig>(&text)
                .map_err(|e| format!("invalid config {}: {e}", path.display()))?
        }
        None => SimConfig::default(),
    };

    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    if let Some(iterations) = args.iterations {
        config.iterations = Some(iterations);
    }
    if let Some(seed) = args.seed {
        config.generator.source = PacketSource::Random { seed };
    }
    if let Some(count) = args.packets {
        if matches!(config.generator.source, PacketSource::Fixed { .. }) {
            warn!("--packets has no effect on a fixed packet list");
        }
        config.generator.count = count;
    }
    if let Some(driver_seed) = args.driver_seed {
        config.driver_seed = driver_seed;
    }
    if let Some(ack) = args.ack {
        config.ack_policy = ack;
    }
    if let Some(tick_budget) = args.tick_budget {
        config.tick_budget = tick_budget;
    }

    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

/// Exit status for a rejected configuration or unreadable input.
const EXIT_SETUP: i32 = 2;
/// Exit status for a run that started but did not finish cleanly.
const EXIT_RUNTIME: i32 = 1;

const fn exit_code(error: &HarnessError) -> i32 {
    if error.is_runtime() {
        EXIT_RUNTIME
    } else {
        EXIT_SETUP
    }
}

fn run_sim(args: &RunArgs) -> Result<(), i32> {
    let config = load_config(args).map_err(|e| {
        eprintln!("error: {e}");
        EXIT_SETUP
    })?;
    let mut bench = Testbench::new(config).map_err(|e| {
        eprintln!("error: {e}");
        exit_code(&e)
    })?;

    let result = match &args.vcd {
        Some(path) => {
            let file = File::create(path).map_err(|e| {
                eprintln!("error: failed to create {}: {e}", path.display());
                EXIT_SETUP
            })?;
            let mut writer = VcdWriter::new(BufWriter::new(file)).map_err(|e| {
                eprintln!("error: failed to write VCD header: {e}");
                EXIT_SETUP
            })?;
            let result = bench.run(&mut writer);
            writer.finish().map_err(|e| {
                eprintln!("error: failed to write {}: {e}", path.display());
                EXIT_RUNTIME
            })?;
            info!(path = %path.display(), "trace written");
            result
        }
        None => bench.run(&mut NullTrace),
    };

    let report = result.map_err(|e| {
        error!(%e, "run failed");
        eprintln!("error: {e}");
        exit_code(&e)
    })?;
    print!("{}", format_summary(bench.config(), &report));
    Ok(())
}

fn format_summary(config: &SimConfig, report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "strategy: {}  iterations: {}  ack: {}",
        config.strategy,
        config.effective_iterations(),
        config.ack_policy
    );
    for record in &report.driver.records {
        let _ = writeln!(
            out,
            "  #{:<3} {} -> {}",
            record.iteration,
            record.packet.with_direction(record.direction),
            record.outcome
        );
    }
    let counts: Vec<String> = [
        TransactionOutcome::Completed,
        TransactionOutcome::NotAcknowledged,
        TransactionOutcome::Skipped,
        TransactionOutcome::Aborted,
    ]
    .into_iter()
    .map(|outcome| format!("{outcome}={}", report.driver.count(outcome)))
    .collect();
    let _ = writeln!(out, "outcomes: {}", counts.join(" "));
    if report.driver.starved {
        let _ = writeln!(out, "generator ran dry before the last iteration");
    }
    let _ = writeln!(
        out,
        "ticks: {}  captured_byte: {:#04x}",
        report.ticks, report.captured_byte
    );
    out
}

fn phase_table() -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<10} {:>5}", "phase", "edges");
    let mut total = 0;
    for (phase, edges) in PHASE_EDGE_TABLE {
        total += u64::from(*edges);
        let _ = writeln!(out, "{:<10} {edges:>5}", phase.name());
    }
    let _ = writeln!(
        out,
        "{:<10} {total:>5}  ({TRANSACTION_EDGES} outside IDLE)",
        "total"
    );
    out
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match cli.command {
        Command::Run(args) => match run_sim(&args) {
            Ok(()) => 0,
            Err(code) => code,
        },
        Command::Phases => {
            print!("{}", phase_table());
            0
        }
    };

    process::exit(exit_code);
}
