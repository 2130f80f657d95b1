//! Data-memory subsystem simulator CLI.
//!
//! This binary replays memory access traces through the cache model. It performs:
//! 1. **Run:** Replay a JSON trace and print every load result plus statistics.
//! 2. **Config:** Print the resolved configuration as JSON.
//!
//! Logging goes through `tracing`; set `RUST_LOG=rvmem_core=debug` to follow
//! MSHR allocation, port grants, and refills.

use std::{fs, process};

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use rvmem_core::config::Config;
use rvmem_core::sim::{Simulator, Trace};

#[derive(Parser, Debug)]
#[command(
    name = "memsim",
    author,
    version,
    about = "Non-blocking L1 data cache simulator",
    long_about = "Replay a memory access trace through the L1 data cache, MSHRs, load queue and store queue.\n\nExamples:\n  memsim run --trace traces/stream.json\n  memsim run --trace t.json --config cache.json --stats cache stalls\n  memsim config --preset narrow-burst"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Preset {
    /// 64-byte lines, single wide transfer.
    Default,
    /// 16-byte lines, four 4-byte beats.
    NarrowBurst,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a trace and print load results and statistics.
    Run {
        /// JSON trace to replay.
        #[arg(short, long)]
        trace: String,

        /// JSON configuration file (overrides the preset).
        #[arg(short, long)]
        config: Option<String>,

        /// Built-in configuration to start from.
        #[arg(long, value_enum, default_value = "default")]
        preset: Preset,

        /// Statistics sections to print (summary, cache, refill, stalls); all if omitted.
        #[arg(long, num_args = 0..)]
        stats: Vec<String>,

        /// Give up after this many cycles without progress.
        #[arg(long)]
        cycle_limit: Option<u64>,
    },

    /// Print the resolved configuration as JSON.
    Config {
        /// JSON configuration file to resolve.
        #[arg(short, long)]
        config: Option<String>,

        /// Built-in configuration to start from.
        #[arg(long, value_enum, default_value = "default")]
        preset: Preset,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            trace,
            config,
            preset,
            stats,
            cycle_limit,
        } => cmd_run(&trace, config.as_deref(), preset, &stats, cycle_limit),
        Commands::Config { config, preset } => cmd_config(config.as_deref(), preset),
    }
}

/// Resolves the configuration from a file or a preset; exits on error.
fn load_config(path: Option<&str>, preset: Preset) -> Config {
    let Some(path) = path else {
        return match preset {
            Preset::Default => Config::default(),
            Preset::NarrowBurst => Config::narrow_burst(),
        };
    };
    let json = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading config {path}: {e}");
        process::exit(1);
    });
    Config::from_json(&json).unwrap_or_else(|e| {
        eprintln!("Error in config {path}: {e}");
        process::exit(1);
    })
}

/// Replays the trace and prints each load in dequeue order, then the statistics.
fn cmd_run(
    trace_path: &str,
    config_path: Option<&str>,
    preset: Preset,
    sections: &[String],
    cycle_limit: Option<u64>,
) {
    let config = load_config(config_path, preset);
    let trace = Trace::load(trace_path).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        process::exit(1);
    });

    let mut sim = Simulator::new(&config).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        process::exit(1);
    });
    if let Some(limit) = cycle_limit {
        sim.set_cycle_limit(limit);
    }

    let geometry = config.geometry();
    println!(
        "[*] L1-D {} B: {} sets x {} ways x {} B lines, {} MSHRs, {}-byte beats",
        config.cache.size_bytes,
        geometry.sets,
        geometry.ways,
        geometry.line_bytes,
        config.mshr.entries,
        config.memory.beat_bytes
    );
    println!("[*] Trace: {trace_path} ({} ops)", trace.ops.len());

    match sim.replay(&trace) {
        Ok(report) => {
            for load in &report.loads {
                println!(
                    "  x{:<2} <- [{:#010x}] = {:#010x}",
                    load.rd, load.addr, load.value
                );
            }
            println!("[*] Completed in {} cycles", report.cycles);
            sim.stats().print_sections(sections);
        }
        Err(e) => {
            eprintln!("\n[!] {e}");
            sim.stats().print_sections(sections);
            process::exit(1);
        }
    }
}

/// Prints the resolved configuration.
fn cmd_config(config_path: Option<&str>, preset: Preset) {
    let config = load_config(config_path, preset);
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
