//! Local benchmark testbed CLI
//!
//! Runs a primary/worker/client committee on this machine and reports on the
//! collected logs.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use testbed_config::{BenchParameters, NodeParameters};
use testbed_orchestrator::{BenchmarkRunner, RunOptions, TestbedPaths};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "testbed")]
#[command(about = "Local benchmark testbed for the mempool/consensus nodes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one local benchmark
    Local {
        /// Bench parameters file (TOML); flags below override it
        #[arg(long)]
        bench_params: Option<PathBuf>,

        /// Node parameters file (TOML); defaults are used when absent
        #[arg(long)]
        node_params: Option<PathBuf>,

        /// Number of primaries
        #[arg(long)]
        nodes: Option<usize>,

        /// Workers per primary
        #[arg(long)]
        workers: Option<usize>,

        /// Primaries configured but not launched
        #[arg(long)]
        faults: Option<usize>,

        /// Aggregate target transactions per second
        #[arg(long)]
        rate: Option<u64>,

        /// Transaction size in bytes
        #[arg(long)]
        tx_size: Option<usize>,

        /// Run duration (e.g., "20s", "2m")
        #[arg(short, long)]
        duration: Option<humantime::Duration>,

        /// Run nodes with maximum verbosity
        #[arg(long)]
        debug: bool,

        /// Compile the nodes with failpoints
        #[arg(long)]
        failpoints: bool,

        /// Use debug instead of release binaries
        #[arg(long)]
        debug_build: bool,

        /// Testbed directory holding keys, configs, stores and logs
        #[arg(long, default_value = ".")]
        workdir: PathBuf,

        /// Node crate to compile (default: <workdir>/../node)
        #[arg(long)]
        node_crate: Option<PathBuf>,

        /// Cargo target directory (default: <workdir>/../target)
        #[arg(long)]
        target_dir: Option<PathBuf>,
    },

    /// Print the default node parameters as TOML
    Params,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Params => {
            // Output goes to stdout; no tracing.
            print!("{}", NodeParameters::default().to_toml_string()?);
        }

        Commands::Local {
            bench_params,
            node_params,
            nodes,
            workers,
            faults,
            rate,
            tx_size,
            duration,
            debug,
            failpoints,
            debug_build,
            workdir,
            node_crate,
            target_dir,
        } => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
                )
                .init();

            let mut bench = match bench_params {
                Some(path) => BenchParameters::load(&path)?,
                None => BenchParameters::default(),
            };
            if let Some(nodes) = nodes {
                bench.nodes = nodes;
            }
            if let Some(workers) = workers {
                bench.workers = workers;
            }
            if let Some(faults) = faults {
                bench.faults = faults;
            }
            if let Some(rate) = rate {
                bench.rate = rate;
            }
            if let Some(tx_size) = tx_size {
                bench.tx_size = tx_size;
            }
            if let Some(duration) = duration {
                bench.duration = *duration;
            }

            let node = match node_params {
                Some(path) => NodeParameters::load(&path)?,
                None => NodeParameters::default(),
            };

            let mut paths = TestbedPaths::new(workdir);
            if let Some(dir) = node_crate {
                paths = paths.with_node_crate(dir);
            }
            if let Some(dir) = target_dir {
                paths = paths.with_target_dir(dir);
            }

            let result_file = paths.results_dir().join(bench.result_file_name());
            let mut runner = BenchmarkRunner::new(bench, node, paths)?.with_options(RunOptions {
                debug,
                failpoints,
                release: !debug_build,
            });

            let report = runner.run().await?;
            print!("{report}");
            std::fs::write(&result_file, report.to_string())
                .with_context(|| format!("failed to write {}", result_file.display()))?;
            info!(path = %result_file.display(), "Saved results");
        }
    }

    Ok(())
}
