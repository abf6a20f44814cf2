//! Local benchmark orchestrator.
//!
//! Spins up a full committee of primaries, their workers and one load client
//! per active worker on a single machine, lets it run for a fixed duration,
//! tears everything down and hands the logs to a [`LogAnalyzer`].
//!
//! # Architecture
//!
//! - **[`KeyProvisioner`]**: one external key generation per identity
//! - **[`Toolchain`]**: compiles the node crate and aliases its binaries
//! - **[`Supervisor`]**: owns the background sessions it launched
//! - **[`BenchmarkRunner`]**: the run state machine tying them together
//!
//! Every collaborator sits behind a trait so the state machine can be driven
//! without real binaries.
//!
//! # Example
//!
//! ```ignore
//! use testbed_config::{BenchParameters, NodeParameters};
//! use testbed_orchestrator::{BenchmarkRunner, TestbedPaths};
//! use std::time::Duration;
//!
//! let bench = BenchParameters::new(4)
//!     .with_faults(1)
//!     .with_rate(1_000)
//!     .with_duration(Duration::from_secs(5));
//!
//! let mut runner = BenchmarkRunner::new(bench, NodeParameters::default(), TestbedPaths::default())?;
//! let report = runner.run().await?;
//! println!("{report}");
//! ```
//!
//! # Limitations
//!
//! A testbed directory belongs to one orchestrator at a time. Clients are
//! started before any node; tolerating the cold start is up to the client
//! binary.

pub mod commands;
mod error;
pub mod keys;
pub mod logs;
mod paths;
pub mod runner;
pub mod supervisor;
pub mod toolchain;

pub use commands::{CommandMaker, LaunchCommand, NodeFiles};
pub use error::{BenchError, LaunchError, ParseError, RunFailure};
pub use keys::{ExternalKeyProvisioner, KeyKind, KeyProvisioner};
pub use logs::{LogAnalyzer, LogCollector, LogFileSummary, RunReport};
pub use paths::TestbedPaths;
pub use runner::{BenchmarkRunner, RunOptions, RunState};
pub use supervisor::{session_name, ProcessSupervisor, Supervisor};
pub use toolchain::{CargoToolchain, Toolchain};
