//! Benchmark and node parameters.
//!
//! [`BenchParameters`] describes one local run (committee size, fan-out,
//! faults, load, duration). [`NodeParameters`] holds the tunables handed to
//! every launched primary and worker through the parameters file. Both are
//! plain typed structs with an explicit `validate()` step; both load from TOML
//! and the node parameters persist as JSON for the node binaries.

mod bench;
mod error;
mod node;
mod persist;
mod serde_duration;

pub use bench::BenchParameters;
pub use error::ConfigError;
pub use node::{
    BlockSynchronizerParameters, ConsensusApiGrpcParameters, NetworkAdminServerParameters,
    NodeParameters, PrometheusMetricsParameters,
};
pub use persist::write_json;
