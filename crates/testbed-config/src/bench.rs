//! Parameters of one local benchmark run.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use testbed_types::FaultPlan;
use tracing::warn;

/// Parameters of one local benchmark run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchParameters {
    /// Number of primaries (N).
    pub nodes: usize,

    /// Workers per primary (W).
    pub workers: usize,

    /// Primaries configured but never launched (F), taken from the end of the
    /// committee.
    pub faults: usize,

    /// Aggregate target rate in transactions per second, split over the
    /// active workers.
    pub rate: u64,

    /// Transaction size in bytes.
    pub tx_size: usize,

    /// How long the testbed runs before teardown.
    #[serde(with = "crate::serde_duration")]
    pub duration: Duration,
}

impl BenchParameters {
    /// Parameters for `nodes` primaries with the remaining defaults.
    pub fn new(nodes: usize) -> Self {
        Self {
            nodes,
            ..Default::default()
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_faults(mut self, faults: usize) -> Self {
        self.faults = faults;
        self
    }

    pub fn with_rate(mut self, rate: u64) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_tx_size(mut self, tx_size: usize) -> Self {
        self.tx_size = tx_size;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Parse from a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check the parameters before anything is started.
    ///
    /// `faults >= nodes` is not rejected: such a run configures the full
    /// committee and launches nothing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nodes == 0 {
            return Err(ConfigError::invalid("nodes", "at least one node is required"));
        }
        if self.workers == 0 {
            return Err(ConfigError::invalid(
                "workers",
                "at least one worker per node is required",
            ));
        }
        if self.rate == 0 {
            return Err(ConfigError::invalid("rate", "must be positive"));
        }
        if self.tx_size == 0 {
            return Err(ConfigError::invalid("tx_size", "must be positive"));
        }
        if self.duration.is_zero() {
            return Err(ConfigError::invalid("duration", "must be positive"));
        }
        if self.faults >= self.nodes {
            warn!(
                nodes = self.nodes,
                faults = self.faults,
                "fault count covers the whole committee; no node will be launched"
            );
        }
        Ok(())
    }

    /// Which primaries are launched.
    pub fn fault_plan(&self) -> FaultPlan {
        FaultPlan::last(self.nodes, self.faults)
    }

    /// Total workers across the committee (N × W).
    pub fn total_workers(&self) -> usize {
        self.nodes * self.workers
    }

    /// Name of the result file for this configuration.
    pub fn result_file_name(&self) -> String {
        format!(
            "bench-{}-{}-{}-{}-{}.txt",
            self.faults, self.nodes, self.workers, self.rate, self.tx_size
        )
    }
}

impl Default for BenchParameters {
    fn default() -> Self {
        Self {
            nodes: 4,
            workers: 1,
            faults: 0,
            rate: 50_000,
            tx_size: 512,
            duration: Duration::from_secs(20),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let params = BenchParameters::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.total_workers(), 4);
    }

    #[test]
    fn test_rejects_empty_committee() {
        let params = BenchParameters::new(0);
        assert!(matches!(
            params.validate(),
            Err(ConfigError::Invalid { field: "nodes", .. })
        ));
    }

    #[test]
    fn test_rejects_zero_values() {
        let base = BenchParameters::default();
        let cases = [
            (base.clone().with_workers(0), "workers"),
            (base.clone().with_rate(0), "rate"),
            (base.clone().with_tx_size(0), "tx_size"),
            (base.clone().with_duration(Duration::ZERO), "duration"),
        ];
        for (params, expected) in cases {
            match params.validate() {
                Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected {expected} to be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_faults_covering_committee_are_accepted() {
        let params = BenchParameters::new(3).with_faults(3);
        assert!(params.validate().is_ok());
        assert_eq!(params.fault_plan().active_count(), 0);
    }

    #[test]
    fn test_from_toml() {
        let params = BenchParameters::from_toml_str(
            r#"
            nodes = 10
            faults = 3
            rate = 1000
            duration = "5s"
            "#,
        )
        .unwrap();

        assert_eq!(params.nodes, 10);
        assert_eq!(params.faults, 3);
        assert_eq!(params.rate, 1000);
        assert_eq!(params.duration, Duration::from_secs(5));
        // Unspecified fields keep their defaults.
        assert_eq!(params.workers, 1);
        assert_eq!(params.tx_size, 512);
    }

    #[test]
    fn test_from_toml_rejects_unknown_fields() {
        assert!(matches!(
            BenchParameters::from_toml_str("collocate = true"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_result_file_name() {
        let params = BenchParameters::new(4).with_faults(1).with_rate(1000);
        assert_eq!(params.result_file_name(), "bench-1-4-1-1000-512.txt");
    }
}
