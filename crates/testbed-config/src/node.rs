//! Node-level tunables written to the parameters file.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use testbed_types::NetworkAddress;

/// Tunables shared by every primary and worker of a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeParameters {
    /// Batches a primary waits for before proposing a header.
    pub header_num_of_batches_threshold: usize,

    /// Upper bound on batches included in one header.
    pub max_header_num_of_batches: usize,

    /// Maximum delay before a header is proposed regardless of batches.
    #[serde(with = "crate::serde_duration")]
    pub max_header_delay: Duration,

    /// Minimum delay between headers.
    #[serde(with = "crate::serde_duration")]
    pub min_header_delay: Duration,

    /// Rounds kept before garbage collection.
    pub gc_depth: u64,

    #[serde(with = "crate::serde_duration")]
    pub sync_retry_delay: Duration,

    pub sync_retry_nodes: usize,

    /// Batch size in bytes.
    pub batch_size: usize,

    /// Maximum delay before a partial batch is sealed.
    #[serde(with = "crate::serde_duration")]
    pub max_batch_delay: Duration,

    pub max_concurrent_requests: usize,

    pub block_synchronizer: BlockSynchronizerParameters,

    pub consensus_api_grpc: ConsensusApiGrpcParameters,

    pub prometheus_metrics: PrometheusMetricsParameters,

    pub network_admin_server: NetworkAdminServerParameters,
}

/// Timeouts of the block synchronizer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockSynchronizerParameters {
    #[serde(with = "crate::serde_duration")]
    pub range_synchronize_timeout: Duration,
    #[serde(with = "crate::serde_duration")]
    pub certificates_synchronize_timeout: Duration,
    #[serde(with = "crate::serde_duration")]
    pub payload_synchronize_timeout: Duration,
    #[serde(with = "crate::serde_duration")]
    pub payload_availability_timeout: Duration,
    #[serde(with = "crate::serde_duration")]
    pub handler_certificate_deliver_timeout: Duration,
}

impl Default for BlockSynchronizerParameters {
    fn default() -> Self {
        Self {
            range_synchronize_timeout: Duration::from_secs(30),
            certificates_synchronize_timeout: Duration::from_secs(30),
            payload_synchronize_timeout: Duration::from_secs(30),
            payload_availability_timeout: Duration::from_secs(30),
            handler_certificate_deliver_timeout: Duration::from_secs(30),
        }
    }
}

/// Consensus API endpoint of each primary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusApiGrpcParameters {
    pub socket_addr: NetworkAddress,
    #[serde(with = "crate::serde_duration")]
    pub get_collections_timeout: Duration,
    #[serde(with = "crate::serde_duration")]
    pub remove_collections_timeout: Duration,
}

impl Default for ConsensusApiGrpcParameters {
    fn default() -> Self {
        Self {
            socket_addr: NetworkAddress::http(0),
            get_collections_timeout: Duration::from_millis(5_000),
            remove_collections_timeout: Duration::from_millis(5_000),
        }
    }
}

/// Metrics endpoint. Port 0 lets every node pick a free port.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrometheusMetricsParameters {
    pub socket_addr: NetworkAddress,
}

impl Default for PrometheusMetricsParameters {
    fn default() -> Self {
        Self {
            socket_addr: NetworkAddress::http(0),
        }
    }
}

/// Admin server ports. Zero disables a fixed assignment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkAdminServerParameters {
    pub primary_network_admin_server_port: u16,
    pub worker_network_admin_server_base_port: u16,
}

impl Default for NodeParameters {
    fn default() -> Self {
        Self {
            header_num_of_batches_threshold: 32,
            max_header_num_of_batches: 1000,
            max_header_delay: Duration::from_millis(200),
            min_header_delay: Duration::from_millis(200),
            gc_depth: 50,
            sync_retry_delay: Duration::from_millis(10_000),
            sync_retry_nodes: 3,
            batch_size: 500_000,
            max_batch_delay: Duration::from_millis(200),
            max_concurrent_requests: 500_000,
            block_synchronizer: BlockSynchronizerParameters::default(),
            consensus_api_grpc: ConsensusApiGrpcParameters::default(),
            prometheus_metrics: PrometheusMetricsParameters::default(),
            network_admin_server: NetworkAdminServerParameters::default(),
        }
    }
}

impl NodeParameters {
    /// Parse from a TOML document; missing keys take their defaults.
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

    /// Render as TOML, e.g. to seed an editable parameters file.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.header_num_of_batches_threshold == 0 {
            return Err(ConfigError::invalid(
                "header_num_of_batches_threshold",
                "must be positive",
            ));
        }
        if self.header_num_of_batches_threshold > self.max_header_num_of_batches {
            return Err(ConfigError::invalid(
                "header_num_of_batches_threshold",
                format!(
                    "{} exceeds max_header_num_of_batches {}",
                    self.header_num_of_batches_threshold, self.max_header_num_of_batches
                ),
            ));
        }
        if self.gc_depth == 0 {
            return Err(ConfigError::invalid("gc_depth", "must be positive"));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", "must be positive"));
        }
        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::invalid(
                "max_concurrent_requests",
                "must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(NodeParameters::default().validate().is_ok());
    }

    #[test]
    fn test_json_uses_humantime_strings() {
        let value = serde_json::to_value(NodeParameters::default()).unwrap();
        assert_eq!(value["max_header_delay"], "200ms");
        assert_eq!(value["sync_retry_delay"], "10s");
        assert_eq!(value["block_synchronizer"]["range_synchronize_timeout"], "30s");
        assert_eq!(
            value["prometheus_metrics"]["socket_addr"],
            "/ip4/127.0.0.1/tcp/0/http"
        );
        assert_eq!(value["network_admin_server"]["primary_network_admin_server_port"], 0);
    }

    #[test]
    fn test_partial_toml_overrides() {
        let params = NodeParameters::from_toml_str(
            r#"
            batch_size = 1000
            max_batch_delay = "10ms"

            [block_synchronizer]
            payload_availability_timeout = "2s"
            "#,
        )
        .unwrap();

        assert_eq!(params.batch_size, 1000);
        assert_eq!(params.max_batch_delay, Duration::from_millis(10));
        assert_eq!(
            params.block_synchronizer.payload_availability_timeout,
            Duration::from_secs(2)
        );
        assert_eq!(
            params.block_synchronizer.range_synchronize_timeout,
            Duration::from_secs(30)
        );
        assert_eq!(params.gc_depth, 50);
    }

    #[test]
    fn test_toml_roundtrip_of_defaults() {
        let text = NodeParameters::default().to_toml_string().unwrap();
        assert_eq!(
            NodeParameters::from_toml_str(&text).unwrap(),
            NodeParameters::default()
        );
    }

    #[test]
    fn test_validate_rejects_inverted_header_thresholds() {
        let params = NodeParameters {
            header_num_of_batches_threshold: 10,
            max_header_num_of_batches: 5,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::Invalid {
                field: "header_num_of_batches_threshold",
                ..
            })
        ));
    }

    #[test]
    fn test_bad_duration_is_a_parse_error() {
        assert!(matches!(
            NodeParameters::from_toml_str(r#"max_header_delay = "soon""#),
            Err(ConfigError::Parse(_))
        ));
    }
}
