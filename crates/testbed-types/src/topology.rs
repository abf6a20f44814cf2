//! Deterministic committee and worker-cache construction.

use crate::committee::DEFAULT_STAKE;
use crate::{
    Committee, CommitteeMember, NetworkAddress, NodeIdentity, WorkerCache, WorkerId, WorkerInfo,
};
use std::collections::HashSet;

/// First port handed out to primaries.
pub const BASE_PORT: u16 = 3000;

/// Ports reserved per primary. The worker range starts after `2 * N` of them.
pub const PORTS_PER_PRIMARY: u16 = 2;

/// Ports claimed per worker: transactions and worker-to-worker.
pub const PORTS_PER_WORKER: u16 = 2;

/// Errors building a topology from identities.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    #[error("expected {expected} {what} identities, got {actual}")]
    CountMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("public key {0} appears more than once")]
    DuplicateKey(String),

    #[error("port range starting at {base} overflows for {count} endpoints")]
    PortOverflow { base: u16, count: usize },
}

/// First worker port for a committee of `nodes` primaries.
pub fn worker_base_port(base_port: u16, nodes: usize) -> Result<u16, TopologyError> {
    port_at(base_port, nodes, PORTS_PER_PRIMARY)
}

fn port_at(base: u16, index: usize, stride: u16) -> Result<u16, TopologyError> {
    let overflow = || TopologyError::PortOverflow { base, count: index };
    let offset = u16::try_from(index)
        .ok()
        .and_then(|i| i.checked_mul(stride))
        .ok_or_else(overflow)?;
    base.checked_add(offset).ok_or_else(overflow)
}

fn ensure_unique<'a>(identities: impl Iterator<Item = &'a NodeIdentity>) -> Result<(), TopologyError> {
    let mut seen = HashSet::new();
    for identity in identities {
        if !seen.insert(identity.public_key()) {
            return Err(TopologyError::DuplicateKey(identity.public_key().to_string()));
        }
    }
    Ok(())
}

/// Build the committee: primary `i` listens on `base_port + 2i`.
pub fn build_committee(
    primaries: &[NodeIdentity],
    network_keys: &[NodeIdentity],
    base_port: u16,
) -> Result<Committee, TopologyError> {
    if network_keys.len() != primaries.len() {
        return Err(TopologyError::CountMismatch {
            what: "primary network",
            expected: primaries.len(),
            actual: network_keys.len(),
        });
    }
    ensure_unique(primaries.iter())?;

    let members = primaries
        .iter()
        .zip(network_keys)
        .enumerate()
        .map(|(i, (identity, network_identity))| -> Result<_, TopologyError> {
            Ok(CommitteeMember {
                identity: identity.clone(),
                network_identity: network_identity.clone(),
                primary_address: NetworkAddress::udp(port_at(base_port, i, PORTS_PER_PRIMARY)?),
                stake: DEFAULT_STAKE,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Committee::new(members))
}

/// Build the worker cache.
///
/// `workers` is ordered by global index `k = i * workers_per_node + j`; worker
/// `k` takes ports `base_port + 2k` (transactions) and `base_port + 2k + 1`.
pub fn build_worker_cache(
    primaries: &[NodeIdentity],
    workers: &[NodeIdentity],
    base_port: u16,
    workers_per_node: usize,
) -> Result<WorkerCache, TopologyError> {
    let expected = primaries.len() * workers_per_node;
    if workers.len() != expected {
        return Err(TopologyError::CountMismatch {
            what: "worker",
            expected,
            actual: workers.len(),
        });
    }
    ensure_unique(primaries.iter())?;
    ensure_unique(workers.iter())?;

    let mut entries = Vec::with_capacity(primaries.len());
    for (i, primary) in primaries.iter().enumerate() {
        let mut infos = Vec::with_capacity(workers_per_node);
        for j in 0..workers_per_node {
            let k = i * workers_per_node + j;
            let transactions = port_at(base_port, k, PORTS_PER_WORKER)?;
            let worker_port = transactions.checked_add(1).ok_or(TopologyError::PortOverflow {
                base: base_port,
                count: k,
            })?;
            infos.push(WorkerInfo {
                id: j as WorkerId,
                identity: workers[k].clone(),
                transactions: NetworkAddress::http(transactions),
                worker_address: NetworkAddress::udp(worker_port),
            });
        }
        entries.push((primary.public_key().clone(), infos));
    }

    Ok(WorkerCache::new(entries, workers_per_node))
}
