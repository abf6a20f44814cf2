//! Per-primary worker membership.

use crate::{FaultPlan, NetworkAddress, NodeIdentity, PublicKey};
use indexmap::IndexMap;
use serde::ser::{Serialize, Serializer};

/// Worker identifier, local to its primary (`0..W`).
pub type WorkerId = u32;

/// One worker of a primary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerInfo {
    pub id: WorkerId,
    pub identity: NodeIdentity,
    /// Transaction ingress endpoint, the target of a client.
    pub transactions: NetworkAddress,
    /// Worker-to-worker endpoint.
    pub worker_address: NetworkAddress,
}

/// Workers grouped by primary, in committee order.
///
/// Every primary, faulty or not, has exactly `workers_per_node` entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCache {
    primaries: Vec<(PublicKey, Vec<WorkerInfo>)>,
    workers_per_node: usize,
    epoch: u64,
}

impl WorkerCache {
    pub(crate) fn new(primaries: Vec<(PublicKey, Vec<WorkerInfo>)>, workers_per_node: usize) -> Self {
        Self {
            primaries,
            workers_per_node,
            epoch: 0,
        }
    }

    /// Total number of workers across all primaries (N × W).
    pub fn size(&self) -> usize {
        self.primaries.iter().map(|(_, w)| w.len()).sum()
    }

    /// Number of primaries covered.
    pub fn primaries(&self) -> usize {
        self.primaries.len()
    }

    pub fn workers_per_node(&self) -> usize {
        self.workers_per_node
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Workers of primary `index`.
    pub fn workers_for(&self, index: usize) -> &[WorkerInfo] {
        self.primaries
            .get(index)
            .map(|(_, w)| w.as_slice())
            .unwrap_or(&[])
    }

    /// Transaction addresses of the workers that will be launched, grouped by
    /// primary index.
    pub fn workers_addresses(&self, faults: &FaultPlan) -> Vec<Vec<(WorkerId, NetworkAddress)>> {
        faults
            .active_indices()
            .map(|i| {
                self.workers_for(i)
                    .iter()
                    .map(|w| (w.id, w.transactions))
                    .collect()
            })
            .collect()
    }

    /// Number of workers that will be launched.
    pub fn active_workers(&self, faults: &FaultPlan) -> usize {
        faults.active_indices().map(|i| self.workers_for(i).len()).sum()
    }

    /// Every port claimed by a worker address.
    pub fn ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.primaries
            .iter()
            .flat_map(|(_, w)| w.iter())
            .flat_map(|w| [w.transactions.port(), w.worker_address.port()])
    }
}

#[derive(serde::Serialize)]
struct WorkerEntry<'a> {
    name: &'a PublicKey,
    transactions: &'a NetworkAddress,
    worker_address: &'a NetworkAddress,
}

#[derive(serde::Serialize)]
struct WorkerCacheFile<'a> {
    workers: IndexMap<&'a str, IndexMap<String, WorkerEntry<'a>>>,
    epoch: u64,
}

/// Serialises to the worker-cache descriptor:
/// `{"workers": {<primary key>: {"<id>": {...}}}, "epoch": 0}`.
impl Serialize for WorkerCache {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let workers = self
            .primaries
            .iter()
            .map(|(primary, workers)| {
                let entries = workers
                    .iter()
                    .map(|w| {
                        (
                            w.id.to_string(),
                            WorkerEntry {
                                name: w.identity.public_key(),
                                transactions: &w.transactions,
                                worker_address: &w.worker_address,
                            },
                        )
                    })
                    .collect();
                (primary.as_str(), entries)
            })
            .collect();

        WorkerCacheFile {
            workers,
            epoch: self.epoch,
        }
        .serialize(serializer)
    }
}
