//! The primary committee.

use crate::{FaultPlan, NetworkAddress, NodeIdentity, PublicKey};
use indexmap::IndexMap;
use serde::ser::{Serialize, Serializer};

/// Voting stake given to every primary of a local committee.
pub const DEFAULT_STAKE: u64 = 1;

/// One primary of the committee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitteeMember {
    /// Protocol (consensus signing) identity.
    pub identity: NodeIdentity,
    /// Network identity used by the primary's transport.
    pub network_identity: NodeIdentity,
    pub primary_address: NetworkAddress,
    pub stake: u64,
}

/// Ordered set of primaries for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committee {
    members: Vec<CommitteeMember>,
    epoch: u64,
}

impl Committee {
    pub(crate) fn new(members: Vec<CommitteeMember>) -> Self {
        Self { members, epoch: 0 }
    }

    /// Number of primaries, faulty ones included.
    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn members(&self) -> &[CommitteeMember] {
        &self.members
    }

    pub fn member(&self, index: usize) -> Option<&CommitteeMember> {
        self.members.get(index)
    }

    /// Addresses of the primaries that will be launched, in committee order.
    pub fn primary_addresses(&self, faults: &FaultPlan) -> Vec<NetworkAddress> {
        faults
            .active_indices()
            .filter_map(|i| self.members.get(i))
            .map(|m| m.primary_address)
            .collect()
    }

    /// Every port claimed by a primary address.
    pub fn ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.members.iter().map(|m| m.primary_address.port())
    }
}

#[derive(serde::Serialize)]
struct AuthorityEntry<'a> {
    protocol_key: &'a PublicKey,
    network_key: &'a PublicKey,
    primary_address: &'a NetworkAddress,
    stake: u64,
}

#[derive(serde::Serialize)]
struct CommitteeFile<'a> {
    authorities: IndexMap<&'a str, AuthorityEntry<'a>>,
    epoch: u64,
}

/// Serialises to the committee descriptor the node binaries read:
/// `{"authorities": {<key>: {...}}, "epoch": 0}` in committee order.
impl Serialize for Committee {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let authorities = self
            .members
            .iter()
            .map(|m| {
                (
                    m.identity.public_key().as_str(),
                    AuthorityEntry {
                        protocol_key: m.identity.public_key(),
                        network_key: m.network_identity.public_key(),
                        primary_address: &m.primary_address,
                        stake: m.stake,
                    },
                )
            })
            .collect();

        CommitteeFile {
            authorities,
            epoch: self.epoch,
        }
        .serialize(serializer)
    }
}
