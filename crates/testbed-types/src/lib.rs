//! Core types for the local benchmark testbed.
//!
//! Everything in this crate is pure: identities are plain values handed in by
//! the caller, and the committee / worker cache are derived from them with a
//! deterministic port plan. No I/O happens here.
//!
//! # Port plan
//!
//! ```text
//!  BASE_PORT            BASE_PORT + 2N
//!  │ primary 0 │ primary 1 │ ... │ worker 0 │ worker 1 │ ...
//!  │  2 ports  │  2 ports  │     │ 2 ports  │ 2 ports  │
//! ```
//!
//! Primaries reserve two ports each; the worker range starts right after the
//! last primary's reservation. Worker `k = i * W + j` owns two ports as well,
//! one for incoming transactions and one for worker-to-worker traffic.

mod address;
mod committee;
mod faults;
mod identity;
mod rate;
mod topology;
mod worker_cache;

pub use address::{AddressError, NetworkAddress, Transport};
pub use committee::{Committee, CommitteeMember};
pub use faults::FaultPlan;
pub use identity::{NodeIdentity, PublicKey};
pub use rate::{rate_share, RateError};
pub use topology::{
    build_committee, build_worker_cache, worker_base_port, TopologyError, BASE_PORT,
    PORTS_PER_PRIMARY, PORTS_PER_WORKER,
};
pub use worker_cache::{WorkerCache, WorkerId, WorkerInfo};
