//! Fault selection.

use std::ops::Range;

/// Which primaries (and their workers) are configured but never launched.
///
/// The last `faults` indices by committee order are faulty. Faulty nodes stay
/// in the committee and worker cache so the running nodes still see the full
/// membership; only their launch is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultPlan {
    nodes: usize,
    faults: usize,
}

impl FaultPlan {
    /// Mark the last `faults` of `nodes` primaries as faulty.
    ///
    /// `faults >= nodes` is accepted and leaves no active node.
    pub fn last(nodes: usize, faults: usize) -> Self {
        Self { nodes, faults }
    }

    /// Total configured primaries.
    pub fn nodes(&self) -> usize {
        self.nodes
    }

    /// Requested fault count.
    pub fn faults(&self) -> usize {
        self.faults
    }

    /// Number of primaries that will be launched.
    pub fn active_count(&self) -> usize {
        self.nodes.saturating_sub(self.faults)
    }

    /// Indices of the primaries that will be launched.
    pub fn active_indices(&self) -> Range<usize> {
        0..self.active_count()
    }

    /// Whether primary `index` is faulty.
    pub fn is_faulty(&self, index: usize) -> bool {
        index >= self.active_count()
    }
}
