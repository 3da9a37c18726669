use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use crate::upcall::{UPCALL_OP_COUNT, UpcallOp};

/// Per-operation upcall counters. Only bumped when profiling is enabled.
#[derive(Debug, Default)]
pub struct UpcallStats {
    counts: [AtomicU64; UPCALL_OP_COUNT],
    failures: [AtomicU64; UPCALL_OP_COUNT],
}

impl UpcallStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn hit(&self, op: UpcallOp, ok: bool) {
        self.counts[op.slot()].fetch_add(1, AtomicOrdering::Relaxed);
        if !ok {
            self.failures[op.slot()].fetch_add(1, AtomicOrdering::Relaxed);
        }
    }

    pub fn count(&self, op: UpcallOp) -> u64 {
        self.counts[op.slot()].load(AtomicOrdering::Relaxed)
    }

    pub fn failures(&self, op: UpcallOp) -> u64 {
        self.failures[op.slot()].load(AtomicOrdering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        UpcallOp::ALL.into_iter().map(|op| self.count(op)).sum()
    }

    /// `(op, calls, failures)` for every operation with at least one call.
    pub fn snapshot(&self) -> Vec<(UpcallOp, u64, u64)> {
        UpcallOp::ALL
            .into_iter()
            .map(|op| (op, self.count(op), self.failures(op)))
            .filter(|(_, calls, _)| *calls > 0)
            .collect()
    }
}
