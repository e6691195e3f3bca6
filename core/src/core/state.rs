//! Per-domain job state.
//!
//! Counters are written only by the owning domain job and read by anything
//! holding the shared handle (progress displays, the orchestrator's job
//! listing). Atomics keep readers lock-free; there is never more than one
//! writer, so relaxed ordering is enough for each field on its own.

use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering::Relaxed};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPhase {
    Enumerating,
    Probing,
    Completed,
}

impl JobPhase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => JobPhase::Enumerating,
            1 => JobPhase::Probing,
            _ => JobPhase::Completed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            JobPhase::Enumerating => 0,
            JobPhase::Probing => 1,
            JobPhase::Completed => 2,
        }
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobPhase::Enumerating => write!(f, "enumerating"),
            JobPhase::Probing => write!(f, "probing"),
            JobPhase::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug)]
pub struct JobStats {
    phase: AtomicU8,
    total: AtomicUsize,
    checked: AtomicUsize,
    found: AtomicUsize,
}

impl Default for JobStats {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStats {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(JobPhase::Enumerating.as_u8()),
            total: AtomicUsize::new(0),
            checked: AtomicUsize::new(0),
            found: AtomicUsize::new(0),
        }
    }

    /// Enumerating -> Probing, fixing the candidate total.
    pub(crate) fn begin_probing(&self, total: usize) {
        self.total.store(total, Relaxed);
        self.phase.store(JobPhase::Probing.as_u8(), Relaxed);
    }

    /// Counts one processed candidate. Returns the new `(checked, found)`.
    pub(crate) fn record(&self, success: bool) -> (usize, usize) {
        let found = if success {
            self.found.fetch_add(1, Relaxed) + 1
        } else {
            self.found.load(Relaxed)
        };
        let checked = self.checked.fetch_add(1, Relaxed) + 1;
        (checked, found)
    }

    pub(crate) fn complete(&self) {
        self.phase.store(JobPhase::Completed.as_u8(), Relaxed);
    }

    pub fn phase(&self) -> JobPhase {
        JobPhase::from_u8(self.phase.load(Relaxed))
    }

    pub fn total(&self) -> usize {
        self.total.load(Relaxed)
    }

    pub fn checked(&self) -> usize {
        self.checked.load(Relaxed)
    }

    pub fn found(&self) -> usize {
        self.found.load(Relaxed)
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            phase: self.phase(),
            total: self.total(),
            checked: self.checked(),
            found: self.found(),
        }
    }
}

/// Point-in-time copy of a job's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub phase: JobPhase,
    pub total: usize,
    pub checked: usize,
    pub found: usize,
}

impl JobSnapshot {
    pub fn percent(&self) -> usize {
        progress_percent(self.checked, self.total)
    }
}

/// Integer progress percentage; an empty job counts as done.
pub fn progress_percent(checked: usize, total: usize) -> usize {
    if total == 0 {
        100
    } else {
        checked * 100 / total
    }
}
