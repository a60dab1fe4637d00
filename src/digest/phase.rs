//! Phase guard: at most one digest or exclusive run per tree.

use crate::error::DigestError;
use std::cell::Cell;
use std::fmt;

/// What a tree is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    None,
    /// A stabilization cycle is running.
    Digest,
    /// A `run_with_cycle` expression is running.
    Apply,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::None => "none",
            Phase::Digest => "digest",
            Phase::Apply => "apply",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Holds a phase until dropped, so every exit path clears it.
pub(crate) struct PhaseGuard<'a> {
    phase: &'a Cell<Phase>,
}

impl<'a> PhaseGuard<'a> {
    pub(crate) fn begin(phase: &'a Cell<Phase>, requested: Phase) -> Result<Self, DigestError> {
        let active = phase.get();
        if active != Phase::None {
            return Err(DigestError::PhaseConflict { active, requested });
        }
        phase.set(requested);
        Ok(Self { phase })
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.phase.set(Phase::None);
    }
}
