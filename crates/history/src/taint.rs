//! Surface taint tracking

use serde::Serialize;

/// Whether the surface can currently be read back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaintState {
    #[default]
    Clean,
    /// A surface read failed; history reads are disabled
    Tainted,
}

/// Two-state taint flag owned by one history
///
/// Transitions report whether the state actually changed, so callers only
/// announce the flag when it flips.
#[derive(Debug, Default)]
pub struct TaintTracker {
    state: TaintState,
}

impl TaintTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed surface read. Returns `true` if this tainted a clean history.
    pub fn mark_tainted(&mut self) -> bool {
        let changed = self.state == TaintState::Clean;
        self.state = TaintState::Tainted;
        changed
    }

    /// Record a successful push. Returns `true` if a taint was lifted.
    pub fn clear(&mut self) -> bool {
        let changed = self.state == TaintState::Tainted;
        self.state = TaintState::Clean;
        changed
    }

    pub fn is_tainted(&self) -> bool {
        self.state == TaintState::Tainted
    }

    pub fn state(&self) -> TaintState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_report_changes() {
        let mut taint = TaintTracker::new();
        assert!(!taint.is_tainted());

        assert!(taint.mark_tainted());
        assert!(!taint.mark_tainted());
        assert_eq!(taint.state(), TaintState::Tainted);

        assert!(taint.clear());
        assert!(!taint.clear());
        assert_eq!(taint.state(), TaintState::Clean);
    }
}
