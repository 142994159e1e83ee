//! ==============================================================================
//! fingerprint.rs - change detection for the raw table
//! ==============================================================================
//!
//! purpose:
//!     rebuilding the table view on every poll is wasted work when the sheet
//!     has not changed. the fingerprint is the serialized grid; two equal
//!     fingerprints mean the table can stay as it is.
//!
//! relationships:
//!     - used by: poll.rs (observe every cycle, reset on config save)
//!
//! ==============================================================================

use rand::Rng;

use crate::domain::RawGrid;

/// deterministic content fingerprint of `grid`
pub fn fingerprint(grid: &RawGrid) -> String {
    match serde_json::to_string(grid) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("[CHANGE] fingerprint serialization failed: {}", e);
            random_fingerprint()
        }
    }
}

// never valid json, so it cannot collide with a real fingerprint
fn random_fingerprint() -> String {
    format!("~{:016x}", rand::thread_rng().gen::<u64>())
}

/// remembers the last fingerprint seen by the poll loop
#[derive(Debug, Default)]
pub struct ChangeDetector {
    last: String,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// true when `grid` differs from the previous observation
    pub fn observe(&mut self, grid: &RawGrid) -> bool {
        let current = fingerprint(grid);
        if current == self.last {
            return false;
        }
        self.last = current;
        true
    }

    /// forget the previous grid so the next observation always reports a change
    pub fn reset(&mut self) {
        self.last.clear();
    }
}
