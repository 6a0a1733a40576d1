//! Per-chat ledger of one-time answer judgments.

use std::collections::{HashMap, HashSet};
use billy_types::feedback::FeedbackStatus;

/// Message index → recorded status, plus indexes with a submission in
/// flight. A recorded status is never revised.
#[derive(Debug, Clone, Default)]
pub struct FeedbackLedger {
    recorded: HashMap<usize, FeedbackStatus>,
    pending: HashSet<usize>,
}

impl FeedbackLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, index: usize) -> Option<FeedbackStatus> {
        self.recorded.get(&index).copied()
    }

    pub fn is_pending(&self, index: usize) -> bool {
        self.pending.contains(&index)
    }

    /// Controls for this index are disabled.
    pub fn is_locked(&self, index: usize) -> bool {
        self.recorded.contains_key(&index) || self.pending.contains(&index)
    }

    /// Claim the index for a submission. False when already locked.
    pub fn begin(&mut self, index: usize) -> bool {
        if self.is_locked(index) {
            return false;
        }
        self.pending.insert(index)
    }

    /// Release the claim; on success the status becomes permanent.
    pub fn finish(&mut self, index: usize, status: FeedbackStatus, success: bool) {
        self.pending.remove(&index);
        if success {
            self.recorded.entry(index).or_insert(status);
        }
    }

    pub fn recorded_count(&self) -> usize {
        self.recorded.len()
    }
}
