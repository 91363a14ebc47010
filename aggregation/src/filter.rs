//! Record filter: drops classifications that must not count as votes.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::record::{ClassificationRecord, TaskIndex};

/// Validity rules applied before any aggregation.
#[derive(Debug, Clone)]
pub struct RecordFilter {
    /// Records submitted at or before this instant are excluded.
    pub excluded_before: DateTime<Utc>,
    /// If set, records without an answer for this task are excluded.
    pub required_task: Option<TaskIndex>,
}

/// Why a record was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Unanswered,
    ExcludedWindow,
    Finalized,
}

impl RecordFilter {
    pub fn new(excluded_before: DateTime<Utc>) -> Self {
        Self {
            excluded_before,
            required_task: None,
        }
    }

    /// Require an answer for `task`.
    pub fn requiring(mut self, task: TaskIndex) -> Self {
        self.required_task = Some(task);
        self
    }

    /// First rule `record` violates, or `None` if it is valid.
    pub fn check(&self, record: &ClassificationRecord) -> Option<Rejection> {
        if let Some(task) = self.required_task {
            if record.answer(task).is_none() {
                return Some(Rejection::Unanswered);
            }
        }
        if record.submitted_at <= self.excluded_before {
            return Some(Rejection::ExcludedWindow);
        }
        if record.is_finalized() {
            return Some(Rejection::Finalized);
        }
        None
    }

    /// The subsequence of `records` that passes every rule, in input order.
    pub fn apply(&self, records: &[ClassificationRecord]) -> Vec<ClassificationRecord> {
        let (mut unanswered, mut windowed, mut finalized) = (0usize, 0usize, 0usize);
        let kept: Vec<ClassificationRecord> = records
            .iter()
            .filter(|record| match self.check(record) {
                None => true,
                Some(Rejection::Unanswered) => {
                    unanswered += 1;
                    false
                }
                Some(Rejection::ExcludedWindow) => {
                    windowed += 1;
                    false
                }
                Some(Rejection::Finalized) => {
                    finalized += 1;
                    false
                }
            })
            .cloned()
            .collect();

        debug!(
            input = records.len(),
            kept = kept.len(),
            unanswered,
            windowed,
            finalized,
            "Filtered classification records"
        );
        kept
    }
}
