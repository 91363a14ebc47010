//! Classification records as consumed by every aggregation stage.
//!
//! A [`ClassificationRecord`] is one volunteer's single submission with its
//! nested export blobs already resolved. [`subject`] holds the adapter that
//! builds records from decoded export rows.

pub mod subject;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AggregationError, AggregationResult};

pub use subject::{
    extract_task_answer, parse_created_at, resolve_object_id, selection_flag, RawClassification,
};

/// User id shared by every volunteer who classified without logging in.
///
/// Exports write either the bare sentinel or the sentinel followed by
/// `-<hash>`; both forms are treated as anonymous.
pub const ANONYMOUS_USER: &str = "not-logged-in";

/// Index of a task in a classification workflow (`T0`, `T1`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskIndex(pub u8);

impl TaskIndex {
    /// The "what is this?" task every classification must answer.
    pub const PRIMARY: TaskIndex = TaskIndex(0);
    /// The follow-up "how does it look?" task.
    pub const SECONDARY: TaskIndex = TaskIndex(1);

    /// Label used in export annotations, e.g. `T0`.
    pub fn label(&self) -> String {
        format!("T{}", self.0)
    }
}

impl fmt::Display for TaskIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

impl FromStr for TaskIndex {
    type Err = AggregationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('T')
            .or_else(|| trimmed.strip_prefix('t'))
            .unwrap_or(trimmed);
        digits
            .parse::<u8>()
            .map(TaskIndex)
            .map_err(|e| AggregationError::invalid("task", s, e.to_string()))
    }
}

impl TryFrom<String> for TaskIndex {
    type Error = AggregationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaskIndex> for String {
    fn from(task: TaskIndex) -> Self {
        task.label()
    }
}

/// One volunteer's single classification of one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    /// Stable identifier of the classified object.
    pub object_id: String,
    /// Volunteer identifier; anonymous volunteers share [`ANONYMOUS_USER`].
    pub user_id: String,
    /// Submission time, used only by the exclusion-window filter.
    pub submitted_at: DateTime<Utc>,
    /// Answers keyed by task; a missing key means the task was not answered.
    #[serde(default)]
    pub answers: BTreeMap<TaskIndex, String>,
    /// Object had already been retired when this was submitted.
    #[serde(default)]
    pub is_retired: bool,
    /// Volunteer had already seen this object.
    #[serde(default)]
    pub already_seen: bool,
}

impl ClassificationRecord {
    /// Create a record with no answers and both selection flags cleared.
    pub fn new(
        object_id: impl Into<String>,
        user_id: impl Into<String>,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            object_id: object_id.into(),
            user_id: user_id.into(),
            submitted_at,
            answers: BTreeMap::new(),
            is_retired: false,
            already_seen: false,
        }
    }

    /// Set the answer for `task`.
    pub fn with_answer(mut self, task: TaskIndex, answer: impl Into<String>) -> Self {
        self.answers.insert(task, answer.into());
        self
    }

    /// Set the retired/already-seen selection flags.
    pub fn with_selection_state(mut self, is_retired: bool, already_seen: bool) -> Self {
        self.is_retired = is_retired;
        self.already_seen = already_seen;
        self
    }

    /// The answer given for `task`, if any.
    pub fn answer(&self, task: TaskIndex) -> Option<&str> {
        self.answers.get(&task).map(String::as_str)
    }

    /// The answer for `task`, or `MissingField` naming the object.
    pub fn require_answer(&self, task: TaskIndex) -> AggregationResult<&str> {
        self.answer(task).ok_or_else(|| {
            AggregationError::missing(task.label(), format!("object {}", self.object_id))
        })
    }

    /// Whether the object had already reached its quota for this volunteer.
    pub fn is_finalized(&self) -> bool {
        self.is_retired || self.already_seen
    }

    /// Whether the volunteer was not logged in.
    pub fn is_anonymous(&self) -> bool {
        is_anonymous_user(&self.user_id)
    }
}

/// Whether `user_id` is the anonymous sentinel (with or without a hash suffix).
pub fn is_anonymous_user(user_id: &str) -> bool {
    user_id == ANONYMOUS_USER
        || user_id
            .strip_prefix(ANONYMOUS_USER)
            .is_some_and(|rest| rest.starts_with('-'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 11, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_task_index_parse_and_display() {
        assert_eq!("T0".parse::<TaskIndex>().unwrap(), TaskIndex(0));
        assert_eq!("3".parse::<TaskIndex>().unwrap(), TaskIndex(3));
        assert_eq!(TaskIndex(9).to_string(), "T9");
        assert!("Tx".parse::<TaskIndex>().is_err());
    }

    #[test]
    fn test_record_deserializes_without_selection_flags() {
        let json = r#"{
            "object_id": "J0123",
            "user_id": "alice",
            "submitted_at": "2020-11-02T10:00:00Z",
            "answers": {"T0": "Galaxy", "T1": "Fluffy"}
        }"#;
        let record: ClassificationRecord = serde_json::from_str(json).unwrap();
        assert!(!record.is_retired);
        assert!(!record.already_seen);
        assert_eq!(record.answer(TaskIndex::PRIMARY), Some("Galaxy"));
        assert_eq!(record.answer(TaskIndex::SECONDARY), Some("Fluffy"));
    }

    #[test]
    fn test_record_serializes_task_labels() {
        let record =
            ClassificationRecord::new("A", "u1", at(1)).with_answer(TaskIndex(0), "Galaxy");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["answers"]["T0"], "Galaxy");
    }

    #[test]
    fn test_require_answer_reports_object() {
        let record = ClassificationRecord::new("A", "u1", at(1));
        let err = record.require_answer(TaskIndex::PRIMARY).unwrap_err();
        assert!(err.to_string().contains("object A"));
    }

    #[test]
    fn test_anonymous_detection() {
        assert!(is_anonymous_user("not-logged-in"));
        assert!(is_anonymous_user("not-logged-in-5f2e9c"));
        assert!(!is_anonymous_user("not-logged-inside"));
        assert!(!is_anonymous_user("alice"));
    }
}
