//! Adapter from decoded export rows to [`ClassificationRecord`]s.
//!
//! Export rows carry three JSON blobs per classification: `subject_data`
//! (keyed by subject id), `metadata` (with `subject_selection_state`) and
//! `annotations` (a list of `{task, value}` objects). Decoding the blobs is
//! the caller's job; this module only plucks the fields the pipeline needs.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{ClassificationRecord, TaskIndex, ANONYMOUS_USER};
use crate::error::{AggregationError, AggregationResult};

/// Filename keys used by the different subject uploads, in priority order.
pub const FILENAME_KEYS: [&str; 3] = ["Filename", "image", "IMAGE"];

/// Suffix of the inspection images; stripped to get the object name.
pub const IMAGE_SUFFIX: &str = "_insp.png";

const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One row of a classification export with its JSON columns decoded.
#[derive(Debug, Clone, Deserialize)]
pub struct RawClassification {
    #[serde(default)]
    pub user_name: Option<String>,
    pub created_at: String,
    pub subject_data: Value,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub annotations: Value,
}

impl RawClassification {
    /// Build a record, extracting answers for each task in `tasks`.
    pub fn into_record(self, tasks: &[TaskIndex]) -> AggregationResult<ClassificationRecord> {
        let object_id = resolve_object_id(&self.subject_data)?;
        let submitted_at = parse_created_at(&self.created_at)?;
        let user_id = self
            .user_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| ANONYMOUS_USER.to_string());

        let mut record = ClassificationRecord::new(object_id, user_id, submitted_at)
            .with_selection_state(
                selection_flag(&self.metadata, "retired"),
                selection_flag(&self.metadata, "already_seen"),
            );
        for &task in tasks {
            if let Some(answer) = extract_task_answer(&self.annotations, task) {
                record.answers.insert(task, answer);
            }
        }
        Ok(record)
    }
}

/// Resolve the object name from a `subject_data` blob.
///
/// Only the entry with the lexically smallest subject id is inspected, since
/// `serde_json` maps are ordered by key; the first of [`FILENAME_KEYS`]
/// holding a string wins and [`IMAGE_SUFFIX`] is stripped from it.
pub fn resolve_object_id(subject_data: &Value) -> AggregationResult<String> {
    let subject = subject_data
        .as_object()
        .and_then(|entries| entries.values().next())
        .ok_or_else(|| AggregationError::missing("subject_data", "no subject entry"))?;

    let filename = FILENAME_KEYS
        .iter()
        .find_map(|key| subject.get(*key).and_then(Value::as_str))
        .ok_or_else(|| {
            AggregationError::missing(
                FILENAME_KEYS.join("|"),
                "subject_data entry has no filename",
            )
        })?;

    let name = filename.strip_suffix(IMAGE_SUFFIX).unwrap_or(filename);
    if name.is_empty() {
        return Err(AggregationError::invalid(
            "Filename",
            filename,
            "empty object name",
        ));
    }
    Ok(name.to_string())
}

/// The answer to `task` in an `annotations` list, if one was given.
///
/// Only string values count as answers; `null` and non-string values are
/// treated as unanswered.
pub fn extract_task_answer(annotations: &Value, task: TaskIndex) -> Option<String> {
    let label = task.label();
    let annotation = annotations
        .as_array()?
        .iter()
        .find(|a| a.get("task").and_then(Value::as_str) == Some(label.as_str()))?;

    match annotation.get("value") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Null) | None => None,
        Some(other) => {
            debug!(task = %task, value = %other, "Ignoring non-string annotation value");
            None
        }
    }
}

/// `metadata.subject_selection_state.<field>`, `false` when absent.
pub fn selection_flag(metadata: &Value, field: &str) -> bool {
    metadata
        .get("subject_selection_state")
        .and_then(|state| state.get(field))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Parse an export `created_at` value (`2020-09-02 07:47:42 UTC` or RFC 3339).
pub fn parse_created_at(raw: &str) -> AggregationResult<DateTime<Utc>> {
    let trimmed = raw.trim();
    let naive_part = trimmed.strip_suffix(" UTC").unwrap_or(trimmed);
    if let Ok(naive) = NaiveDateTime::parse_from_str(naive_part, CREATED_AT_FORMAT) {
        return Ok(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AggregationError::invalid("created_at", raw, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_resolve_object_id_prefers_filename_key() {
        let data = json!({"5123": {"image": "other_insp.png", "Filename": "J1234_insp.png"}});
        assert_eq!(resolve_object_id(&data).unwrap(), "J1234");
    }

    #[test]
    fn test_resolve_object_id_falls_back_in_order() {
        let data = json!({"9": {"IMAGE": "UDG7_insp.png"}});
        assert_eq!(resolve_object_id(&data).unwrap(), "UDG7");

        let data = json!({"9": {"image": "UDG8_insp.png", "IMAGE": "x_insp.png"}});
        assert_eq!(resolve_object_id(&data).unwrap(), "UDG8");
    }

    #[test]
    fn test_resolve_object_id_uses_smallest_subject_id() {
        let data = json!({
            "9": {"Filename": "late_insp.png"},
            "10": {"Filename": "early_insp.png"},
        });
        assert_eq!(resolve_object_id(&data).unwrap(), "early");
    }

    #[test]
    fn test_resolve_object_id_missing_is_error() {
        let data = json!({"9": {"retired": null}});
        let err = resolve_object_id(&data).unwrap_err();
        assert!(matches!(err, AggregationError::MissingField { .. }));

        let err = resolve_object_id(&json!({})).unwrap_err();
        assert!(matches!(err, AggregationError::MissingField { .. }));
    }

    #[test]
    fn test_extract_task_answer() {
        let annotations = json!([
            {"task": "T0", "value": "Galaxy"},
            {"task": "T1", "value": null},
            {"task": "T2", "value": ["a", "b"]}
        ]);
        assert_eq!(
            extract_task_answer(&annotations, TaskIndex(0)).as_deref(),
            Some("Galaxy")
        );
        assert_eq!(extract_task_answer(&annotations, TaskIndex(1)), None);
        assert_eq!(extract_task_answer(&annotations, TaskIndex(2)), None);
        assert_eq!(extract_task_answer(&annotations, TaskIndex(5)), None);
    }

    #[test]
    fn test_selection_flag_defaults_to_false() {
        let metadata = json!({"subject_selection_state": {"retired": true}});
        assert!(selection_flag(&metadata, "retired"));
        assert!(!selection_flag(&metadata, "already_seen"));
        assert!(!selection_flag(&Value::Null, "retired"));
    }

    #[test]
    fn test_parse_created_at_formats() {
        let expected = Utc.with_ymd_and_hms(2020, 9, 2, 7, 47, 42).unwrap();
        assert_eq!(parse_created_at("2020-09-02 07:47:42 UTC").unwrap(), expected);
        assert_eq!(parse_created_at("2020-09-02T07:47:42Z").unwrap(), expected);
        assert!(parse_created_at("yesterday").is_err());
    }

    #[test]
    fn test_into_record() {
        let raw: RawClassification = serde_json::from_value(json!({
            "user_name": null,
            "created_at": "2020-11-01 10:00:00 UTC",
            "subject_data": {"77": {"Filename": "J42_insp.png"}},
            "metadata": {"subject_selection_state": {"already_seen": true}},
            "annotations": [{"task": "T0", "value": "Galaxy"}]
        }))
        .unwrap();

        let record = raw
            .into_record(&[TaskIndex::PRIMARY, TaskIndex::SECONDARY])
            .unwrap();
        assert_eq!(record.object_id, "J42");
        assert!(record.is_anonymous());
        assert!(record.already_seen);
        assert!(!record.is_retired);
        assert_eq!(record.answer(TaskIndex::PRIMARY), Some("Galaxy"));
        assert_eq!(record.answer(TaskIndex::SECONDARY), None);
    }
}
