//! Grouping of records into per-object tallies.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{VoteTally, UNANSWERED};
use crate::record::{ClassificationRecord, TaskIndex};

/// Knobs for [`aggregate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyOptions {
    /// Count unanswered records under [`UNANSWERED`] instead of skipping them.
    #[serde(default)]
    pub track_unanswered: bool,
    /// Keep only tallies with strictly more than this many votes.
    #[serde(default)]
    pub min_votes: Option<usize>,
}

impl TallyOptions {
    pub fn tracking_unanswered() -> Self {
        Self {
            track_unanswered: true,
            min_votes: None,
        }
    }

    pub fn with_min_votes(mut self, min_votes: usize) -> Self {
        self.min_votes = Some(min_votes);
        self
    }
}

/// Restricts a tally to records that gave `answer` for `task`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerCondition {
    pub task: TaskIndex,
    pub answer: String,
}

impl AnswerCondition {
    pub fn new(task: TaskIndex, answer: impl Into<String>) -> Self {
        Self {
            task,
            answer: answer.into(),
        }
    }

    pub fn matches(&self, record: &ClassificationRecord) -> bool {
        record.answer(self.task) == Some(self.answer.as_str())
    }
}

/// Tally `task` answers for every candidate object that has records.
///
/// Candidates without records are omitted. The result is ordered by object
/// id, so output never depends on the order records arrive in.
pub fn aggregate<'a, I>(
    records: &[ClassificationRecord],
    task: TaskIndex,
    candidate_object_ids: I,
    options: &TallyOptions,
) -> BTreeMap<String, VoteTally>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut groups: HashMap<&str, Vec<&ClassificationRecord>> = HashMap::new();
    for record in records {
        groups.entry(record.object_id.as_str()).or_default().push(record);
    }

    let mut tallies = BTreeMap::new();
    let mut missing = 0usize;
    for object_id in candidate_object_ids {
        let Some(group) = groups.get(object_id) else {
            missing += 1;
            continue;
        };

        let mut tally = VoteTally::new(object_id);
        for record in group {
            match record.answer(task) {
                Some(answer) => tally.record(answer),
                None if options.track_unanswered => tally.record(UNANSWERED),
                None => {}
            }
        }

        if options.min_votes.is_some_and(|min| tally.total_votes <= min) {
            continue;
        }
        tallies.insert(object_id.to_string(), tally);
    }

    debug!(
        task = %task,
        groups = groups.len(),
        tallies = tallies.len(),
        missing,
        "Aggregated votes"
    );
    tallies
}

/// Tally `task` only among records that satisfy `condition`.
///
/// Unanswered records are always counted under [`UNANSWERED`], so each
/// tally's `total_votes` is the size of the restricted group and the shares
/// of all answers (including `"None"`) add up to 100.
pub fn aggregate_conditional<'a, I>(
    records: &[ClassificationRecord],
    condition: &AnswerCondition,
    task: TaskIndex,
    candidate_object_ids: I,
    options: &TallyOptions,
) -> BTreeMap<String, VoteTally>
where
    I: IntoIterator<Item = &'a str>,
{
    let restricted: Vec<ClassificationRecord> = records
        .iter()
        .filter(|r| condition.matches(r))
        .cloned()
        .collect();

    let options = TallyOptions {
        track_unanswered: true,
        ..options.clone()
    };
    aggregate(&restricted, task, candidate_object_ids, &options)
}
