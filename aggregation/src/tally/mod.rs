//! Per-object vote tallies and answer shares.
//!
//! A [`VoteTally`] counts how many valid records chose each answer for one
//! task on one object. Percentages are derived on demand with
//! [`VoteTally::share`] and rounded to one decimal place.

pub mod aggregator;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use aggregator::{aggregate, aggregate_conditional, AnswerCondition, TallyOptions};

/// Answer key used for records that left the tallied task unanswered.
pub const UNANSWERED: &str = "None";

/// Vote counts for one object and one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub object_id: String,
    /// Occurrences per answer; every stored count is at least 1.
    pub counts: BTreeMap<String, usize>,
    /// Always equal to the sum of `counts`.
    pub total_votes: usize,
}

impl VoteTally {
    pub fn new(object_id: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            counts: BTreeMap::new(),
            total_votes: 0,
        }
    }

    /// Count one vote for `answer`.
    pub fn record(&mut self, answer: &str) {
        *self.counts.entry(answer.to_string()).or_insert(0) += 1;
        self.total_votes += 1;
    }

    /// Votes for `answer`, 0 if unseen.
    pub fn count(&self, answer: &str) -> usize {
        self.counts.get(answer).copied().unwrap_or(0)
    }

    /// Percentage of this object's votes that chose `answer`.
    ///
    /// Rounded to one decimal; `0.0` for unseen answers or an empty tally.
    pub fn share(&self, answer: &str) -> f64 {
        percentage(self.count(answer), self.total_votes)
    }

    /// The answer with the most votes; ties go to the lexically first answer.
    pub fn leading_answer(&self) -> Option<(&str, usize)> {
        let mut best: Option<(&str, usize)> = None;
        for (answer, &count) in &self.counts {
            if best.map_or(true, |(_, best_count)| count > best_count) {
                best = Some((answer.as_str(), count));
            }
        }
        best
    }
}

/// `100 * count / total` rounded to one decimal, 0 when `total` is 0.
pub fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_one_decimal(100.0 * count as f64 / total as f64)
}

pub(crate) fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Percentages of a fixed answer list for one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectShares {
    pub object_id: String,
    pub total_votes: usize,
    /// `(answer, percentage)` in the order the answers were requested.
    pub shares: Vec<(String, f64)>,
}

impl ObjectShares {
    pub fn from_tally<S: AsRef<str>>(tally: &VoteTally, answers: &[S]) -> Self {
        Self {
            object_id: tally.object_id.clone(),
            total_votes: tally.total_votes,
            shares: answers
                .iter()
                .map(|a| (a.as_ref().to_string(), tally.share(a.as_ref())))
                .collect(),
        }
    }

    /// Percentage for `answer`, if it was requested.
    pub fn get(&self, answer: &str) -> Option<f64> {
        self.shares
            .iter()
            .find(|(a, _)| a == answer)
            .map(|(_, share)| *share)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tally(votes: &[&str]) -> VoteTally {
        let mut t = VoteTally::new("A");
        for v in votes {
            t.record(v);
        }
        t
    }

    #[test]
    fn test_shares_round_to_one_decimal() {
        let t = tally(&["Galaxy", "Galaxy", "Cluster"]);
        assert_eq!(t.total_votes, 3);
        assert_eq!(t.count("Galaxy"), 2);
        assert_eq!(t.share("Galaxy"), 66.7);
        assert_eq!(t.share("Cluster"), 33.3);
        assert_eq!(t.share("Other"), 0.0);
    }

    #[test]
    fn test_empty_tally_has_zero_share() {
        let t = VoteTally::new("A");
        assert_eq!(t.share("Galaxy"), 0.0);
        assert_eq!(t.leading_answer(), None);
    }

    #[test]
    fn test_leading_answer_tie_break() {
        let t = tally(&["b", "a", "b", "a", "c"]);
        assert_eq!(t.leading_answer(), Some(("a", 2)));
    }

    #[test]
    fn test_object_shares_keep_requested_order() {
        let t = tally(&["Galaxy", "Something else/empty center"]);
        let row = ObjectShares::from_tally(
            &t,
            &["Galaxy", "Group of objects (Cluster)", "Something else/empty center"],
        );
        assert_eq!(row.shares[0], ("Galaxy".to_string(), 50.0));
        assert_eq!(row.get("Group of objects (Cluster)"), Some(0.0));
        assert_eq!(row.get("missing"), None);
    }
}
