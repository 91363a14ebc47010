//! Fleiss' kappa over per-object vote tallies.
//!
//! Objects are subjects and volunteers are raters; the number of raters may
//! differ per object. Per-object agreement is averaged without weighting by
//! rater count, and objects with a single rater count as full agreement.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AggregationError, AggregationResult};
use crate::record::TaskIndex;
use crate::tally::VoteTally;

const STAGE: &str = "fleiss_kappa";

/// Chance agreement this close to 1 makes kappa undefined.
const DEGENERATE_EPSILON: f64 = 1e-12;

/// Per-object tallies for one task plus the grand total of their votes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementInput {
    pub task: TaskIndex,
    pub tallies: Vec<VoteTally>,
    /// Total valid records contributing to `task` across all objects.
    pub total_records: usize,
}

impl AgreementInput {
    /// Use the sum of the tallies' votes as the grand total.
    pub fn from_tallies<I>(task: TaskIndex, tallies: I) -> Self
    where
        I: IntoIterator<Item = VoteTally>,
    {
        let tallies: Vec<VoteTally> = tallies.into_iter().collect();
        let total_records = tallies.iter().map(|t| t.total_votes).sum();
        Self {
            task,
            tallies,
            total_records,
        }
    }

    /// Every answer seen in at least one tally.
    pub fn observed_answers(&self) -> BTreeSet<String> {
        self.tallies
            .iter()
            .flat_map(|t| t.counts.keys().cloned())
            .collect()
    }

    /// Kappa over `answers`.
    pub fn kappa<S: AsRef<str>>(&self, answers: &[S]) -> AggregationResult<f64> {
        let kappa = fleiss_kappa(&self.tallies, self.total_records, answers)?;
        debug!(task = %self.task, objects = self.tallies.len(), kappa, "Computed Fleiss' kappa");
        Ok(kappa)
    }

    /// Kappa over every observed answer.
    pub fn kappa_observed(&self) -> AggregationResult<f64> {
        let answers: Vec<String> = self.observed_answers().into_iter().collect();
        self.kappa(&answers)
    }
}

/// Answer categories with repeats removed; each category counts once.
fn distinct_answers<S: AsRef<str>>(answers: &[S]) -> BTreeSet<&str> {
    answers.iter().map(|a| a.as_ref()).collect()
}

/// Agreement among the raters of a single object.
///
/// Fewer than two raters is defined as full agreement. Repeated entries in
/// `answers` are ignored.
pub fn object_agreement<S: AsRef<str>>(tally: &VoteTally, answers: &[S]) -> f64 {
    agreement_over(tally, &distinct_answers(answers))
}

fn agreement_over(tally: &VoteTally, answers: &BTreeSet<&str>) -> f64 {
    let n = tally.total_votes;
    if n < 2 {
        return 1.0;
    }
    let agreeing_pairs: usize = answers
        .iter()
        .map(|a| {
            let c = tally.count(a);
            c * c.saturating_sub(1)
        })
        .sum();
    agreeing_pairs as f64 / (n * (n - 1)) as f64
}

/// Fleiss' kappa for `tallies`, where `total_records` is the number of valid
/// records behind them and `answers` the answer categories of the task
/// (treated as a set: repeats are ignored).
///
/// Fails with `EmptyPopulation` when there are no records or no objects and
/// with `DegenerateAgreement` when every vote has the same answer.
pub fn fleiss_kappa<S: AsRef<str>>(
    tallies: &[VoteTally],
    total_records: usize,
    answers: &[S],
) -> AggregationResult<f64> {
    if total_records == 0 || tallies.is_empty() {
        return Err(AggregationError::EmptyPopulation { stage: STAGE });
    }
    let n = total_records as f64;
    let answers = distinct_answers(answers);

    let expected: f64 = answers
        .iter()
        .map(|a| {
            let chosen: usize = tallies.iter().map(|t| t.count(a)).sum();
            let p = chosen as f64 / n;
            p * p
        })
        .sum();

    let observed = tallies
        .iter()
        .map(|t| agreement_over(t, &answers))
        .sum::<f64>()
        / tallies.len() as f64;

    if (1.0 - expected).abs() < DEGENERATE_EPSILON {
        return Err(AggregationError::DegenerateAgreement {
            stage: STAGE,
            total_records,
        });
    }

    Ok((observed - expected) / (1.0 - expected))
}
