//! Cumulative vote-share curve: how much of the dataset comes from users
//! with at most `n` records each.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::activity::UserActivity;
use crate::error::{AggregationError, AggregationResult};

/// One distinct per-user record count and its contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteShareRow {
    /// Records per user at this level.
    pub vote_count: usize,
    /// Fraction of all votes cast by users at exactly this level.
    pub share: f64,
    /// Fraction of all votes cast by users at or below this level.
    pub cumulative_share: f64,
    /// Users with exactly `vote_count` records.
    pub user_count: usize,
}

/// Build the curve, ascending by `vote_count`.
///
/// No users yields an empty curve. Users whose counts add up to zero votes
/// cannot be normalised and fail with `EmptyPopulation`.
pub fn running_vote_fraction(activities: &[UserActivity]) -> AggregationResult<Vec<VoteShareRow>> {
    if activities.is_empty() {
        return Ok(Vec::new());
    }

    let mut histogram: BTreeMap<usize, usize> = BTreeMap::new();
    for activity in activities {
        *histogram.entry(activity.record_count).or_insert(0) += 1;
    }

    let total_votes: usize = activities.iter().map(|a| a.record_count).sum();
    if total_votes == 0 {
        return Err(AggregationError::EmptyPopulation {
            stage: "running_vote_fraction",
        });
    }
    let total = total_votes as f64;

    let mut cumulative_votes = 0usize;
    let rows = histogram
        .into_iter()
        .map(|(vote_count, user_count)| {
            let votes_at_level = vote_count * user_count;
            cumulative_votes += votes_at_level;
            VoteShareRow {
                vote_count,
                share: votes_at_level as f64 / total,
                cumulative_share: cumulative_votes as f64 / total,
                user_count,
            }
        })
        .collect();
    Ok(rows)
}

/// Smallest per-user record count at which users at or below it account for
/// at least `fraction` of all votes.
pub fn vote_count_at_fraction(rows: &[VoteShareRow], fraction: f64) -> Option<usize> {
    rows.iter()
        .find(|row| row.cumulative_share >= fraction)
        .map(|row| row.vote_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_and_prefix_sum() {
        let users = vec![
            UserActivity::new("a", 1),
            UserActivity::new("b", 3),
            UserActivity::new("c", 1),
        ];
        let rows = running_vote_fraction(&users).unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].vote_count, 1);
        assert_eq!(rows[0].user_count, 2);
        assert!((rows[0].share - 0.4).abs() < 1e-12);
        assert!((rows[0].cumulative_share - 0.4).abs() < 1e-12);

        assert_eq!(rows[1].vote_count, 3);
        assert_eq!(rows[1].user_count, 1);
        assert!((rows[1].share - 0.6).abs() < 1e-12);
        assert!((rows[1].cumulative_share - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_users_is_empty() {
        assert!(running_vote_fraction(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_zero_votes_is_error() {
        let err = running_vote_fraction(&[UserActivity::new("a", 0)]).unwrap_err();
        assert!(matches!(err, AggregationError::EmptyPopulation { .. }));
    }

    #[test]
    fn test_vote_count_at_fraction() {
        let users = vec![
            UserActivity::new("a", 1),
            UserActivity::new("b", 1),
            UserActivity::new("c", 8),
        ];
        let rows = running_vote_fraction(&users).unwrap();
        assert_eq!(vote_count_at_fraction(&rows, 0.1), Some(1));
        assert_eq!(vote_count_at_fraction(&rows, 0.5), Some(8));
        assert_eq!(vote_count_at_fraction(&[], 0.5), None);
    }
}
