//! Per-user activity counts and power-user cohorts.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::record::{is_anonymous_user, ClassificationRecord};

/// Number of valid records one volunteer contributed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserActivity {
    pub user_id: String,
    pub record_count: usize,
}

impl UserActivity {
    pub fn new(user_id: impl Into<String>, record_count: usize) -> Self {
        Self {
            user_id: user_id.into(),
            record_count,
        }
    }

    /// Whether this user meets the inclusive `threshold`.
    pub fn is_power_user(&self, threshold: usize) -> bool {
        self.record_count >= threshold && !is_anonymous_user(&self.user_id)
    }
}

/// Record counts per user, in first-seen order.
pub fn user_activity(records: &[ClassificationRecord]) -> Vec<UserActivity> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut activity: Vec<UserActivity> = Vec::new();
    for record in records {
        match index.get(record.user_id.as_str()) {
            Some(&slot) => activity[slot].record_count += 1,
            None => {
                index.insert(record.user_id.as_str(), activity.len());
                activity.push(UserActivity::new(record.user_id.clone(), 1));
            }
        }
    }
    activity
}

/// Users with at least `threshold` records. Anonymous users never qualify.
///
/// Order follows first appearance in `records`; sort if order matters.
pub fn select_power_users(records: &[ClassificationRecord], threshold: usize) -> Vec<UserActivity> {
    let power_users: Vec<UserActivity> = user_activity(records)
        .into_iter()
        .filter(|user| user.is_power_user(threshold))
        .collect();

    debug!(
        threshold,
        power_users = power_users.len(),
        "Selected power users"
    );
    power_users
}

/// Only the records contributed by power users at `threshold`.
pub fn filter_by_power_users(
    records: &[ClassificationRecord],
    threshold: usize,
) -> Vec<ClassificationRecord> {
    restrict_to_users(records, &select_power_users(records, threshold))
}

/// Only the records contributed by one of `users`.
pub fn restrict_to_users(
    records: &[ClassificationRecord],
    users: &[UserActivity],
) -> Vec<ClassificationRecord> {
    let members: HashSet<&str> = users.iter().map(|u| u.user_id.as_str()).collect();

    records
        .iter()
        .filter(|record| members.contains(record.user_id.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ANONYMOUS_USER;
    use chrono::{TimeZone, Utc};

    fn records_for(users: &[(&str, usize)]) -> Vec<ClassificationRecord> {
        let ts = Utc.with_ymd_and_hms(2020, 11, 1, 0, 0, 0).unwrap();
        users
            .iter()
            .flat_map(|(user, n)| {
                (0..*n).map(move |i| ClassificationRecord::new(format!("obj{i}"), *user, ts))
            })
            .collect()
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let records = records_for(&[("u1", 3), ("u2", 1), ("u3", 2)]);
        let mut users: Vec<String> = select_power_users(&records, 2)
            .into_iter()
            .map(|u| u.user_id)
            .collect();
        users.sort();
        assert_eq!(users, vec!["u1", "u3"]);
    }

    #[test]
    fn test_anonymous_never_power_user() {
        let records = records_for(&[(ANONYMOUS_USER, 50), ("u1", 5)]);
        let users = select_power_users(&records, 1);
        assert_eq!(users, vec![UserActivity::new("u1", 5)]);
    }

    #[test]
    fn test_user_activity_counts_in_first_seen_order() {
        let records = records_for(&[("b", 2), ("a", 1)]);
        assert_eq!(
            user_activity(&records),
            vec![UserActivity::new("b", 2), UserActivity::new("a", 1)]
        );
    }

    #[test]
    fn test_restrict_to_users_matches_filter_by_power_users() {
        let records = records_for(&[("u1", 3), ("u2", 1), ("u3", 2)]);
        let cohort = select_power_users(&records, 2);
        let restricted = restrict_to_users(&records, &cohort);
        assert_eq!(restricted, filter_by_power_users(&records, 2));
        assert_eq!(restricted.len(), 5);
        assert!(restrict_to_users(&records, &[]).is_empty());
    }

    #[test]
    fn test_filter_by_power_users() {
        let records = records_for(&[("u1", 3), ("u2", 1)]);
        let kept = filter_by_power_users(&records, 2);
        assert_eq!(kept.len(), 3);
        assert!(kept.iter().all(|r| r.user_id == "u1"));
    }
}
