//! End-to-end run: filter, optional power-user restriction, tallies,
//! agreement and the vote-share curve.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, info, info_span};

use crate::activity::{restrict_to_users, select_power_users, user_activity, UserActivity};
use crate::agreement::AgreementInput;
use crate::config::PipelineConfig;
use crate::curve::{running_vote_fraction, vote_count_at_fraction, VoteShareRow};
use crate::error::AggregationResult;
use crate::filter::RecordFilter;
use crate::record::{ClassificationRecord, TaskIndex};
use crate::tally::{
    aggregate, aggregate_conditional, AnswerCondition, ObjectShares, TallyOptions, VoteTally,
    UNANSWERED,
};

/// Rows shown in the markdown "top objects" table.
const REPORT_TOP_OBJECTS: usize = 10;

/// Everything one run produces.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub input_records: usize,
    pub valid_records: usize,
    /// Records left after the optional power-user restriction.
    pub aggregated_records: usize,
    pub primary_task: TaskIndex,
    pub secondary_task: TaskIndex,
    pub primary_tallies: BTreeMap<String, VoteTally>,
    pub secondary_tallies: BTreeMap<String, VoteTally>,
    pub primary_shares: Vec<ObjectShares>,
    pub secondary_shares: Vec<ObjectShares>,
    /// Fleiss' kappa over the primary tallies; `None` when no object has
    /// primary votes to compare.
    pub kappa: Option<f64>,
    /// Users at or above the configured threshold; empty if none configured.
    pub power_users: Vec<UserActivity>,
    pub curve: Vec<VoteShareRow>,
}

/// Configured pipeline.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run over every object that appears in `records`.
    pub fn run(&self, records: &[ClassificationRecord]) -> AggregationResult<PipelineReport> {
        let objects: BTreeSet<&str> = records.iter().map(|r| r.object_id.as_str()).collect();
        self.run_for(records, objects)
    }

    /// Run over the caller's universe of candidate objects.
    pub fn run_for<'a, I>(
        &self,
        records: &[ClassificationRecord],
        candidate_object_ids: I,
    ) -> AggregationResult<PipelineReport>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let config = &self.config;
        let _span = info_span!("pipeline", task = %config.primary_task).entered();

        let valid = RecordFilter::new(config.excluded_before)
            .requiring(config.primary_task)
            .apply(records);

        let (aggregated, power_users) = match config.power_user_threshold {
            Some(threshold) => {
                let cohort = select_power_users(&valid, threshold);
                (restrict_to_users(&valid, &cohort), cohort)
            }
            None => (valid.clone(), Vec::new()),
        };

        let options = TallyOptions {
            track_unanswered: false,
            min_votes: config.min_votes,
        };

        let primary_tallies = aggregate(
            &aggregated,
            config.primary_task,
            candidate_object_ids,
            &options,
        );
        // Secondary tallies only cover objects kept in the primary tallies.
        let condition =
            AnswerCondition::new(config.primary_task, config.secondary_condition.clone());
        let secondary_tallies = aggregate_conditional(
            &aggregated,
            &condition,
            config.secondary_task,
            primary_tallies.keys().map(String::as_str),
            &TallyOptions::default(),
        );

        let primary_shares: Vec<ObjectShares> = primary_tallies
            .values()
            .map(|t| ObjectShares::from_tally(t, &config.primary_answers))
            .collect();
        let mut secondary_answers = config.secondary_answers.clone();
        secondary_answers.push(UNANSWERED.to_string());
        let secondary_shares: Vec<ObjectShares> = secondary_tallies
            .values()
            .map(|t| ObjectShares::from_tally(t, &secondary_answers))
            .collect();

        let kappa = if primary_tallies.is_empty() {
            info!("No primary tallies, skipping Fleiss' kappa");
            None
        } else {
            let agreement = AgreementInput::from_tallies(
                config.primary_task,
                primary_tallies.values().cloned(),
            );
            Some(agreement.kappa_observed()?)
        };

        let curve = running_vote_fraction(&user_activity(&valid))?;
        debug!(levels = curve.len(), "Built vote-share curve");

        info!(
            input = records.len(),
            valid = valid.len(),
            aggregated = aggregated.len(),
            objects = primary_tallies.len(),
            kappa = ?kappa,
            "Pipeline finished"
        );

        Ok(PipelineReport {
            input_records: records.len(),
            valid_records: valid.len(),
            aggregated_records: aggregated.len(),
            primary_task: config.primary_task,
            secondary_task: config.secondary_task,
            primary_tallies,
            secondary_tallies,
            primary_shares,
            secondary_shares,
            kappa,
            power_users,
            curve,
        })
    }
}

impl PipelineReport {
    /// Format as a markdown summary.
    pub fn format_report(&self) -> String {
        let mut report = String::new();

        report.push_str("# Space Fluff Vote Report\n\n");

        report.push_str("## Summary\n\n");
        report.push_str(&format!(
            "| Metric | Value |\n\
             |--------|-------|\n\
             | Input Records | {} |\n\
             | Valid Records | {} |\n\
             | Aggregated Records | {} |\n\
             | Objects | {} |\n\
             | Power Users | {} |\n\
             | Fleiss' Kappa ({}) | {} |\n\n",
            self.input_records,
            self.valid_records,
            self.aggregated_records,
            self.primary_tallies.len(),
            self.power_users.len(),
            self.primary_task,
            self.kappa.map_or_else(|| "n/a".to_string(), |k| format!("{:.3}", k))
        ));

        if !self.primary_shares.is_empty() {
            let mut rows: Vec<&ObjectShares> = self.primary_shares.iter().collect();
            rows.sort_by(|a, b| {
                b.total_votes
                    .cmp(&a.total_votes)
                    .then_with(|| a.object_id.cmp(&b.object_id))
            });

            let answers: Vec<&str> = rows[0].shares.iter().map(|(a, _)| a.as_str()).collect();
            report.push_str(&format!("## Most Voted Objects ({})\n\n", self.primary_task));
            report.push_str("| Object | Votes |");
            for answer in &answers {
                report.push_str(&format!(" % {} |", answer));
            }
            report.push_str("\n|--------|-------|");
            for _ in &answers {
                report.push_str("------|");
            }
            report.push('\n');
            for row in rows.into_iter().take(REPORT_TOP_OBJECTS) {
                report.push_str(&format!("| {} | {} |", row.object_id, row.total_votes));
                for (_, share) in &row.shares {
                    report.push_str(&format!(" {:.1} |", share));
                }
                report.push('\n');
            }
            report.push('\n');
        }

        if !self.curve.is_empty() {
            report.push_str("## Vote Share by User Activity\n\n");
            if let Some(half) = vote_count_at_fraction(&self.curve, 0.5) {
                report.push_str(&format!(
                    "Users with at most {} records cast half of all votes.\n\n",
                    half
                ));
            }
            report.push_str("| Records/User | Users | Share | Cumulative |\n");
            report.push_str("|--------------|-------|-------|------------|\n");
            for row in &self.curve {
                report.push_str(&format!(
                    "| {} | {} | {:.1}% | {:.1}% |\n",
                    row.vote_count,
                    row.user_count,
                    row.share * 100.0,
                    row.cumulative_share * 100.0
                ));
            }
            report.push('\n');
        }

        report
    }
}
