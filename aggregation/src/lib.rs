//! Space Fluff vote aggregation library
//!
//! Turns parsed classification records from the Space Fluff citizen-science
//! campaign into:
//! - per-object vote tallies and answer percentages for each task
//! - power-user cohorts (volunteers above an activity threshold)
//! - Fleiss' kappa agreement over the per-object tallies
//! - a cumulative vote-share curve over per-user activity
//!
//! # Usage
//!
//! ```ignore
//! use aggregation::{Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::from_env()?;
//! let report = Pipeline::new(config).run(&records)?;
//! println!("{}", report.format_report());
//! ```
//!
//! Every stage is a pure function over in-memory records and can be used on
//! its own; see [`filter`], [`tally`], [`activity`], [`agreement`] and
//! [`curve`].

pub mod activity;
pub mod agreement;
pub mod config;
pub mod curve;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod record;
pub mod tally;

pub use activity::{
    filter_by_power_users, restrict_to_users, select_power_users, user_activity, UserActivity,
};
pub use agreement::{fleiss_kappa, object_agreement, AgreementInput};
pub use config::{ConfigError, PipelineConfig};
pub use curve::{running_vote_fraction, vote_count_at_fraction, VoteShareRow};
pub use error::{AggregationError, AggregationResult};
pub use filter::{RecordFilter, Rejection};
pub use pipeline::{Pipeline, PipelineReport};
pub use record::{ClassificationRecord, RawClassification, TaskIndex, ANONYMOUS_USER};
pub use tally::{
    aggregate, aggregate_conditional, AnswerCondition, ObjectShares, TallyOptions, VoteTally,
    UNANSWERED,
};
