//! Core library for the caravan pipeline tool.
//!
//! The crate provisions, smoke-tests, and decommissions a cross-region
//! object-copy pipeline: a typed state document persisted as one JSON
//! file, a provider boundary expressed as service traits with an AWS
//! implementation, four idempotent group provisioners, and the deploy,
//! exercise, unwind, and dashboard operations built on top of them.

pub mod aws;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod deploy;
pub mod exercise;
pub mod payload;
pub mod poll;
pub mod provider;
pub mod provision;
pub mod report;
pub mod state;
pub mod store;
pub mod test_support;
pub mod unwind;

pub use aws::AwsCloud;
pub use config::{AppConfig, ConfigError};
pub use deploy::{DeployError, DeployStep, DeploySummary, Deployer};
pub use exercise::{ExerciseError, ExerciseReport, Exerciser};
pub use provider::{Cloud, ErrorKind, ProviderError};
pub use state::{GroupStatus, StateDocument, StatusKey};
pub use store::{StateStore, StateStoreError};
pub use unwind::{UnwindError, UnwindSummary, Unwinder};
