//! Drives a sample object through the provisioned pipeline.
//!
//! The exerciser is a linear smoke test, not a managed component: upload a
//! sample file, wait for the cross-region copy, run and wait for the
//! crawler, verify the catalog, run one query and render its rows, then
//! fetch the copy function's recent log output. Each wait is a fixed
//! interval poll with a hard timeout; the first failing step stops the
//! sequence, and a pass/fail summary is printed at the end.

use std::fmt;
use std::io;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use chrono::DateTime;
use thiserror::Error;

use crate::poll::{PollError, PollWindow, await_condition};
use crate::provider::{
    CatalogService, CrawlerState, LogService, ObjectStore, QueryService, QueryState,
};
use crate::report;
use crate::state::StateDocument;

/// Key the sample file is uploaded (and looked up) under.
pub const SAMPLE_OBJECT_KEY: &str = "customers.csv";

/// Number of log events requested from the function's newest stream.
const LOG_EVENT_LIMIT: i32 = 50;
/// Number of log events echoed to the console.
const LOG_EVENTS_SHOWN: usize = 5;

const REPLICATION_WINDOW: PollWindow = PollWindow {
    interval: Duration::from_secs(10),
    timeout: Duration::from_secs(120),
};
const CRAWLER_WINDOW: PollWindow = PollWindow {
    interval: Duration::from_secs(15),
    timeout: Duration::from_secs(300),
};
const QUERY_WINDOW: PollWindow = PollWindow {
    interval: Duration::from_secs(5),
    timeout: Duration::from_secs(60),
};

/// One step of the smoke-test sequence.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExerciseStep {
    /// Upload the sample file to the source bucket.
    Upload,
    /// Wait for the copy to appear in the target bucket.
    Replication,
    /// Run the crawler and wait for it to finish.
    Crawler,
    /// Check that the catalog contains tables.
    Catalog,
    /// Run one query and render its rows.
    Query,
    /// Fetch the copy function's recent log events.
    FunctionLogs,
}

impl ExerciseStep {
    /// Human-readable step title.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Upload => "Upload sample file",
            Self::Replication => "Cross-region copy",
            Self::Crawler => "Run catalog crawler",
            Self::Catalog => "Verify catalog tables",
            Self::Query => "Run sample query",
            Self::FunctionLogs => "Check function logs",
        }
    }
}

impl fmt::Display for ExerciseStep {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.title())
    }
}

/// Errors raised by individual exerciser steps.
#[derive(Debug, Error)]
pub enum ExerciseError {
    /// The state document lacks an identifier deployment records.
    #[error("state document missing {what}; deploy the pipeline first")]
    MissingIdentifier {
        /// Description of the missing identifier.
        what: &'static str,
    },
    /// The sample file could not be read.
    #[error("could not read sample file {path}: {message}")]
    SampleFile {
        /// Path that was looked up.
        path: Utf8PathBuf,
        /// Underlying error message.
        message: String,
    },
    /// A provider call failed.
    #[error(transparent)]
    Provider(#[from] crate::provider::ProviderError),
    /// A poll reached its deadline.
    #[error("timed out after {timeout_secs}s waiting for {what}")]
    TimedOut {
        /// Condition being waited on.
        what: &'static str,
        /// Configured timeout in seconds.
        timeout_secs: u64,
    },
    /// The crawler reported a state the pipeline does not expect.
    #[error("crawler in unexpected state: {state}")]
    CrawlerState {
        /// Provider-reported state.
        state: String,
    },
    /// The catalog holds no tables after the crawl.
    #[error("no tables found in catalog database {database}")]
    EmptyCatalog {
        /// Database that was listed.
        database: String,
    },
    /// The query finished unsuccessfully.
    #[error("query failed: {reason}")]
    QueryFailed {
        /// Provider-reported failure reason.
        reason: String,
    },
    /// The query succeeded but returned no data rows.
    #[error("query returned no data rows")]
    NoRows,
    /// The function has produced no log events yet.
    #[error("no recent log events found for {function}")]
    NoLogs {
        /// Function whose logs were fetched.
        function: String,
    },
}

impl From<PollError<ExerciseError>> for ExerciseError {
    fn from(err: PollError<ExerciseError>) -> Self {
        match err {
            PollError::TimedOut { what, timeout_secs } => Self::TimedOut { what, timeout_secs },
            PollError::Probe(inner) => inner,
        }
    }
}

/// Outcome of one executed step.
#[derive(Debug)]
pub struct StepOutcome {
    /// Step that ran.
    pub step: ExerciseStep,
    /// `Ok` when the step passed, the failure message otherwise.
    pub result: Result<(), ExerciseError>,
}

/// Collected outcomes of a smoke-test run.
#[derive(Debug, Default)]
pub struct ExerciseReport {
    /// Executed steps in order. Steps after the first failure never run.
    pub outcomes: Vec<StepOutcome>,
}

impl ExerciseReport {
    /// True when every executed step passed and the sequence completed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.outcomes.len() == 6 && self.outcomes.iter().all(|outcome| outcome.result.is_ok())
    }
}

/// Runs the smoke-test sequence against a provisioned pipeline.
#[derive(Debug)]
pub struct Exerciser<'a, C> {
    cloud: &'a C,
    sample_path: Utf8PathBuf,
    replication: PollWindow,
    crawler: PollWindow,
    query: PollWindow,
}

impl<'a, C> Exerciser<'a, C>
where
    C: ObjectStore + CatalogService + QueryService + LogService + Sync,
{
    /// Creates an exerciser uploading the sample file at `sample_path`.
    #[must_use]
    pub const fn new(cloud: &'a C, sample_path: Utf8PathBuf) -> Self {
        Self {
            cloud,
            sample_path,
            replication: REPLICATION_WINDOW,
            crawler: CRAWLER_WINDOW,
            query: QUERY_WINDOW,
        }
    }

    /// Overrides the replication poll window.
    ///
    /// This is primarily used by tests to keep runs fast.
    #[must_use]
    pub const fn with_replication_poll(mut self, window: PollWindow) -> Self {
        self.replication = window;
        self
    }

    /// Overrides the crawler poll window.
    #[must_use]
    pub const fn with_crawler_poll(mut self, window: PollWindow) -> Self {
        self.crawler = window;
        self
    }

    /// Overrides the query poll window.
    #[must_use]
    pub const fn with_query_poll(mut self, window: PollWindow) -> Self {
        self.query = window;
        self
    }

    /// Runs the sequence, stopping at the first failing step, and returns
    /// the per-step outcomes after printing a summary table.
    #[must_use]
    pub async fn run(&self, state: &StateDocument) -> ExerciseReport {
        let mut run_report = ExerciseReport::default();
        let steps = [
            ExerciseStep::Upload,
            ExerciseStep::Replication,
            ExerciseStep::Crawler,
            ExerciseStep::Catalog,
            ExerciseStep::Query,
            ExerciseStep::FunctionLogs,
        ];

        for step in steps {
            report::banner(step.title());
            let result = self.run_step(step, state).await;
            if let Err(err) = &result {
                report::failure(&format!("{step}: {err}"));
            }
            let failed = result.is_err();
            run_report.outcomes.push(StepOutcome { step, result });
            if failed {
                break;
            }
        }

        summarize(&run_report);
        run_report
    }

    async fn run_step(
        &self,
        step: ExerciseStep,
        state: &StateDocument,
    ) -> Result<(), ExerciseError> {
        match step {
            ExerciseStep::Upload => self.upload_sample(state).await,
            ExerciseStep::Replication => self.await_replication(state).await,
            ExerciseStep::Crawler => self.run_crawler(state).await,
            ExerciseStep::Catalog => self.verify_catalog(state).await.map(|_| ()),
            ExerciseStep::Query => self.run_query(state).await,
            ExerciseStep::FunctionLogs => self.check_logs(state).await,
        }
    }

    async fn upload_sample(&self, state: &StateDocument) -> Result<(), ExerciseError> {
        let account_id = account_id(state)?;
        let region = &state.regions.source_region;
        let bucket = state
            .resources
            .storage
            .source_bucket
            .rendered_name(account_id);

        let body = read_sample(&self.sample_path)?;
        report::progress(&format!(
            "uploading {} ({} bytes) to s3://{bucket}/{SAMPLE_OBJECT_KEY}",
            self.sample_path,
            body.len()
        ));
        self.cloud
            .put_object(region, &bucket, SAMPLE_OBJECT_KEY, body)
            .await?;
        report::success(&format!("uploaded to s3://{bucket}/{SAMPLE_OBJECT_KEY}"));
        Ok(())
    }

    async fn await_replication(&self, state: &StateDocument) -> Result<(), ExerciseError> {
        let account_id = account_id(state)?;
        let region = state.regions.target_region.as_str();
        let bucket = state
            .resources
            .storage
            .target_bucket
            .rendered_name(account_id);

        report::progress(&format!("waiting for s3://{bucket}/{SAMPLE_OBJECT_KEY}"));
        let cloud = self.cloud;
        let bucket_ref = bucket.as_str();
        await_condition(
            "cross-region copy",
            self.replication.interval,
            self.replication.timeout,
            || async move {
                match cloud
                    .object_exists(region, bucket_ref, SAMPLE_OBJECT_KEY)
                    .await
                {
                    Ok(true) => Ok(Some(())),
                    Ok(false) => Ok(None),
                    Err(err) => Err(ExerciseError::from(err)),
                }
            },
        )
        .await?;
        report::success(&format!("copy arrived in s3://{bucket}"));
        Ok(())
    }

    async fn run_crawler(&self, state: &StateDocument) -> Result<(), ExerciseError> {
        let region = state.regions.target_region.as_str();
        let crawler = state.resources.catalog.crawler_name.as_str();

        self.cloud.start_crawler(region, crawler).await?;
        report::progress(&format!("started crawler {crawler}"));

        let cloud = self.cloud;
        await_condition(
            "crawler completion",
            self.crawler.interval,
            self.crawler.timeout,
            || async move {
                match cloud.crawler_state(region, crawler).await {
                    Ok(CrawlerState::Ready) => Ok(Some(())),
                    Ok(CrawlerState::Running | CrawlerState::Stopping) => Ok(None),
                    Ok(CrawlerState::Other(state_name)) => {
                        Err(ExerciseError::CrawlerState { state: state_name })
                    }
                    Err(err) => Err(ExerciseError::from(err)),
                }
            },
        )
        .await?;
        report::success(&format!("crawler {crawler} completed"));
        Ok(())
    }

    async fn verify_catalog(&self, state: &StateDocument) -> Result<String, ExerciseError> {
        let region = state.regions.target_region.as_str();
        let database = state.resources.catalog.database_name.clone();

        let tables = self.cloud.list_tables(region, &database).await?;
        if tables.is_empty() {
            return Err(ExerciseError::EmptyCatalog { database });
        }
        report::success(&format!("found {} table(s) in {database}", tables.len()));
        for table in &tables {
            report::progress(&format!("  - {} ({} columns)", table.name, table.column_count));
        }
        let first = tables
            .first()
            .map(|table| table.name.clone())
            .unwrap_or_default();
        Ok(first)
    }

    async fn run_query(&self, state: &StateDocument) -> Result<(), ExerciseError> {
        let region = state.regions.target_region.as_str();
        let database = state.resources.catalog.database_name.as_str();
        let workgroup = state.resources.query_service.workgroup.as_str();

        let table = self.verify_catalog(state).await?;
        let sql = format!("SELECT * FROM \"{database}\".\"{table}\" LIMIT 5");
        report::progress(&format!("executing: {sql}"));

        let execution_id = self.cloud.start_query(region, workgroup, &sql).await?;
        let cloud = self.cloud;
        let execution = execution_id.as_str();
        await_condition(
            "query completion",
            self.query.interval,
            self.query.timeout,
            || async move {
                match cloud.query_state(region, execution).await {
                    Ok(QueryState::Succeeded) => Ok(Some(())),
                    Ok(QueryState::Queued | QueryState::Running) => Ok(None),
                    Ok(QueryState::Failed { reason }) => Err(ExerciseError::QueryFailed { reason }),
                    Ok(QueryState::Cancelled) => Err(ExerciseError::QueryFailed {
                        reason: String::from("cancelled"),
                    }),
                    Err(err) => Err(ExerciseError::from(err)),
                }
            },
        )
        .await?;

        let rows = self.cloud.query_rows(region, &execution_id).await?;
        if rows.len() <= 1 {
            return Err(ExerciseError::NoRows);
        }
        report::success(&format!("query returned {} row(s)", rows.len() - 1));
        report::progress(&render_table(&rows));
        Ok(())
    }

    async fn check_logs(&self, state: &StateDocument) -> Result<(), ExerciseError> {
        let region = state.regions.target_region.as_str();
        let function = state.resources.function.function_name.clone();

        let events = self
            .cloud
            .recent_function_logs(region, &function, LOG_EVENT_LIMIT)
            .await?;
        if events.is_empty() {
            return Err(ExerciseError::NoLogs { function });
        }
        report::success(&format!("found {} recent log event(s)", events.len()));
        let shown = events.len().saturating_sub(LOG_EVENTS_SHOWN);
        for event in events.iter().skip(shown) {
            let stamp = DateTime::from_timestamp_millis(event.timestamp_ms)
                .map_or_else(|| event.timestamp_ms.to_string(), |at| at.to_rfc3339());
            report::progress(&format!("  {stamp}: {}", event.message.trim_end()));
        }
        Ok(())
    }
}

fn account_id(state: &StateDocument) -> Result<&str, ExerciseError> {
    state
        .account_id
        .as_deref()
        .ok_or(ExerciseError::MissingIdentifier { what: "account id" })
}

fn read_sample(path: &Utf8Path) -> Result<Vec<u8>, ExerciseError> {
    let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path.file_name().ok_or_else(|| ExerciseError::SampleFile {
        path: path.to_path_buf(),
        message: String::from("path has no file name"),
    })?;
    let open = |message: io::Error| ExerciseError::SampleFile {
        path: path.to_path_buf(),
        message: message.to_string(),
    };
    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(open)?;
    dir.read(file_name).map_err(open)
}

/// Renders query rows (first row is the header) as a box-drawing table.
fn render_table(rows: &[Vec<String>]) -> String {
    let Some(header) = rows.first() else {
        return String::new();
    };
    let mut widths: Vec<usize> = header.iter().map(String::len).collect();
    for row in rows.iter().skip(1) {
        for (index, value) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(index) {
                *width = (*width).max(value.len());
            }
        }
    }

    let rule = |left: char, mid: char, right: char| {
        let spans: Vec<String> = widths.iter().map(|width| "─".repeat(width + 2)).collect();
        format!("{left}{}{right}", spans.join(&mid.to_string()))
    };
    let line = |row: &[String]| {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(value, &width)| format!(" {value:<width$} "))
            .collect();
        format!("│{}│", cells.join("│"))
    };

    let mut out = String::new();
    out.push_str(&rule('┌', '┬', '┐'));
    out.push('\n');
    out.push_str(&line(header));
    out.push('\n');
    out.push_str(&rule('├', '┼', '┤'));
    for row in rows.iter().skip(1) {
        out.push('\n');
        out.push_str(&line(row));
    }
    out.push('\n');
    out.push_str(&rule('└', '┴', '┘'));
    out
}

fn summarize(run_report: &ExerciseReport) {
    report::banner("Smoke test summary");
    for outcome in &run_report.outcomes {
        match &outcome.result {
            Ok(()) => report::success(&format!("PASS - {}", outcome.step)),
            Err(err) => report::failure(&format!("FAIL - {}: {err}", outcome.step)),
        }
    }
    if run_report.passed() {
        report::success("all steps passed");
    } else {
        report::failure("smoke test failed");
    }
}

#[cfg(test)]
mod tests;
