//! Binary entry point for the caravan CLI.

use std::io::{self, BufRead, Write};
use std::process;

use clap::Parser;
use thiserror::Error;

use caravan::aws::AwsCloud;
use caravan::cli::{Cli, ProvisionGroup};
use caravan::config::{AppConfig, ConfigError};
use caravan::deploy::{DeployError, DeployStep, Deployer};
use caravan::exercise::Exerciser;
use caravan::report;
use caravan::store::{StateStore, StateStoreError};
use caravan::unwind::{self, UnwindError, Unwinder};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StateStoreError),
    #[error(transparent)]
    Deploy(#[from] DeployError),
    #[error(transparent)]
    Unwind(#[from] UnwindError),
    #[error("could not read confirmation: {0}")]
    Prompt(String),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<i32, CliError> {
    let config = AppConfig::load_without_cli_args()?;
    config.validate()?;
    let store = StateStore::new(config.state_path());

    match cli {
        Cli::Deploy => {
            let cloud = AwsCloud::load().await;
            Deployer::new(&cloud, &store, config.templates_dir())
                .deploy()
                .await?;
            Ok(0)
        }
        Cli::Provision(command) => {
            let cloud = AwsCloud::load().await;
            Deployer::new(&cloud, &store, config.templates_dir())
                .run_single(step_for(command.group))
                .await?;
            Ok(0)
        }
        Cli::Exercise => {
            let cloud = AwsCloud::load().await;
            let state = store.load()?;
            let outcome = Exerciser::new(&cloud, config.sample_data_path())
                .run(&state)
                .await;
            Ok(i32::from(!outcome.passed()))
        }
        Cli::Status => {
            let state = store.load()?;
            report::status_table(&state);
            Ok(0)
        }
        Cli::Unwind => {
            if !confirm_deletion(io::stdin().lock())? {
                report::note("deletion cancelled");
                return Ok(0);
            }
            let cloud = AwsCloud::load().await;
            Unwinder::new(&cloud, &store, config.templates_dir())
                .unwind()
                .await?;
            Ok(0)
        }
    }
}

const fn step_for(group: ProvisionGroup) -> DeployStep {
    match group {
        ProvisionGroup::Foundation => DeployStep::Foundation,
        ProvisionGroup::Messaging => DeployStep::Messaging,
        ProvisionGroup::Catalog => DeployStep::Catalog,
        ProvisionGroup::Analytics => DeployStep::Analytics,
    }
}

/// Asks for the typed deletion token; the sweep only runs on an exact
/// match.
fn confirm_deletion(mut input: impl BufRead) -> Result<bool, CliError> {
    report::warn("this will delete ALL provider resources created by the pipeline");
    report::warn("this action cannot be undone");
    write!(
        io::stdout(),
        "Type '{}' to confirm resource deletion: ",
        unwind::CONFIRMATION_TOKEN
    )
    .ok();
    io::stdout().flush().ok();

    let mut line = String::new();
    input
        .read_line(&mut line)
        .map_err(|err| CliError::Prompt(err.to_string()))?;
    Ok(unwind::confirmation_accepted(&line))
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_cli_group_maps_to_a_deploy_step() {
        assert_eq!(step_for(ProvisionGroup::Foundation), DeployStep::Foundation);
        assert_eq!(step_for(ProvisionGroup::Messaging), DeployStep::Messaging);
        assert_eq!(step_for(ProvisionGroup::Catalog), DeployStep::Catalog);
        assert_eq!(step_for(ProvisionGroup::Analytics), DeployStep::Analytics);
    }

    #[test]
    fn confirmation_accepts_the_exact_token_only() {
        let accepted = confirm_deletion(&b"DELETE\n"[..]).unwrap_or_else(|err| panic!("{err}"));
        assert!(accepted);

        let rejected = confirm_deletion(&b"no thanks\n"[..]).unwrap_or_else(|err| panic!("{err}"));
        assert!(!rejected);
    }

    #[test]
    fn write_error_renders_the_message() {
        let mut buf = Vec::new();
        let err = CliError::Prompt(String::from("stdin closed"));
        write_error(&mut buf, &err);
        let rendered = String::from_utf8(buf).unwrap_or_else(|err| panic!("utf8: {err}"));
        assert!(
            rendered.contains("could not read confirmation"),
            "rendered: {rendered}"
        );
    }
}
