//! Binary entry point for the read-only analytics dashboard.

use std::io::{self, Write};
use std::process;
use std::sync::Arc;

use caravan::aws::AwsCloud;
use caravan::config::AppConfig;
use caravan::dashboard::{self, DashboardState};
use caravan::store::StateStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("caravan=info,tower_http=info")),
        )
        .init();

    let exit_code = match run().await {
        Ok(()) => 0,
        Err(message) => {
            writeln!(io::stderr(), "{message}").ok();
            1
        }
    };
    process::exit(exit_code);
}

async fn run() -> Result<(), String> {
    let config = AppConfig::load_without_cli_args().map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;

    let cloud = AwsCloud::load().await;
    let store = StateStore::new(config.state_path());
    let state = DashboardState::new(Arc::new(cloud), store);

    dashboard::serve(state, config.dashboard_port)
        .await
        .map_err(|err| err.to_string())
}
