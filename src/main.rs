//! Synthetics CI CLI
//!
//! Entry point for the `synthetics-ci` command-line tool.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use synthetics_ci::api::{ApiEndpoints, HttpApiClient};
use synthetics_ci::config::{env_layer, CliOverrides, EffectiveConfig, DEFAULT_CONFIG_FILE};
use synthetics_ci::metadata::ci_metadata_from_env;
use synthetics_ci::pipeline::Pipeline;
use synthetics_ci::reporter::{MainReporter, Reporter, TracingReporter};
use synthetics_ci::summary::{report_ci_error, RunSummary};
use synthetics_ci::{CiErrorCode, RunError};
use tracing::{debug, error, info, trace};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "synthetics-ci")]
#[command(about = "Run synthetic tests from CI", version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trigger tests and wait for their results
    RunTests(RunTestsArgs),
}

#[derive(clap::Args)]
struct RunTestsArgs {
    /// Path to config file (default: synthetics-ci.toml when present)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    #[arg(long)]
    api_key: Option<String>,

    #[arg(long)]
    app_key: Option<String>,

    /// Site of the organization (e.g. datadoghq.eu)
    #[arg(long)]
    datadog_site: Option<String>,

    /// Custom subdomain of the organization, used in result links
    #[arg(long)]
    subdomain: Option<String>,

    /// Public ID of a test to run (repeatable)
    #[arg(long = "public-id", short = 'p')]
    public_ids: Vec<String>,

    /// Run the tests matching this search query
    #[arg(long = "search", short = 's')]
    search: Option<String>,

    /// Variable passed to every test, as KEY=VALUE (repeatable)
    #[arg(long = "variable")]
    variables: Vec<String>,

    /// Location to run every test from (repeatable)
    #[arg(long = "location")]
    locations: Vec<String>,

    /// Maximum polling duration in milliseconds
    #[arg(long)]
    polling_timeout: Option<u64>,

    /// Fail the run on infrastructure-level errors
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    fail_on_critical_errors: Option<bool>,

    /// Fail the run when requested tests cannot be found
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    fail_on_missing_tests: Option<bool>,

    /// Fail the run when a result times out
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    fail_on_timeout: Option<bool>,

    /// Let the backend skip tests that already passed on this commit
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    selective_rerun: Option<bool>,

    /// Write a JSON run summary to this path
    #[arg(long)]
    summary_output: Option<PathBuf>,
}

impl RunTestsArgs {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            api_key: self.api_key.clone(),
            app_key: self.app_key.clone(),
            datadog_site: self.datadog_site.clone(),
            subdomain: self.subdomain.clone(),
            fail_on_critical_errors: self.fail_on_critical_errors,
            fail_on_missing_tests: self.fail_on_missing_tests,
            fail_on_timeout: self.fail_on_timeout,
            polling_timeout: self.polling_timeout,
            selective_rerun: self.selective_rerun,
            public_ids: self.public_ids.clone(),
            test_search_query: self.search.clone(),
            variables: self.variables.clone(),
            locations: self.locations.clone(),
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::RunTests(args) => {
            let code = run_tests_command(args).await;
            process::exit(code);
        }
    }
}

/// Config file to load: the explicit one, else the default when present
fn config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>, RunError> {
    match explicit {
        Some(path) if !path.exists() => Err(RunError::critical(
            CiErrorCode::InvalidConfig,
            format!("Config file not found: {}", path.display()),
        )),
        Some(path) => Ok(Some(path.to_path_buf())),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            Ok(default.exists().then_some(default))
        }
    }
}

fn load_config(args: &RunTestsArgs) -> Result<EffectiveConfig, RunError> {
    let path = config_path(args.config.as_deref())?;
    let env = env_layer(|name| std::env::var(name).ok());

    let config = EffectiveConfig::build(path.as_deref(), env, Some(args.overrides().to_value()))?;
    debug!(sources = config.sources.len(), masked = ?config.masked, "loaded configuration");
    if let Ok(record) = config.to_json() {
        trace!(settings = %record, "effective configuration");
    }
    Ok(config)
}

async fn run_tests_command(args: RunTestsArgs) -> i32 {
    let reporter = MainReporter::new(vec![Arc::new(TracingReporter::new()) as Arc<dyn Reporter>]);

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            report_ci_error(&e, &reporter);
            return 1;
        }
    };
    let run_config = config.run_config();

    let client = match HttpApiClient::new(
        ApiEndpoints::from_env(&run_config.datadog_site),
        run_config.api_key.clone(),
        run_config.app_key.clone(),
    ) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "failed to build HTTP client");
            return 1;
        }
    };

    let outcome = Pipeline::new(run_config, &client, &reporter)
        .with_variables(std::env::vars().collect())
        .with_metadata(ci_metadata_from_env())
        .run()
        .await;

    if let Some(path) = &args.summary_output {
        let summary = RunSummary::new(
            &outcome.summary,
            &outcome.results,
            outcome.exit_reason,
            outcome.error.as_ref().map(|e| e.code().as_str()),
        );
        match summary.write_to_file(path) {
            Ok(()) => info!(path = %path.display(), "wrote run summary"),
            Err(e) => error!(path = %path.display(), error = %e, "failed to write run summary"),
        }
    }

    outcome.exit_code
}
