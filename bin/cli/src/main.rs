use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use orchestrator_runner::checks;
use orchestrator_runner::commands;
use orchestrator_runner::config::{Overrides, RunnerConfig};
use orchestrator_runner::interpolate::ProcessEnv;
use orchestrator_runner::report;
use orchestrator_runner_client::{
    ClientError, ReqwestTransport, TracingObserver, WorkflowExecutionClient,
};
use rootcause::Report;

/// Run workflows on a remote orchestrator server
#[derive(Parser)]
#[command(name = "orchestrator-runner")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true, env = "ORCHESTRATOR_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    server: ServerArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ServerArgs {
    /// Base URL of the orchestrator server
    #[arg(long, global = true)]
    server_url: Option<String>,

    #[arg(long, global = true)]
    username: Option<String>,

    #[arg(long, global = true)]
    password: Option<String>,

    /// Tenant for token authentication
    #[arg(long, global = true)]
    tenant: Option<String>,

    /// Verify server certificates instead of accepting self-signed ones
    #[arg(long, global = true)]
    verify_certs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow
    Run {
        /// Name of the workflow to execute
        #[arg(long)]
        workflow: Option<String>,

        /// Wait for the execution to finish
        #[arg(long)]
        wait: bool,

        /// Seconds between status polls
        #[arg(long)]
        poll_interval: Option<u64>,

        /// Give up waiting after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Check the configuration and that the workflow exists
    Check {
        #[arg(long)]
        workflow: Option<String>,
    },

    /// List workflows on the server
    Workflows,

    /// List the input parameters of a workflow as name@type
    Inputs {
        /// Name of the workflow
        workflow: String,
    },
}

impl Cli {
    fn overrides(&self) -> Overrides {
        let mut overrides = Overrides {
            server_url: self.server.server_url.clone(),
            username: self.server.username.clone(),
            password: self.server.password.clone(),
            tenant: self.server.tenant.clone(),
            accept_invalid_certs: self.server.verify_certs.then_some(false),
            ..Overrides::default()
        };
        match &self.command {
            Commands::Run {
                workflow,
                wait,
                poll_interval,
                timeout,
            } => {
                overrides.workflow_name = workflow.clone();
                overrides.wait_for_completion = wait.then_some(true);
                overrides.poll_interval_secs = *poll_interval;
                overrides.wait_timeout_secs = *timeout;
            }
            Commands::Check { workflow } => overrides.workflow_name = workflow.clone(),
            Commands::Workflows | Commands::Inputs { .. } => {}
        }
        overrides
    }
}

/// Carries the whole report, including its attachments and children.
fn report_error(err: Report<ClientError>) -> anyhow::Error {
    anyhow::anyhow!(report::describe_error(&err))
}

async fn dispatch(
    command: Commands,
    raw: &RunnerConfig,
    config: &RunnerConfig,
    client: &WorkflowExecutionClient<ReqwestTransport>,
) -> Result<u8, Report<ClientError>> {
    match command {
        Commands::Run { .. } => {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupted, cancelling wait");
                    on_signal.cancel();
                }
            });

            let result = commands::run(client, config, &TracingObserver, &cancel).await?;
            let rendered = report::render(&result.to_output_map());
            if !rendered.is_empty() {
                println!("{rendered}");
            }
            Ok(report::exit_code(&result))
        }
        Commands::Check { .. } => {
            let issues = checks::check(client, raw, &ProcessEnv).await?;
            for issue in &issues {
                println!("{issue}");
            }
            if checks::has_blocking(&issues) {
                Ok(report::EXIT_CONFIGURATION)
            } else {
                println!("configuration ok");
                Ok(report::EXIT_SUCCESS)
            }
        }
        Commands::Workflows => {
            for workflow in commands::workflows(client, config).await? {
                println!("{}\t{}", workflow.id, workflow.name);
            }
            Ok(report::EXIT_SUCCESS)
        }
        Commands::Inputs { workflow } => {
            for key in commands::inputs(client, config, &workflow).await? {
                println!("{key}");
            }
            Ok(report::EXIT_SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let raw = RunnerConfig::load(cli.config.as_deref(), &cli.overrides())
        .context("failed to load configuration")?;
    let config = raw.interpolated(&ProcessEnv);
    let client = WorkflowExecutionClient::from_options(config.client_options())
        .map_err(report_error)
        .context("failed to build the HTTP client")?;

    let code = match dispatch(cli.command, &raw, &config, &client).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {}", report::describe_error(&err));
            report::error_exit_code(err.current_context())
        }
    };
    Ok(ExitCode::from(code))
}
