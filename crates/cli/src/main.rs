// dispatchbench CLI
//
// Design Decision: Use clap derive for ergonomic argument parsing.
// Design Decision: Support text/json output formats for scripting.
// Design Decision: No async main; every invocation builds and drops its own runtimes.

mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dispatchbench_harness::HarnessConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dispatchbench")]
#[command(about = "Measure query dispatch latency under fixed-pool and work-stealing schedulers")]
#[command(version)]
pub struct Cli {
    /// Database URL (mysql://, postgres://, sqlite://)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Database username
    #[arg(long, env = "DATABASE_USERNAME")]
    pub username: Option<String>,

    /// Database password
    #[arg(long, env = "DATABASE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Maximum pooled connections per invocation
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS")]
    pub max_connections: Option<u32>,

    /// Output format
    #[arg(long, short, default_value = "text", value_parser = ["text", "json"])]
    pub output: String,

    /// Suppress non-essential output
    #[arg(long, short)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a single invocation and print its batch result
    Run(commands::run::RunArgs),

    /// Run warmup and measurement iterations over a scenario matrix
    Matrix(commands::matrix::MatrixArgs),
}

impl Cli {
    /// Environment configuration with command-line overrides applied
    fn base_config(&self) -> Result<HarnessConfig> {
        let mut config =
            HarnessConfig::from_env().context("Failed to load configuration from environment")?;

        if let Some(url) = &self.database_url {
            config.target.url = url.clone();
        }
        if let Some(username) = &self.username {
            config.target.username = Some(username.clone());
        }
        if let Some(password) = &self.password {
            config.target.password = Some(password.clone());
        }
        if let Some(max_connections) = self.max_connections {
            config.pool.max_connections = max_connections;
        }

        Ok(config)
    }
}

fn main() -> Result<()> {
    // Logs go to stderr so JSON output on stdout stays parseable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dispatchbench=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let output_format = output::OutputFormat::from_str(&cli.output);
    let base = cli.base_config()?;

    match cli.command {
        Commands::Run(args) => commands::run::run(args, base, output_format, cli.quiet),
        Commands::Matrix(args) => commands::matrix::run(args, base, output_format, cli.quiet),
    }
}
