mod config;

use clap::{Args, Parser, Subcommand};
use config::{Config, ConfigError};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tagproxy", about = "First-party edge gateway for the Braze Web SDK")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve the gateway
    Run(ConfigArgs),
    /// Check the config file and exit
    Validate(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long)]
    config: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid sentry dsn: {0}")]
    SentryDsn(#[from] sentry::types::ParseDsnError),
    #[error("could not start runtime: {0}")]
    Runtime(std::io::Error),
    #[error(transparent)]
    Gateway(#[from] gateway::GatewayError),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        CliCommand::Run(args) => run(&args),
        CliCommand::Validate(args) => validate(&args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("tagproxy: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &ConfigArgs) -> Result<(), CliError> {
    let config = Config::from_file(&args.config)?;

    let sentry_guard = match config.sentry_dsn() {
        Some(dsn) => Some(sentry::init(sentry::ClientOptions {
            dsn: Some(dsn.parse()?),
            release: sentry::release_name!(),
            ..Default::default()
        })),
        None => None,
    };
    init_tracing(sentry_guard.is_some());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    runtime.block_on(gateway::run(config.gateway))?;
    Ok(())
}

fn validate(args: &ConfigArgs) -> Result<(), CliError> {
    let config = Config::from_file(&args.config)?;
    let gateway = &config.gateway;

    println!("config ok: {}", args.config.display());
    println!(
        "  listener: {}:{}",
        gateway.listener.host, gateway.listener.port
    );
    println!("  api upstream: {}", gateway.upstreams.api_url);
    println!(
        "  cdn upstream: {}",
        gateway
            .upstreams
            .cdn_url
            .as_ref()
            .map(|url| url.as_str())
            .unwrap_or(gateway::config::DEFAULT_CDN_URL)
    );
    println!("  allowed origins: {}", gateway.allowed_origins.len());
    println!("  allowed api keys: {}", gateway.allowed_api_keys.len());
    println!(
        "  timeouts: sdk {}ms, api {}ms",
        gateway.timeouts.sdk_ms, gateway.timeouts.api_ms
    );
    Ok(())
}

fn init_tracing(with_sentry: bool) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(with_sentry.then(sentry::integrations::tracing::layer))
        .init();
}
