//! tarship: package a directory, stream it to S3 and deploy it through the
//! hosting dashboard.

mod deploy;
mod error;
mod pipeline;

use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tarship_config::{Arguments, Config, DEFAULT_TITLE};
use tarship_dashboard::client::HttpDashboard;
use tarship_dashboard::{DeploymentRequest, Schedule};
use tarship_storage::Uploader;
use tarship_storage::backend::S3Backend;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Crates whose logs are shown; everything else only at warning level.
const CRATES: &[&str] = &["tarship", "tarship_config", "tarship_dashboard", "tarship_package", "tarship_storage"];

/// Package a directory, upload it to S3 and deploy it through the dashboard.
#[derive(Debug, Parser)]
#[command(name = "tarship")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory to package
    source: PathBuf,

    /// Destination of the archive, e.g. s3://bucket/path/site.tar.gz
    destination: String,

    /// Dashboard environment page, e.g. https://host/naut/project/<stack>/environment/<environment>
    dashboard_url: String,

    /// Title of the created deployment
    #[arg(long, default_value = DEFAULT_TITLE)]
    title: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("[!] {err:?}");
            ExitCode::FAILURE
        },
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let directives = CRATES.iter().fold(String::from("warn"), |directives, krate| format!("{directives},{krate}={level}"));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).without_time().with_target(verbose))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(Arguments {
        source: cli.source,
        destination: cli.destination,
        dashboard_url: cli.dashboard_url,
        title: cli.title,
    })
    .or_raise(|| ErrorKind::Configuration)?;
    tracing::debug!(?config, "Configuration loaded");
    let settings = &config.settings;

    let store = S3Backend::for_bucket(&config.destination.bucket, settings.region.clone(), settings.endpoint.clone())
        .await
        .or_raise(|| ErrorKind::Upload)?;
    let uploader = Uploader::new(Arc::new(store)).with_link_expiry(settings.link_expiry());
    let shipment = pipeline::package_and_upload(
        &config.source,
        &config.archive_root,
        &uploader,
        &config.destination,
        settings.report_interval(),
    )
    .await?;

    let dashboard = HttpDashboard::new(
        config.dashboard.base_url.clone(),
        config.credentials.user.clone(),
        config.credentials.token.clone(),
    )
    .or_raise(|| ErrorKind::Deployment)?;
    let request = DeploymentRequest {
        stack_id: config.dashboard.stack_id.clone(),
        environment_id: config.dashboard.environment_id.clone(),
        reference_url: shipment.receipt.url,
        title: config.title.clone(),
    };
    let schedule = Schedule {
        poll: settings.poll_interval(),
        heartbeat: settings.heartbeat_interval(),
        deadline: settings.deadline(),
    };
    deploy::follow(&dashboard, request, config.dashboard.url.to_string(), schedule).await?;
    Ok(())
}
