//! form-migrate CLI
//!
//! Migrates form submissions between form-service projects.
//! Pedantic lints relaxed for CLI ergonomics.

// CLI tool - relax pedantic lints for ergonomics
#![allow(clippy::pedantic)]

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use form_migrate::{Invocation, MigrationConfig, MigrationStats, Migrator};

#[derive(Parser)]
#[command(name = "form-migrate")]
#[command(version)]
#[command(
    about = "Migrate form submissions from a CSV file, form or project into a destination form service",
    long_about = None
)]
struct Cli {
    /// <source> [transformer|project] <destination>
    #[arg(required = true, num_args = 2..=3, value_name = "PARAMS")]
    params: Vec<String>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Form server base URL
    #[arg(short, long, env = "FORM_MIGRATE_ENDPOINT")]
    endpoint: Option<String>,

    /// API key for the source project
    #[arg(long, env = "FORM_MIGRATE_SRC_KEY", hide_env_values = true)]
    src_key: Option<String>,

    /// Session token for the source project
    #[arg(long, env = "FORM_MIGRATE_SRC_TOKEN", hide_env_values = true)]
    src_token: Option<String>,

    /// API key for the destination project
    #[arg(long, env = "FORM_MIGRATE_DST_KEY", hide_env_values = true)]
    dst_key: Option<String>,

    /// Session token for the destination project
    #[arg(long, env = "FORM_MIGRATE_DST_TOKEN", hide_env_values = true)]
    dst_token: Option<String>,

    /// Submissions in flight (single form migrations)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Hide the progress spinner
    #[arg(long)]
    no_progress: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<MigrationConfig> {
        let mut config = match &self.config {
            Some(path) => {
                info!("Loading configuration from {:?}", path);
                MigrationConfig::from_file(path)?
            }
            None => MigrationConfig::default(),
        };

        if let Some(endpoint) = &self.endpoint {
            config.endpoint = Some(endpoint.clone());
        }
        if self.src_key.is_some() {
            config.source.api_key = self.src_key.clone();
        }
        if self.src_token.is_some() {
            config.source.token = self.src_token.clone();
        }
        if self.dst_key.is_some() {
            config.destination.api_key = self.dst_key.clone();
        }
        if self.dst_token.is_some() {
            config.destination.token = self.dst_token.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.options.concurrency = concurrency;
        }
        if self.no_progress {
            config.options.progress = false;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let invocation = Invocation::from_params(&cli.params)?;
    let config = cli.load_config()?;
    let migrator = Migrator::new(config)?;

    let reports = match migrator.run(&invocation).await {
        Ok(reports) => reports,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };

    let mut total = MigrationStats::default();
    for report in &reports {
        total.absorb(&report.stats);
    }

    println!("\nMigration Complete!");
    println!("   Forms:     {}", reports.len());
    println!(
        "   Created:   {}",
        reports.iter().filter(|r| r.created).count()
    );
    println!("   Read:      {}", total.read);
    println!("   Accepted:  {}", total.accepted);
    println!("   Rejected:  {}", total.rejected);
    println!("   Failed:    {}", total.transport_errors);
    println!("   Skipped:   {}", total.skipped);
    println!("   Duration:  {:.2}s", total.duration_secs);

    Ok(())
}
