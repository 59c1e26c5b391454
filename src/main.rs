use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt};

use warung_load::{
    Reporter, Scenario, ScenarioRunner,
    aggregate::RunAggregate,
    backend::HttpBackend,
    config::{LoadConfig, Profile},
    report::{JsonReporter, RunReport, StdoutReporter},
    setup::setup,
};

/// k6 exits with this code when a threshold is crossed.
const THRESHOLDS_FAILED: u8 = 99;

#[derive(Parser, Debug)]
#[command(name = "warung-load")]
#[command(about = "Role-weighted load tests for the warung POS backend", long_about = None)]
#[command(version)]
struct Cli {
    /// Default log filter when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in, load the catalog and run the load phases
    Run {
        #[command(flatten)]
        source: ConfigSource,

        /// Report format
        #[arg(long, value_enum, default_value = "text")]
        format: Format,

        /// Write the report here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the effective configuration as TOML
    Config {
        #[command(flatten)]
        source: ConfigSource,
    },
}

#[derive(clap::Args, Debug)]
struct ConfigSource {
    /// Built-in profile: production, production-quick, load, smoke or
    /// db-stress. Replaces the traffic, phases and thresholds of the file.
    #[arg(long)]
    profile: Option<Profile>,

    /// TOML config file; missing fields use the production profile
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backend base URL
    #[arg(long, env = "BASE_URL")]
    base_url: Option<String>,
}

impl ConfigSource {
    fn load(&self) -> anyhow::Result<LoadConfig> {
        let mut config = match &self.config {
            Some(path) => LoadConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => LoadConfig::default(),
        };
        if let Some(profile) = self.profile {
            config = config.with_profile(profile);
        }
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn init_logging(default: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt().with_env_filter(filter).with_target(false).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Command::Config { source } => {
            print!("{}", source.load()?.to_toml_string()?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Run {
            source,
            format,
            out,
        } => run(source.load()?, format, out).await,
    }
}

async fn run(config: LoadConfig, format: Format, out: Option<PathBuf>) -> anyhow::Result<ExitCode> {
    let thresholds = config.threshold_set()?;
    let backend = Arc::new(
        HttpBackend::new(&config.base_url, &config.api_prefix, config.request_timeout)
            .context("building the HTTP client")?,
    );

    let context = Arc::new(setup(backend.as_ref(), &config).await);
    let catalog = &context.catalog;
    tracing::info!(
        "Catalog: {} products, {} customers, {} categories",
        catalog.products.len(),
        catalog.customers.len(),
        catalog.categories.len()
    );
    for phase in &config.phases {
        for (role, p) in config.roles_for(&phase.name).probabilities() {
            tracing::info!("{}: {role} {:.1}% of iterations", phase.name, p * 100.0);
        }
    }

    let runner = ScenarioRunner::new(backend, context, &config);
    let plan = config.plan();
    let aggregate = plan
        .exec_each(|phase| {
            let runner = runner.with_roles(config.roles_for(&phase.name));
            Scenario::<RunAggregate, _, _>::builder()
                .name("warung")
                .action(move || runner.clone().next_iteration())
                .build()
        })
        .await?;
    tracing::info!("Load test complete");

    let mut report = RunReport::from(aggregate);
    report.apply_thresholds(&thresholds);
    match format {
        Format::Text => match &out {
            Some(path) => tokio::fs::write(path, report.to_string())
                .await
                .with_context(|| format!("writing {}", path.display()))?,
            None => StdoutReporter.report(&report).await?,
        },
        Format::Json => JsonReporter { path: out }.report(&report).await?,
    }

    if report.passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        for failed in report.thresholds.iter().filter(|t| !t.passed) {
            tracing::error!("Threshold crossed: {failed}");
        }
        Ok(ExitCode::from(THRESHOLDS_FAILED))
    }
}
