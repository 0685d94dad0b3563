//! sushi-stats - per-provider usage totals for a date range
//!
//! ```bash
//! sushi-stats books 2024-01 2024-06
//! sushi-stats journals 2024-01 2024-12 --json --pretty
//! sushi-stats multimedia 2024-01 2024-03 --provider bloomsbury
//! ```
//!
//! Credentials come from the environment (`<PROVIDER>_REQUESTOR_ID`,
//! `<PROVIDER>_CUSTOMER_ID`, ...), a `.env` file in the working directory, or
//! the system keyring.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use sushi_stats_lib::commands::{run_category, ProviderOutcome, RunOptions};
use sushi_stats_lib::config::Config;
use sushi_stats_lib::logging;
use sushi_stats_lib::providers::{
    Category, DateRange, ProviderCatalog, QueryParam, ReportFetcher, SushiClient,
};
use sushi_stats_lib::storage::keyring::KeyringError;
use sushi_stats_lib::storage::{CredentialResolver, SecureStorage};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "sushi-stats")]
#[command(about = "Pull usage statistics from SUSHI report endpoints")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    /// Shortcut for --format json
    #[arg(long, global = true)]
    json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Provider overrides file (defaults to the user config directory)
    #[arg(long, env = "SUSHI_STATS_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Also append logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// More log output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Book stats between the two dates
    Books(RangeArgs),
    /// Journal stats between the two dates
    Journals(RangeArgs),
    /// Multimedia stats between the two dates
    Multimedia(RangeArgs),
    /// List configured providers and their credential status
    Providers {
        /// Only this category
        category: Option<Category>,
    },
    /// Manage provider credentials in the system keyring
    Credential {
        #[command(subcommand)]
        action: CredentialAction,
    },
}

#[derive(Args)]
struct RangeArgs {
    /// Start of the reporting period, passed through as is
    begin_date: String,
    /// End of the reporting period, passed through as is
    end_date: String,

    /// Only query this provider
    #[arg(long)]
    provider: Option<String>,

    /// Query every provider of the category at once
    #[arg(long)]
    parallel: bool,

    /// Stop at the first provider that fails
    #[arg(long)]
    fail_fast: bool,
}

#[derive(Subcommand)]
enum CredentialAction {
    /// Store a value, e.g. `credential set EBSCO_CUSTOMER_ID 12345`
    Set { key: String, value: String },
    /// Remove a stored value
    Delete { key: String },
    /// Show where a credential would be read from
    Check { key: String },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProviderListing<'a> {
    category: Category,
    name: &'a str,
    endpoint: &'a str,
    params: Vec<ParamListing<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ParamListing<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    credential: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env must be loaded before clap reads SUSHI_STATS_CONFIG
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            eprintln!("Ignoring .env: {err}");
        }
    }

    let cli = Cli::parse();
    if let Err(err) = logging::init_logging(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("Failed to initialise logging: {err}");
    }

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let format = if cli.json {
        OutputFormat::Json
    } else {
        cli.format
    };

    match &cli.command {
        Commands::Books(args) => run_reports(&cli, Category::Books, args, format).await,
        Commands::Journals(args) => run_reports(&cli, Category::Journals, args, format).await,
        Commands::Multimedia(args) => run_reports(&cli, Category::Multimedia, args, format).await,
        Commands::Providers { category } => list_providers(&cli, *category, format),
        Commands::Credential { action } => manage_credential(action),
    }
}

fn load_catalog(cli: &Cli) -> Result<ProviderCatalog> {
    let mut catalog = ProviderCatalog::builtin();
    let config = Config::load(cli.config.as_deref()).context("Failed to load provider config")?;
    config.apply(&mut catalog)?;
    Ok(catalog)
}

async fn run_reports(
    cli: &Cli,
    category: Category,
    args: &RangeArgs,
    format: OutputFormat,
) -> Result<ExitCode> {
    let catalog = load_catalog(cli)?;
    let credentials = CredentialResolver::from_env();
    let descriptors = catalog.descriptors(category, args.provider.as_deref(), &credentials);
    if descriptors.is_empty() {
        match &args.provider {
            Some(name) => bail!("Unknown {category} provider: {name}"),
            None => bail!("No {category} providers are configured"),
        }
    }

    let range = DateRange::new(args.begin_date.clone(), args.end_date.clone());
    let options = RunOptions {
        parallel: args.parallel,
        fail_fast: args.fail_fast,
    };
    let fetcher: Arc<dyn ReportFetcher> = Arc::new(SushiClient::new());

    let reports = run_category(fetcher, descriptors, &range, options, |report| match format {
        OutputFormat::Text => {
            for line in report.text_lines() {
                println!("{line}");
            }
        }
        OutputFormat::Json => {
            // keep stdout valid JSON
            if let ProviderOutcome::DecodeFailed { request_url, body } = &report.outcome {
                eprintln!("{request_url}");
                eprintln!("{body}");
            }
        }
    })
    .await?;

    if format == OutputFormat::Json {
        let payloads: Vec<_> = reports.iter().map(|report| report.payload(&range)).collect();
        print_json(&payloads, cli.pretty)?;
    }

    let failed = reports.iter().any(|report| report.outcome.is_failure());
    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn list_providers(cli: &Cli, category: Option<Category>, format: OutputFormat) -> Result<ExitCode> {
    let catalog = load_catalog(cli)?;
    let credentials = CredentialResolver::from_env();
    let categories = category.map_or_else(Category::all, |category| vec![category]);

    let mut listings = Vec::new();
    for category in categories {
        for spec in catalog.specs(category) {
            listings.push(ProviderListing {
                category,
                name: &spec.name,
                endpoint: &spec.endpoint,
                params: spec
                    .params
                    .iter()
                    .map(|param| param_listing(param, &credentials))
                    .collect(),
            });
        }
    }

    match format {
        OutputFormat::Json => print_json(&listings, cli.pretty)?,
        OutputFormat::Text => {
            let sections: Vec<String> = listings.iter().map(render_listing_text).collect();
            if !sections.is_empty() {
                println!("{}", sections.join("\n\n"));
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn param_listing<'a>(param: &'a QueryParam, credentials: &CredentialResolver) -> ParamListing<'a> {
    match param {
        QueryParam::Literal { name, value } => ParamListing {
            name: name.as_str(),
            value: Some(value.as_str()),
            credential: None,
            source: None,
        },
        QueryParam::Credential { name, key } => ParamListing {
            name: name.as_str(),
            value: None,
            credential: Some(key.as_str()),
            source: Some(
                credentials
                    .lookup(key)
                    .map(|(_, origin)| origin.to_string())
                    .unwrap_or_else(|| "missing".to_string()),
            ),
        },
    }
}

fn render_listing_text(listing: &ProviderListing) -> String {
    let mut lines = vec![format!("{}/{}: {}", listing.category, listing.name, listing.endpoint)];
    for param in &listing.params {
        match (param.value, param.credential) {
            (Some(value), _) => lines.push(format!("  {} = {}", param.name, value)),
            (None, Some(key)) => lines.push(format!(
                "  {} <- {} ({})",
                param.name,
                key,
                param.source.as_deref().unwrap_or("missing")
            )),
            (None, None) => {}
        }
    }
    lines.join("\n")
}

fn manage_credential(action: &CredentialAction) -> Result<ExitCode> {
    let storage = SecureStorage::new();
    match action {
        CredentialAction::Set { key, value } => {
            storage
                .store(key, value)
                .with_context(|| format!("Failed to store {key}"))?;
            println!("{key}: stored in keychain");
        }
        CredentialAction::Delete { key } => match storage.delete(key) {
            Ok(()) => println!("{key}: deleted from keychain"),
            Err(KeyringError::NotFound) => println!("{key}: not in keychain"),
            Err(err) => return Err(err).with_context(|| format!("Failed to delete {key}")),
        },
        CredentialAction::Check { key } => match CredentialResolver::from_env().lookup(key) {
            Some((_, origin)) => println!("{key}: set ({origin})"),
            None => {
                println!("{key}: not set");
                return Ok(ExitCode::FAILURE);
            }
        },
    }
    Ok(ExitCode::SUCCESS)
}

fn print_json<T: Serialize>(payload: &T, pretty: bool) -> Result<()> {
    let output = if pretty {
        serde_json::to_string_pretty(payload)
    } else {
        serde_json::to_string(payload)
    }?;
    println!("{output}");
    Ok(())
}
