use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use smods_catalogue::{CatalogueClient, CatalogueQuery, ModRevision, SortBy, TimePeriod};
use smods_common::observability::init_logging;
use smods_config::{SmodsConfig, SmodsConfigLoader, default_config_path};
use smods_http::HttpClient;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "smods", about = "Query the Skymods catalogue", version)]
struct Cli {
    /// Path to the YAML config file (defaults to <config dir>/smods/smods.yaml if present)
    #[arg(long, short, env = "SMODS_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Also print logs to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the catalogue
    Search {
        keyword: String,
        /// Result page, 0 for the first one
        #[arg(long, default_value_t = 0)]
        page: u32,
        /// updated, highest-rated, unrated, smallest-file-size, largest-file-size
        #[arg(long)]
        sort: Option<SortBy>,
        /// one_day, three_days, one_week, two_weeks, one_month, six_months, one_year
        #[arg(long)]
        period: Option<TimePeriod>,
    },
    /// Everything the detail page of a mod shows (Skymods id or page URL)
    Show { id_or_url: String },
    /// Base record of a mod
    Base { id: String },
    /// Look a mod up by its Steam workshop id
    Steam { steam_id: String },
    /// Latest and older revisions of a mod
    Revisions { id: String },
    /// Dependencies of one or more mods, merged
    Deps {
        #[arg(required = true)]
        ids: Vec<String>,
        /// Walk dependencies of dependencies too
        #[arg(long, short)]
        recursive: bool,
    },
    /// Resolve the download URL of the latest revision
    Download { id: String },
}

#[derive(Serialize)]
struct Revisions {
    latest: ModRevision,
    older: Vec<ModRevision>,
}

fn load_config(path: Option<&PathBuf>) -> Result<SmodsConfig> {
    let loader = match (path, default_config_path()) {
        (Some(path), _) => SmodsConfigLoader::new().with_file(path),
        (None, Some(default)) => SmodsConfigLoader::new().with_optional_file(default),
        (None, None) => SmodsConfigLoader::new(),
    };
    loader.load().context("failed to load configuration")
}

fn build_client(cfg: &SmodsConfig) -> Result<CatalogueClient> {
    let mut http = HttpClient::new(&cfg.site.base_url)?
        .with_timeout(Duration::from_secs(cfg.site.timeout_secs));
    if let Some(ua) = &cfg.site.user_agent {
        http = http.with_user_agent(ua.clone());
    }
    let client = CatalogueClient::from_http(http)?
        .with_rules(cfg.rule_book())?
        .with_download_hosts(cfg.site.download_hosts.iter().cloned());
    Ok(client)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1) Load config (env wins)
    let cfg = load_config(cli.config.as_ref())?;

    // 2) Logging
    let mut log_config = cfg.logging.to_log_config("smods");
    log_config.emit_stderr |= cli.verbose;
    let log_path = init_logging(log_config)?;
    tracing::debug!(log=%log_path.display(), base=%cfg.site.base_url, "smods.start");

    let client = build_client(&cfg)?;

    match cli.command {
        Commands::Search {
            keyword,
            page,
            sort,
            period,
        } => {
            let query = CatalogueQuery::new(keyword)
                .page(page)
                .sort(sort.unwrap_or_default())
                .period(period.unwrap_or_default());
            print_json(&client.search(&query).await?)
        }
        Commands::Show { id_or_url } => {
            let full = if id_or_url.starts_with("http://") || id_or_url.starts_with("https://") {
                client.full_mod_by_url(&id_or_url).await?
            } else {
                client.full_mod(&id_or_url).await?
            };
            print_json(&full)
        }
        Commands::Base { id } => print_json(&client.mod_base(&id).await?),
        Commands::Steam { steam_id } => print_json(&client.mod_base_by_steam_id(&steam_id).await?),
        Commands::Revisions { id } => {
            let (latest, older) = client.revisions(&id).await?;
            print_json(&Revisions { latest, older })
        }
        Commands::Deps { ids, recursive } => {
            print_json(&client.dependency_tree(ids.as_slice(), recursive).await?)
        }
        Commands::Download { id } => {
            let url = client.download_url_by_id(&id).await?;
            println!("{url}");
            Ok(())
        }
    }
}
