use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use inmo_client::{DefaultAdapterFactory, HttpFetcher, SystemClassifier};
use inmo_core::models::{Agency, NewAgency};
use inmo_core::traits::{AdapterFactory, PendingScope, SiteAdapter};
use inmo_core::{
    EnrichmentPipeline, PipelineConfig, PropertyFilter, PropertyView, TracingEnrichmentReporter,
};
use inmo_db::{Database, DatabaseConfig};

/// Agencies and listings handled per run in `--test` mode.
const TEST_AGENCIES: usize = 1;
const TEST_PROPERTIES: usize = 5;

#[derive(Parser)]
#[command(name = "inmo", version, about = "Real-estate listing ingestion and enrichment")]
struct Cli {
    /// SQLite database URL (defaults to sqlite://inmo.db)
    #[arg(long, global = true, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage agencies
    Agency {
        #[command(subcommand)]
        command: AgencyCommands,
    },

    /// Detect the CMS each agency site runs
    Classify {
        /// Re-classify agencies that already have a system
        #[arg(long, default_value_t = false)]
        all: bool,
    },

    /// Scrape listing summaries and upsert them by code
    Search {
        /// Only agencies whose name contains this text
        #[arg(short, long)]
        agency: Option<String>,

        /// Limit the run to one agency and a handful of listings
        #[arg(long, default_value_t = false)]
        test: bool,
    },

    /// Enrich pending properties with their detail pages
    Enrich {
        /// Only agencies whose name contains this text
        #[arg(short, long)]
        agency: Option<String>,

        /// Number of concurrent extraction workers
        #[arg(short, long, env = "INMO_WORKERS")]
        workers: Option<usize>,

        /// Reduced concurrency and batch size
        #[arg(long, default_value_t = false)]
        test: bool,
    },

    /// Print properties of a view as JSON
    List {
        /// unrated, liked or favorites
        view: PropertyView,

        /// Filter as a JSON object, e.g. '{"currency":"USD","price_max":90000}'
        #[arg(short, long)]
        filter: Option<String>,

        /// Maximum number of properties to print
        #[arg(short, long)]
        limit: Option<u32>,
    },
}

#[derive(Subcommand)]
enum AgencyCommands {
    /// Register an agency unless a similar one is already stored
    Add {
        #[arg(long)]
        name: String,

        #[arg(long)]
        url: String,

        #[arg(long)]
        zone: Option<String>,

        #[arg(long)]
        address: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        rating: Option<f64>,
    },

    /// List stored agencies
    List {
        /// Only agencies whose system is still unknown
        #[arg(long, default_value_t = false)]
        without_system: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("inmo=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db = connect_db(cli.database_url.as_deref()).await?;

    match cli.command {
        Commands::Agency { command } => match command {
            AgencyCommands::Add {
                name,
                url,
                zone,
                address,
                phone,
                rating,
            } => {
                let agency = NewAgency {
                    name,
                    url,
                    zone,
                    address,
                    phone,
                    rating,
                };
                cmd_agency_add(&db, &agency).await?;
            }
            AgencyCommands::List { without_system } => {
                cmd_agency_list(&db, without_system).await?;
            }
        },
        Commands::Classify { all } => cmd_classify(&db, all).await?,
        Commands::Search { agency, test } => cmd_search(&db, agency.as_deref(), test).await?,
        Commands::Enrich {
            agency,
            workers,
            test,
        } => cmd_enrich(&db, agency.as_deref(), workers, test).await?,
        Commands::List {
            view,
            filter,
            limit,
        } => cmd_list(&db, view, filter.as_deref(), limit).await?,
    }

    Ok(())
}

async fn connect_db(url: Option<&str>) -> Result<Database> {
    let config = match url {
        Some(url) => DatabaseConfig::new(url),
        None => DatabaseConfig::from_env()?,
    };

    let db = Database::connect(&config)
        .await
        .context("Failed to open database")?;
    db.migrate().await.context("Failed to run migrations")?;

    Ok(db)
}

/// Agencies whose name contains `needle`, or `fallback` when no needle is given.
async fn select_agencies(db: &Database, needle: Option<&str>, fallback: Vec<Agency>) -> Result<Vec<Agency>> {
    let Some(needle) = needle else {
        return Ok(fallback);
    };

    let agencies = db
        .agency_repo()
        .find_by_name(needle)
        .await?;
    if agencies.is_empty() {
        bail!("No agency matches '{needle}'");
    }
    Ok(agencies)
}

async fn cmd_agency_add(db: &Database, agency: &NewAgency) -> Result<()> {
    let created = db
        .agency_repo()
        .create_if_new(agency)
        .await?;

    match created {
        Some(agency) => println!("Created agency {} ({})", agency.id, agency.name),
        None => println!("Agency '{}' already exists, skipped", agency.name),
    }

    Ok(())
}

async fn cmd_agency_list(db: &Database, without_system: bool) -> Result<()> {
    let repo = db.agency_repo();
    let agencies = if without_system {
        repo.list_without_system().await
    } else {
        repo.list().await
    }?;

    for agency in &agencies {
        println!(
            "  [{}] {} <{}> system={}",
            agency.id,
            agency.name,
            agency.url,
            agency.system.as_deref().unwrap_or("-"),
        );
    }
    println!("\nTotal: {} agencies", agencies.len());

    Ok(())
}

async fn cmd_classify(db: &Database, all: bool) -> Result<()> {
    let repo = db.agency_repo();
    let agencies = if all {
        repo.list().await
    } else {
        repo.list_without_system().await
    }?;

    let fetcher = HttpFetcher::new().context("Failed to create HTTP client")?;
    let classifier = SystemClassifier::new(fetcher);

    let mut classified = 0usize;
    for agency in &agencies {
        match classifier.classify(&agency.url).await {
            Ok(system) => {
                repo.update_system(agency.id, &system)
                    .await?;
                tracing::info!(agency_id = agency.id, name = %agency.name, %system, "Agency classified");
                classified += 1;
            }
            Err(e) => {
                tracing::warn!(agency_id = agency.id, url = %agency.url, error = %e, "Could not fetch agency site");
            }
        }
    }

    println!("Classified {classified} of {} agencies", agencies.len());
    Ok(())
}

async fn cmd_search(db: &Database, needle: Option<&str>, test: bool) -> Result<()> {
    let with_system = db
        .agency_repo()
        .list_with_system()
        .await?;
    let mut agencies: Vec<Agency> = select_agencies(db, needle, with_system)
        .await?
        .into_iter()
        .filter(|a| a.system.as_deref().is_some_and(DefaultAdapterFactory::<HttpFetcher>::supports))
        .collect();
    if test {
        agencies.truncate(TEST_AGENCIES);
    }
    if agencies.is_empty() {
        println!("No agency with a supported system");
        return Ok(());
    }

    let fetcher = HttpFetcher::new().context("Failed to create HTTP client")?;
    let factory = DefaultAdapterFactory::new(fetcher);
    let properties = db.property_repo();

    let mut stored = 0usize;
    for agency in &agencies {
        let adapter = factory.for_agency(agency)?;
        let mut stubs = match adapter.search_properties().await {
            Ok(stubs) => stubs,
            Err(e) => {
                tracing::warn!(agency_id = agency.id, name = %agency.name, error = %e, "Search failed");
                continue;
            }
        };
        if test {
            stubs.truncate(TEST_PROPERTIES);
        }

        tracing::info!(agency_id = agency.id, name = %agency.name, found = stubs.len(), "Listings found");
        for stub in &stubs {
            match properties.upsert_stub(agency.id, stub).await {
                Ok(_) => stored += 1,
                Err(e) => tracing::warn!(code = %stub.code, error = %e, "Listing skipped"),
            }
        }
    }

    println!("Stored {stored} listings from {} agencies", agencies.len());
    Ok(())
}

async fn cmd_enrich(db: &Database, needle: Option<&str>, workers: Option<usize>, test: bool) -> Result<()> {
    let agency_ids = select_agencies(db, needle, Vec::new())
        .await?
        .iter()
        .map(|a| a.id)
        .collect();

    let mut config = if test {
        PipelineConfig::test_mode()
    } else {
        PipelineConfig::default()
    };
    if let Some(workers) = workers {
        config = config.with_workers(workers);
    }

    let scope = PendingScope {
        agency_ids,
        limit: test.then_some(TEST_PROPERTIES),
    };

    // The pipeline applies its own deadlines; the client timeout only backstops the longest one.
    let fetcher = HttpFetcher::with_timeout(config.escalated_timeout).context("Failed to create HTTP client")?;
    let pipeline = EnrichmentPipeline::new(DefaultAdapterFactory::new(fetcher), db.clone(), config);

    let cancel_token = CancellationToken::new();
    let on_signal = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight writes");
            on_signal.cancel();
        }
    });

    let summary = pipeline
        .run_pending(&scope, cancel_token, Arc::new(TracingEnrichmentReporter))
        .await?;

    println!(
        "Enriched {} properties: {} completed, {} failed, {} not available, {} skipped",
        summary.total(),
        summary.succeeded,
        summary.failed,
        summary.not_available,
        summary.skipped
    );
    Ok(())
}

async fn cmd_list(db: &Database, view: PropertyView, filter: Option<&str>, limit: Option<u32>) -> Result<()> {
    let filter: PropertyFilter = match filter {
        Some(raw) => serde_json::from_str(raw).context("Invalid JSON filter")?,
        None => PropertyFilter::default(),
    };

    let properties = db
        .property_repo()
        .list(view, &filter, limit)
        .await?;

    println!("{}", serde_json::to_string_pretty(&properties)?);
    Ok(())
}
