use clap::{Parser, Subcommand};

use bvp_core::{AddressScheme, AppConfig, ConfigLoader};
use bvp_data::{DatabaseClient, NewAsset};
use bvp_web_api::{ApiServer, AppState};

#[derive(Parser)]
#[command(name = "bvp")]
#[command(about = "USEF meter data API for balancing valorisation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web API server
    Serve {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
        /// Profile override file (e.g. "play" loads config/Config.play.toml)
        #[arg(short, long, env = "BVP_PROFILE")]
        profile: Option<String>,
    },
    /// Create or upgrade the database schema
    Migrate {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
    },
    /// Register a connection
    AddAsset {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
        /// Unique asset name
        #[arg(long)]
        name: String,
        /// Owning user id
        #[arg(long)]
        owner: i64,
        /// Explicit asset id
        #[arg(long)]
        id: Option<i64>,
        /// Connection only consumes power
        #[arg(long, conflicts_with = "producer")]
        consumer: bool,
        /// Connection only produces power
        #[arg(long)]
        producer: bool,
    },
    /// List the connections owned by a user
    ListAssets {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
        /// Owning user id
        #[arg(long)]
        owner: i64,
    },
    /// Register the data source of a user
    AddDataSource {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
        /// Data source name
        #[arg(long)]
        name: String,
        /// User id writing through this source
        #[arg(long)]
        user: i64,
        /// Source type
        #[arg(long, default_value = "script")]
        source_type: String,
    },
    /// List registered data sources
    ListDataSources {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Serve { config, profile } => {
            let config = match profile {
                Some(profile) => ConfigLoader::load_with_profile(&config, &profile)?,
                None => ConfigLoader::load(&config)?,
            };
            run_server(&config).await?;
        }
        Commands::Migrate { config } => {
            let config = ConfigLoader::load(&config)?;
            DatabaseClient::from_config(&config.database).await?;
            tracing::info!("Database at {} is up to date", config.database.url);
        }
        Commands::AddAsset {
            config,
            name,
            owner,
            id,
            consumer,
            producer,
        } => {
            let config = ConfigLoader::load(&config)?;
            let mut asset = NewAsset::new(name, owner);
            if let Some(id) = id {
                asset = asset.with_id(id);
            }
            if consumer {
                asset = asset.pure_consumer();
            } else if producer {
                asset = asset.pure_producer();
            }
            run_add_asset(&config, &asset).await?;
        }
        Commands::AddDataSource {
            config,
            name,
            user,
            source_type,
        } => {
            let config = ConfigLoader::load(&config)?;
            let db = DatabaseClient::from_config(&config.database).await?;
            let id = db
                .repositories()
                .data_sources
                .insert(&name, &source_type, Some(user))
                .await?;
            tracing::info!("Registered data source {} ({}) for user {}", name, id, user);
        }
        Commands::ListAssets { config, owner } => {
            let config = ConfigLoader::load(&config)?;
            run_list_assets(&config, owner).await?;
        }
        Commands::ListDataSources { config } => {
            let config = ConfigLoader::load(&config)?;
            let db = DatabaseClient::from_config(&config.database).await?;
            for source in db.repositories().data_sources.list().await? {
                let user = source
                    .user_id
                    .map_or_else(|| "-".to_string(), |id| id.to_string());
                println!(
                    "{:>6}  {:<20} {:<20} user {}",
                    source.id, source.name, source.source_type, user
                );
            }
        }
    }

    Ok(())
}

async fn run_server(config: &AppConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(mode = %config.mode, "Starting web API server on {}", addr);

    let db = DatabaseClient::from_config(&config.database).await?;
    let state = AppState::new(&db.repositories(), config);
    let server = ApiServer::new(state);

    server.serve(&addr).await?;

    Ok(())
}

async fn run_add_asset(config: &AppConfig, asset: &NewAsset) -> anyhow::Result<()> {
    let db = DatabaseClient::from_config(&config.database).await?;
    let repos = db.repositories();
    if repos.assets.get_by_name(&asset.name).await?.is_some() {
        anyhow::bail!("An asset named '{}' already exists", asset.name);
    }
    if let Some(id) = asset.id {
        if repos.assets.get(id).await?.is_some() {
            anyhow::bail!("Asset id {} is already taken", id);
        }
    }
    let id = repos.assets.insert(asset).await?;

    let scheme = AddressScheme::from(&config.addressing);
    tracing::info!(
        "Registered {} as {}",
        asset.name,
        scheme.connection_address(asset.owner_id, id)
    );

    Ok(())
}

async fn run_list_assets(config: &AppConfig, owner: i64) -> anyhow::Result<()> {
    let db = DatabaseClient::from_config(&config.database).await?;
    let scheme = AddressScheme::from(&config.addressing);

    let assets = db.repositories().assets.list_for_owner(owner).await?;
    if assets.is_empty() {
        tracing::info!("User {} owns no connections", owner);
    }
    for asset in assets {
        let kind = if asset.is_pure_consumer {
            "consumer"
        } else if asset.is_pure_producer {
            "producer"
        } else {
            "prosumer"
        };
        println!(
            "{:<40} {:<20} {}",
            scheme.connection_address(asset.owner_id, asset.id),
            asset.name,
            kind
        );
    }

    Ok(())
}
