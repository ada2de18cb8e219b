use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use aigallery::config::ServeArgs;
use aigallery::server::{self, MigrateDirection};

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve(ServeArgs),
    Db {
        #[clap(subcommand)]
        command: DbCommands,
    },
}

#[derive(Subcommand)]
enum DbCommands {
    /// Apply or roll back schema migrations
    Migrate {
        #[clap(subcommand)]
        direction: MigrateDirection,
        #[clap(
            short,
            long,
            env = "DATABASE_URL",
            default_value = "sqlite:gallery.db?mode=rwc"
        )]
        database_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal outside development
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    match cli.command {
        Commands::Serve(args) => {
            info!("Starting server on port {}", args.port);
            server::start_server(args).await?;
        }
        Commands::Db { command } => match command {
            DbCommands::Migrate {
                direction,
                database_url,
            } => {
                server::migrate_database(&database_url, direction).await?;
            }
        },
    }

    Ok(())
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .map(|level| level.to_lowercase())
        .as_deref()
        .unwrap_or("info")
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!(
            "sqlx=warn,hyper=info,{}",
            log_level
        )))
        .without_time()
        .init();
}
