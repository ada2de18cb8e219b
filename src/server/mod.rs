pub mod app;
pub mod extract;
pub mod handlers;
pub mod openapi;

use anyhow::Result;
use clap::Subcommand;
use sea_orm_migration::prelude::*;
use tokio::signal;
use tracing::info;

use crate::config::{DeploymentEnvironment, ServeArgs};
use crate::database::{connection::*, migrations::Migrator};
use crate::storage::ImageStore;

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum MigrateDirection {
    Up,
    Down,
    Fresh,
}

pub async fn start_server(args: ServeArgs) -> Result<()> {
    let environment = DeploymentEnvironment::detect();
    info!("Starting in {} environment", environment.name());

    let settings = args.settings();
    let auth = args.token_verifier()?;
    let analyzer = args.vision_analyzer()?;

    let database_url = get_database_url(Some(&args.database_url));
    let db = establish_connection(&database_url).await?;
    setup_database(&db).await?;
    info!("Database migrations completed");

    ImageStore::new(settings.upload_dir.clone()).bootstrap().await?;
    info!("Serving uploads from {}", settings.upload_dir.display());

    let state = app::AppState::new(db, auth, analyzer, &settings);
    let app = app::create_app(state, &args.allowed_origins).await?;

    log_routes();

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port)).await?;
    info!("Server running on http://0.0.0.0:{}", args.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn log_routes() {
    info!("API Endpoints:");
    info!("  /health                     - Health check");
    info!("  /api-docs/openapi.json      - OpenAPI document");
    #[cfg(feature = "swagger")]
    info!("  /docs                       - Swagger UI documentation");
    info!("  /api/upload                 - Upload images (multipart)");
    info!("  /api/images[/:id]           - List, fetch, delete, reanalyze");
    info!("  /api/search                 - Ranked text search");
    info!("  /api/similar                - Images sharing tags or colors");
    info!("  /api/filter-by-color        - Images by palette color");
    info!("  /api/account                - Delete the caller's data");
    info!("  /uploads/*                  - Originals and thumbnails");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(err) => {
                tracing::error!("Failed to install terminate handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

pub async fn migrate_database(database_url: &str, direction: MigrateDirection) -> Result<()> {
    let database_url = get_database_url(Some(database_url));
    let db = establish_connection(&database_url).await?;

    match direction {
        MigrateDirection::Up => {
            info!("Running migrations up");
            Migrator::up(&db, None).await?;
        }
        MigrateDirection::Down => {
            info!("Running migrations down");
            Migrator::down(&db, None).await?;
        }
        MigrateDirection::Fresh => {
            info!("Running fresh migrations (down then up)");
            Migrator::down(&db, None).await?;
            Migrator::up(&db, None).await?;
        }
    }

    info!("Database migration completed");
    Ok(())
}
