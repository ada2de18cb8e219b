use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;

use super::migrations::Migrator;

pub async fn establish_connection(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url.to_owned());
    options
        .max_connections(20)
        .sqlx_logging(false);

    Database::connect(options).await
}

/// Accepts a full connection URL or a bare SQLite file path
pub fn get_database_url(database: Option<&str>) -> String {
    match database {
        Some(":memory:") => "sqlite::memory:".to_string(),
        Some(url) if url.contains("://") || url.starts_with("sqlite:") => url.to_string(),
        Some(path) => format!("sqlite:{}?mode=rwc", path),
        None => "sqlite:gallery.db?mode=rwc".to_string(),
    }
}

/// Bring the schema up to date
pub async fn setup_database(db: &DatabaseConnection) -> Result<(), DbErr> {
    Migrator::up(db, None).await
}
