use crate::entities::{file_tags, uploaded_files};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::env;
use std::time::Duration;
use tracing::info;

const DEFAULT_DATABASE_URL: &str = "sqlite://uploads.db?mode=rwc";

pub async fn setup_database() -> anyhow::Result<DatabaseConnection> {
    let db_url = env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

    info!("📂 Database: {}", db_url);

    let mut opt = ConnectOptions::new(&db_url);
    opt.max_connections(20)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;

    Ok(db)
}

/// Creates the tables and indexes derived from the entities. Safe to run on
/// every start.
pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    info!("🔄 Running SeaORM schema sync...");
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let tables = vec![
        schema
            .create_table_from_entity(uploaded_files::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(file_tags::Entity)
            .if_not_exists()
            .to_owned(),
    ];
    for stmt in tables {
        db.execute(builder.build(&stmt)).await?;
    }

    let indexes = schema
        .create_index_from_entity(uploaded_files::Entity)
        .into_iter()
        .chain(schema.create_index_from_entity(file_tags::Entity));
    for mut stmt in indexes {
        db.execute(builder.build(stmt.if_not_exists())).await?;
    }

    // Listings filter by tag, then join back on file id
    db.execute(sea_orm::Statement::from_string(
        builder,
        "CREATE INDEX IF NOT EXISTS idx_file_tags_tag ON file_tags(tag);".to_string(),
    ))
    .await?;

    Ok(())
}
