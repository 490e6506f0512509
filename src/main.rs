use triage_graph::Config;
use triage_graph::db::{Db, migrate};
use triage_graph::db::store::{row_counts, store_max_ids};
use triage_graph::error::TriageError;
use std::path::Path;
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG overrides the default level
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", "info")
    ).init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("verify");

    match command {
        "migrate" => {
            run_migrate().await?;
        }
        "verify" => {
            run_schema_verification().await?;
        }
        other => {
            anyhow::bail!("Unknown command '{}'. Expected 'verify' or 'migrate'.", other);
        }
    }

    Ok(())
}

/// Bring the local store up to the current schema
async fn run_migrate() -> Result<()> {
    let config = Config::load()?;
    log::info!("Database path: {}", config.db_path().display());

    let db = Db::new(config.db_path());
    let migrations_dir = Path::new("migrations");
    db.with_connection(|conn| {
        migrate::run_migrations(conn, migrations_dir)
    }).await?;

    log::info!("Database initialized successfully");
    Ok(())
}

/// Migrate, then check tables, reference rows, and pragmas
async fn run_schema_verification() -> Result<()> {
    log::info!("Starting triage-graph v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    log::info!("Configuration loaded successfully");
    log::info!("Input batch: {}", config.triage.input_path.display());
    log::info!("JSON store: {}", config.json_store().display());
    log::info!("Database path: {}", config.db_path().display());

    run_migrate().await?;

    let db = Db::new(config.db_path());
    verify_database_schema(&db).await?;

    let maxima = store_max_ids(&db).await?;
    log::info!(
        "Store maxima: action {:?}, response {:?}, entry point {:?}",
        maxima.action,
        maxima.response,
        maxima.entry_point
    );
    Ok(())
}

async fn verify_database_schema(db: &Db) -> Result<()> {
    db.with_connection(|conn| {
        let missing = migrate::missing_tables(conn)?;
        for table in &missing {
            log::error!("Missing table: {}", table);
        }
        if !missing.is_empty() {
            return Err(TriageError::Config("Not all required tables exist".to_string()));
        }
        log::debug!("✓ {} tables exist", migrate::EXPECTED_TABLES.len());

        let animals: i64 = conn.query_row("SELECT COUNT(*) FROM animal", [], |row| row.get(0))?;
        let tiers: i64 = conn.query_row("SELECT COUNT(*) FROM risk_category", [], |row| row.get(0))?;
        if animals < 2 || tiers < 3 {
            return Err(TriageError::Config(format!(
                "Reference rows incomplete: {} animals, {} risk categories",
                animals, tiers
            )));
        }
        log::debug!("✓ Reference rows present");

        let applied = migrate::get_applied_migrations(conn)?;
        log::debug!("✓ {} migrations applied", applied.len());

        let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        if journal_mode.to_uppercase() != "WAL" {
            return Err(TriageError::Config(format!("Journal mode is not WAL: {}", journal_mode)));
        }

        let foreign_keys: i32 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
        if foreign_keys != 1 {
            return Err(TriageError::Config("Foreign keys not enabled".to_string()));
        }
        log::debug!("✓ Foreign keys enabled");

        let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if integrity != "ok" {
            return Err(TriageError::Config(format!("Database integrity check failed: {}", integrity)));
        }
        log::info!("✓ Database integrity: OK");

        for (table, count) in row_counts(conn)? {
            log::info!("{:<12} {:>8} rows", table, count);
        }

        Ok(())
    }).await?;

    log::info!("✓ Database schema verification complete");
    Ok(())
}
