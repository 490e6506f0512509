use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use crate::error::{Result, TriageError};

/// Tables every migrated store must contain
pub const EXPECTED_TABLES: &[&str] = &[
    "actionable",
    "animal",
    "option",
    "question",
    "response",
    "result",
    "risk_category",
    "schema_migrations",
    "symptom",
];

/// Migration metadata
struct Migration {
    version: u32,
    name: String,
    sql: String,
    checksum: String,
}

fn checksum(sql: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sql.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Create schema_migrations table if it doesn't exist
fn ensure_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            checksum TEXT NOT NULL,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get list of applied migrations
pub fn get_applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM schema_migrations ORDER BY version")?;
    let names: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
        .map_err(TriageError::Database)?;
    Ok(names)
}

fn applied_checksum(conn: &Connection, name: &str) -> Result<Option<String>> {
    let found = conn
        .query_row(
            "SELECT checksum FROM schema_migrations WHERE name = ?1",
            params![name],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(found)
}

/// Load `NNN_name.sql` files from the migrations directory, ordered by version
fn load_migrations(migrations_dir: &Path) -> Result<Vec<Migration>> {
    let mut migrations = Vec::new();

    let entries = fs::read_dir(migrations_dir).map_err(|e| {
        TriageError::Config(format!(
            "Cannot read migrations directory {}: {}",
            migrations_dir.display(),
            e
        ))
    })?;

    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("sql") {
            continue;
        }
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| TriageError::Config("Invalid migration filename".to_string()))?;

        let version: u32 = filename
            .split('_')
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| TriageError::Config(format!("Invalid migration version: {}", filename)))?;

        let sql = fs::read_to_string(&path)?;
        migrations.push(Migration {
            version,
            name: filename.trim_end_matches(".sql").to_string(),
            checksum: checksum(&sql),
            sql,
        });
    }

    migrations.sort_by_key(|m| m.version);

    if let Some(w) = migrations.windows(2).find(|w| w[0].version == w[1].version) {
        return Err(TriageError::Config(format!(
            "Duplicate migration version {} ({} and {})",
            w[0].version, w[0].name, w[1].name
        )));
    }

    Ok(migrations)
}

/// Run all pending migrations, each in its own transaction
///
/// An applied migration whose file changed afterwards is reported and left
/// alone; the store is never re-migrated behind the operator's back.
pub fn run_migrations(conn: &mut Connection, migrations_dir: &Path) -> Result<()> {
    ensure_migrations_table(conn)?;

    for migration in load_migrations(migrations_dir)? {
        if let Some(stored) = applied_checksum(conn, &migration.name)? {
            if stored != migration.checksum {
                log::warn!(
                    "Migration {} changed since it was applied (checksum mismatch)",
                    migration.name
                );
            } else {
                log::debug!("Migration {} already applied, skipping", migration.name);
            }
            continue;
        }

        log::info!("Applying migration: {} (version {})", migration.name, migration.version);

        let tx = conn.transaction()?;
        tx.execute_batch(&migration.sql).map_err(|e| {
            TriageError::Config(format!("Failed to execute migration {}: {}", migration.name, e))
        })?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name, checksum) VALUES (?1, ?2, ?3)",
            params![migration.version, migration.name, migration.checksum],
        )?;
        tx.commit()?;

        log::info!("Migration {} applied successfully", migration.name);
    }

    log::info!("All migrations completed");
    Ok(())
}

/// Names from [`EXPECTED_TABLES`] missing in the store
pub fn missing_tables(conn: &Connection) -> Result<Vec<&'static str>> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table'")?;
    let tables: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(EXPECTED_TABLES
        .iter()
        .copied()
        .filter(|t| !tables.iter().any(|name| name == t))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project_migrations() -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    }

    #[test]
    fn test_load_migrations_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("migrations");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("002_another.sql"), "CREATE TABLE another (id INTEGER);").unwrap();
        fs::write(dir.join("001_test.sql"), "CREATE TABLE test (id INTEGER);").unwrap();
        fs::write(dir.join("README.md"), "not a migration").unwrap();

        let migrations = load_migrations(&dir).unwrap();
        assert_eq!(migrations.len(), 2);
        assert_eq!(migrations[0].version, 1);
        assert_eq!(migrations[1].name, "002_another");
    }

    #[test]
    fn test_duplicate_versions_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("001_a.sql"), "SELECT 1;").unwrap();
        fs::write(dir.join("001_b.sql"), "SELECT 1;").unwrap();
        assert!(load_migrations(dir).is_err());
    }

    #[test]
    fn test_full_migration_schema() {
        let temp_dir = TempDir::new().unwrap();
        let mut conn = Connection::open(temp_dir.path().join("test.db")).unwrap();

        run_migrations(&mut conn, &project_migrations()).unwrap();
        assert!(missing_tables(&conn).unwrap().is_empty());

        let animals: i64 = conn.query_row("SELECT COUNT(*) FROM animal", [], |r| r.get(0)).unwrap();
        assert_eq!(animals, 2);
        let tiers: i64 = conn
            .query_row("SELECT COUNT(*) FROM risk_category", [], |r| r.get(0))
            .unwrap();
        assert_eq!(tiers, 3);
    }

    #[test]
    fn test_migrations_run_once() {
        let temp_dir = TempDir::new().unwrap();
        let mut conn = Connection::open(temp_dir.path().join("test.db")).unwrap();

        run_migrations(&mut conn, &project_migrations()).unwrap();
        run_migrations(&mut conn, &project_migrations()).unwrap();

        let applied = get_applied_migrations(&conn).unwrap();
        assert_eq!(applied, vec!["001_triage_tables", "002_reference_rows"]);
    }

    #[test]
    fn test_changed_migration_is_not_reapplied() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("migrations");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("001_t.sql"), "CREATE TABLE t (id INTEGER);").unwrap();
        let mut conn = Connection::open(temp_dir.path().join("test.db")).unwrap();
        run_migrations(&mut conn, &dir).unwrap();

        fs::write(dir.join("001_t.sql"), "CREATE TABLE t (id INTEGER, extra TEXT);").unwrap();
        run_migrations(&mut conn, &dir).unwrap();

        let stored = applied_checksum(&conn, "001_t").unwrap().unwrap();
        assert_eq!(stored, checksum("CREATE TABLE t (id INTEGER);"));
    }
}
