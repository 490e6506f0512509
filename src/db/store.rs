//! Seed-script application and id bookkeeping against the local store.

use rusqlite::Connection;

use crate::db::Db;
use crate::emit::{Dialect, SqlScript};
use crate::error::{Result, TriageError};
use crate::graph::{IdAllocator, Namespace};

/// Tables the seed script writes to, in dependency order.
pub const GRAPH_TABLES: &[&str] = &["actionable", "response", "question", "option", "result", "symptom"];

/// Highest ids currently persisted, per namespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreMaxIds {
    pub action: Option<i64>,
    pub response: Option<i64>,
    pub entry_point: Option<i64>,
}

impl StoreMaxIds {
    /// Raise every allocator counter above the stored maxima.
    pub fn seed(&self, ids: &mut IdAllocator) {
        let pairs = [
            (Namespace::Action, self.action),
            (Namespace::Response, self.response),
            (Namespace::EntryPoint, self.entry_point),
        ];
        for (namespace, max) in pairs {
            if let Some(max) = max {
                ids.observe(namespace, max);
            }
        }
    }
}

/// Summary of one script application.
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    pub statements: usize,
    /// Rows actually inserted; conflicting rows count as zero.
    pub inserted: usize,
    pub foreign_key_violations: usize,
}

pub fn read_max_ids(conn: &Connection) -> Result<StoreMaxIds> {
    let max_of = |table: &str| -> Result<Option<i64>> {
        let sql = format!("SELECT MAX(id) FROM {}", table);
        Ok(conn.query_row(&sql, [], |row| row.get::<_, Option<i64>>(0))?)
    };
    Ok(StoreMaxIds {
        action: max_of("actionable")?,
        response: max_of("response")?,
        entry_point: max_of("symptom")?,
    })
}

pub async fn store_max_ids(db: &Db) -> Result<StoreMaxIds> {
    db.with_connection(|conn| read_max_ids(conn)).await
}

/// Run a SQLite-dialect script: prologue, statements in one transaction,
/// then the epilogue, which runs even when a statement fails.
pub fn apply_script_on(conn: &mut Connection, script: &SqlScript) -> Result<ApplyReport> {
    if script.dialect != Dialect::Sqlite {
        return Err(TriageError::InvalidInput(format!(
            "cannot apply a {} script to the SQLite store",
            script.dialect.as_str()
        )));
    }

    for stmt in &script.prologue {
        conn.execute_batch(stmt)?;
    }

    let outcome = (|| -> Result<ApplyReport> {
        let tx = conn.transaction()?;
        let mut report = ApplyReport::default();
        for stmt in script.statements() {
            report.inserted += tx.execute(stmt, [])?;
            report.statements += 1;
        }
        tx.commit()?;
        Ok(report)
    })();

    let mut restore_error = None;
    for stmt in &script.epilogue {
        if let Err(e) = conn.execute_batch(stmt) {
            log::error!("Failed to restore constraints with '{}': {}", stmt, e);
            restore_error.get_or_insert(e);
        }
    }

    let mut report = outcome?;
    if let Some(e) = restore_error {
        return Err(TriageError::Database(e));
    }

    report.foreign_key_violations = count_foreign_key_violations(conn)?;
    if report.foreign_key_violations > 0 {
        log::warn!(
            "{} foreign key violations after applying the seed script",
            report.foreign_key_violations
        );
    }
    Ok(report)
}

pub async fn apply_script(db: &Db, script: SqlScript) -> Result<ApplyReport> {
    db.with_connection(move |conn| apply_script_on(conn, &script)).await
}

fn count_foreign_key_violations(conn: &Connection) -> Result<usize> {
    let mut stmt = conn.prepare("PRAGMA foreign_key_check")?;
    let mut rows = stmt.query([])?;
    let mut count = 0;
    while rows.next()?.is_some() {
        count += 1;
    }
    Ok(count)
}

/// Row counts for [`GRAPH_TABLES`].
pub fn row_counts(conn: &Connection) -> Result<Vec<(&'static str, i64)>> {
    GRAPH_TABLES
        .iter()
        .map(|table| {
            let sql = format!("SELECT COUNT(*) FROM {}", table);
            let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
            Ok((*table, count))
        })
        .collect()
}
