use clap::Parser;
use triage_graph::Config;
use triage_graph::db::{Db, migrate};
use triage_graph::db::store::StoreMaxIds;
use triage_graph::emit::Dialect;
use triage_graph::images::DirectoryImageSlots;
use triage_graph::ingest::load_records;
use triage_graph::pipeline::{plan_sql, run_store, write_sql, RunOptions};
use std::path::{Path, PathBuf};
use anyhow::Result;

#[derive(Parser, Debug)]
#[command(name = "emit-sql")]
#[command(about = "Emit an idempotent relational seed script for an enrichment batch")]
struct Args {
    /// Enrichment batch (defaults to triage.input_path)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Script destination (defaults to triage.sql_output)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// postgres or sqlite (--apply always uses sqlite)
    #[arg(short, long, default_value = "postgres", conflicts_with = "apply")]
    dialect: Dialect,

    /// Apply directly to the local SQLite store instead of writing a script;
    /// its maxima are read from the store
    #[arg(long)]
    apply: bool,

    /// Highest action id already in the target store
    #[arg(long, conflicts_with = "apply")]
    max_action_id: Option<i64>,

    /// Highest response id already in the target store
    #[arg(long, conflicts_with = "apply")]
    max_response_id: Option<i64>,

    /// Highest entry-point id already in the target store
    #[arg(long, conflicts_with = "apply")]
    max_entry_id: Option<i64>,

    /// Apply even if this batch was already applied
    #[arg(short, long)]
    force: bool,

    /// Build and verify without writing
    #[arg(long)]
    dry_run: bool,
}

impl Args {
    fn store_max(&self) -> Option<StoreMaxIds> {
        if self.max_action_id.is_none() && self.max_response_id.is_none() && self.max_entry_id.is_none() {
            return None;
        }
        Some(StoreMaxIds {
            action: self.max_action_id,
            response: self.max_response_id,
            entry_point: self.max_entry_id,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;

    // RUST_LOG wins over triage.log_level
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", &config.triage.log_level)
    ).init();

    let input = args.input.clone().unwrap_or_else(|| config.triage.input_path.clone());
    let options = RunOptions { force: args.force, dry_run: args.dry_run };

    if args.apply {
        let db = Db::new(config.db_path());
        db.with_connection(|conn| {
            migrate::run_migrations(conn, Path::new("migrations"))
        }).await?;

        let mut slots = DirectoryImageSlots::new(&config.triage.image_root);
        let report = run_store(&config, &db, &input, options, &mut slots).await?;
        if report.already_applied {
            println!("Batch already applied; nothing to do.");
            return Ok(());
        }
        println!("Diseases:       {}", report.diseases);
        println!("Rejected:       {}", report.rejected);
        println!("Statements:     {}", report.applied.statements);
        println!("Rows inserted:  {}", report.applied.inserted);
        println!("Image folders:  {}", report.image_slots);
        if report.applied.foreign_key_violations > 0 {
            anyhow::bail!(
                "{} foreign key violations in {}",
                report.applied.foreign_key_violations,
                db.path().display()
            );
        }
        return Ok(());
    }

    let records = load_records(&input)?;
    let (built, mut script) = plan_sql(&records, &config, args.dialect, args.store_max())?;
    let at = script.header.len().saturating_sub(1);
    script.header.insert(at, format!("Source: {}", input.display()));

    for (table, count) in script.table_counts() {
        log::info!("{:<12} {:>6} statements", table, count);
    }

    if args.dry_run {
        println!("Dry run: {} statements for {} diseases", script.statement_count(), built.diseases());
        return Ok(());
    }

    let output = args.output.unwrap_or_else(|| config.triage.sql_output.clone());
    write_sql(&script, &output)?;
    println!("Diseases:    {}", built.diseases());
    println!("Rejected:    {}", built.rejected.len());
    println!("Statements:  {}", script.statement_count());
    println!("Script:      {}", output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_rejects_explicit_maxima_and_dialect() {
        assert!(Args::try_parse_from(["emit-sql", "--apply", "--max-action-id", "20000"]).is_err());
        assert!(Args::try_parse_from(["emit-sql", "--apply", "--dialect", "postgres"]).is_err());
    }

    #[test]
    fn test_script_mode_accepts_maxima() {
        let args = Args::try_parse_from([
            "emit-sql",
            "--dialect",
            "sqlite",
            "--max-action-id",
            "20000",
        ])
        .unwrap();
        assert_eq!(args.dialect, Dialect::Sqlite);
        assert_eq!(
            args.store_max(),
            Some(StoreMaxIds { action: Some(20_000), response: None, entry_point: None })
        );
        assert!(Args::try_parse_from(["emit-sql", "--apply"]).unwrap().store_max().is_none());
    }
}
