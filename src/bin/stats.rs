use triage_graph::{config::Config, db::Db, error::TriageError};
use triage_graph::db::store::{read_max_ids, row_counts};
use triage_graph::emit::JsonStore;
use triage_graph::ingest::BatchLedger;
use std::collections::BTreeMap;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load()?;

    println!("\n=== Triage Graph Statistics ===\n");

    let store = JsonStore::new(&config.triage.json_store, &config.triage.backup_dir);
    let nodes = store.load()?;
    let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_rating: BTreeMap<String, usize> = BTreeMap::new();
    for node in &nodes {
        let kind = node["type"].as_str().unwrap_or("unknown").to_string();
        *by_type.entry(kind).or_default() += 1;
        if let Some(rating) = node["result"]["risk_category"]["rating"].as_str() {
            *by_rating.entry(rating.to_string()).or_default() += 1;
        }
    }

    println!("JSON store: {}", store.path().display());
    println!("{:-<40}", "");
    println!("{:<20} {:>10}", "Nodes", nodes.len());
    for (kind, count) in &by_type {
        println!("  {:<18} {:>10}", kind, count);
    }
    for (rating, count) in &by_rating {
        println!("  {:<18} {:>10}", rating, count);
    }
    if let Some(max) = JsonStore::max_id(&nodes) {
        println!("{:<20} {:>10}", "Highest id", max);
    }

    let db_path = config.db_path();
    if db_path.exists() {
        let db = Db::new(db_path);
        let (counts, maxima) = db.with_connection(|conn| {
            Ok::<_, TriageError>((row_counts(conn)?, read_max_ids(conn)?))
        }).await?;

        println!("\nSQLite store: {}", db_path.display());
        println!("{:-<40}", "");
        for (table, count) in counts {
            println!("{:<20} {:>10}", table, count);
        }
        println!("{:<20} {:>10?}", "Max action id", maxima.action);
        println!("{:<20} {:>10?}", "Max response id", maxima.response);
        println!("{:<20} {:>10?}", "Max entry id", maxima.entry_point);
    } else {
        println!("\nNo SQLite store at {}", db_path.display());
    }

    let ledger = BatchLedger::load(&config.triage.ledger_path)?;
    if !ledger.entries().is_empty() {
        println!("\nApplied batches:");
        println!("{:-<72}", "");
        for entry in ledger.entries() {
            println!(
                "{:<8} {} {:>6} records  ids {:?}..{:?}  {}",
                entry.target,
                &entry.fingerprint[..12.min(entry.fingerprint.len())],
                entry.records,
                entry.first_id,
                entry.last_id,
                entry.applied_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    println!();
    Ok(())
}
