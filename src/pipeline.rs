//! Batch runs: load → normalize → build → verify → emit → persist.
//!
//! The graph is fully materialized before anything is written; nothing here
//! streams partial graphs.

use std::path::Path;

use chrono::Utc;
use serde_json::Value;

use crate::config::Config;
use crate::db::store::{apply_script, store_max_ids, ApplyReport, StoreMaxIds};
use crate::db::Db;
use crate::emit::json::AppendOutcome;
use crate::emit::{emit_nodes, write_atomic, Dialect, JsonStore, RelationalEmitter, SqlScript};
use crate::error::{Result, TriageError};
use crate::graph::{build_graph, verify_graph, Graph, IdAllocator, IdFloors, Namespace};
use crate::images::{reserve_image_slots, ImageSlots};
use crate::ingest::{
    batch_fingerprint, load_records, normalize_batch, BatchLedger, LedgerEntry, RejectedRecord,
    TARGET_JSON, TARGET_SQLITE,
};

/// A verified graph for one batch of records.
#[derive(Debug)]
pub struct BuiltBatch {
    pub graph: Graph,
    pub rejected: Vec<RejectedRecord>,
    pub fingerprint: String,
    pub records: usize,
}

impl BuiltBatch {
    pub fn diseases(&self) -> usize {
        self.graph.results().count()
    }

    fn ledger_entry(&self, target: &str) -> LedgerEntry {
        let action_ids = self
            .graph
            .nodes()
            .iter()
            .filter(|n| n.namespace() == Namespace::Action)
            .map(|n| n.id().get());
        let (first_id, last_id) = action_ids.fold((None, None), |(lo, hi): (Option<i64>, Option<i64>), id| {
            (Some(lo.map_or(id, |l| l.min(id))), Some(hi.map_or(id, |h| h.max(id))))
        });
        LedgerEntry {
            target: target.to_string(),
            fingerprint: self.fingerprint.clone(),
            applied_at: Utc::now(),
            records: self.records,
            first_id,
            last_id,
        }
    }
}

/// Normalize and build a graph from raw records, using `ids` for allocation.
pub fn build_batch(records: &[Value], config: &Config, ids: &mut IdAllocator) -> Result<BuiltBatch> {
    let fingerprint = batch_fingerprint(records)?;
    let normalized = normalize_batch(records, &config.normalize)?;
    if normalized.entries.is_empty() {
        log::info!("Batch has no usable records; the graph will be empty");
    }

    let graph = build_graph(normalized.entries, ids, &config.labels)?;
    verify_graph(&graph)?;

    log::info!(
        "Built graph: {} results, {} questions, {} entry points ({} records rejected)",
        graph.results().count(),
        graph.questions().count(),
        graph.entry_points().count(),
        normalized.rejected.len()
    );

    Ok(BuiltBatch {
        graph,
        rejected: normalized.rejected,
        fingerprint,
        records: records.len(),
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Apply even if the ledger already lists this batch.
    pub force: bool,
    /// Build and verify, write nothing.
    pub dry_run: bool,
}

#[derive(Debug, Default)]
pub struct JsonRunReport {
    /// Set when the ledger already had this batch and the run did nothing.
    pub already_applied: bool,
    pub diseases: usize,
    pub rejected: usize,
    pub outcome: AppendOutcome,
    pub image_slots: usize,
}

/// Append one batch to the JSON node array.
///
/// Ids start above the highest id already in the array (or the configured
/// floor), so earlier batches are never rewritten or shadowed.
pub fn run_json(
    config: &Config,
    records_path: &Path,
    options: RunOptions,
    slots: &mut dyn ImageSlots,
) -> Result<JsonRunReport> {
    let records = load_records(records_path)?;
    let fingerprint = batch_fingerprint(&records)?;

    let mut ledger = BatchLedger::load(&config.triage.ledger_path)?;
    if let Some(previous) = ledger.find(TARGET_JSON, &fingerprint) {
        if !options.force {
            log::info!(
                "Batch {} was already appended at {} (ids {:?}..{:?}); use --force to append again",
                &fingerprint[..12],
                previous.applied_at,
                previous.first_id,
                previous.last_id
            );
            return Ok(JsonRunReport {
                already_applied: true,
                ..JsonRunReport::default()
            });
        }
    }

    let store = JsonStore::new(&config.triage.json_store, &config.triage.backup_dir);
    let existing = store.load()?;

    let mut ids = IdAllocator::new(IdFloors::from(&config.ids));
    if let Some(max) = JsonStore::max_id(&existing) {
        ids.observe(Namespace::Action, max);
    }
    log::info!(
        "{} existing nodes in {}, next id {}",
        existing.len(),
        store.path().display(),
        ids.peek(Namespace::Action)
    );

    let built = build_batch(&records, config, &mut ids)?;
    let nodes = emit_nodes(&built.graph)?;

    let mut report = JsonRunReport {
        diseases: built.diseases(),
        rejected: built.rejected.len(),
        ..JsonRunReport::default()
    };

    if options.dry_run {
        log::info!("Dry run: {} nodes would be appended", nodes.len());
        report.outcome.appended = nodes.len();
        report.outcome.total = existing.len() + nodes.len();
        return Ok(report);
    }

    report.outcome = store.append(existing, nodes)?;
    if report.outcome.appended > 0 {
        ledger.record(built.ledger_entry(TARGET_JSON))?;
    }

    // Recorded before any image slot is reserved
    report.image_slots = reserve_image_slots(&built.graph, slots)?;

    Ok(report)
}

/// Build the relational script for a batch.
///
/// `store_max` carries the current maxima of the target store, from a live
/// query or from the operator. Without it the static floors are used, unless
/// `ids.require_store_max` forbids that.
pub fn plan_sql(
    records: &[Value],
    config: &Config,
    dialect: Dialect,
    store_max: Option<StoreMaxIds>,
) -> Result<(BuiltBatch, SqlScript)> {
    let mut ids = IdAllocator::new(IdFloors::from(&config.ids));
    match store_max {
        Some(maxima) => maxima.seed(&mut ids),
        None if config.ids.require_store_max => {
            return Err(TriageError::IdFloorUnverified(
                "current store maxima are unknown; pass them explicitly or apply to the store".to_string(),
            ));
        }
        None => log::warn!(
            "Store maxima unknown; allocating from static floors (action {}, response {}, entry point {})",
            config.ids.action_floor,
            config.ids.response_floor,
            config.ids.entry_point_floor
        ),
    }

    let emitter = RelationalEmitter::from_allocator(dialect, &ids);
    let built = build_batch(records, config, &mut ids)?;
    let mut script = emitter.emit(&built.graph)?;
    let at = script.header.len().saturating_sub(1);
    script.header.insert(at, format!("Batch fingerprint: {}", built.fingerprint));
    Ok((built, script))
}

/// Write a rendered script atomically.
pub fn write_sql(script: &SqlScript, path: &Path) -> Result<()> {
    write_atomic(path, script.render().as_bytes())?;
    log::info!(
        "Wrote {} statements to {}",
        script.statement_count(),
        path.display()
    );
    Ok(())
}

#[derive(Debug, Default)]
pub struct StoreRunReport {
    pub already_applied: bool,
    pub diseases: usize,
    pub rejected: usize,
    pub applied: ApplyReport,
    pub image_slots: usize,
}

/// Apply one batch to the local SQLite store, allocating above its current maxima.
pub async fn run_store(
    config: &Config,
    db: &Db,
    records_path: &Path,
    options: RunOptions,
    slots: &mut dyn ImageSlots,
) -> Result<StoreRunReport> {
    let records = load_records(records_path)?;
    let fingerprint = batch_fingerprint(&records)?;

    let mut ledger = BatchLedger::load(&config.triage.ledger_path)?;
    if ledger.find(TARGET_SQLITE, &fingerprint).is_some() && !options.force {
        log::info!(
            "Batch {} was already applied to {}; use --force to apply again",
            &fingerprint[..12],
            db.path().display()
        );
        return Ok(StoreRunReport {
            already_applied: true,
            ..StoreRunReport::default()
        });
    }

    let maxima = store_max_ids(db).await?;
    log::info!("Store maxima: {:?}", maxima);
    let (built, mut script) = plan_sql(&records, config, Dialect::Sqlite, Some(maxima))?;
    let at = script.header.len().saturating_sub(1);
    script.header.insert(at, format!("Source: {}", records_path.display()));

    let mut report = StoreRunReport {
        diseases: built.diseases(),
        rejected: built.rejected.len(),
        ..StoreRunReport::default()
    };

    if options.dry_run {
        log::info!("Dry run: {} statements would be applied", script.statement_count());
        return Ok(report);
    }

    report.applied = apply_script(db, script).await?;
    if !built.graph.is_empty() {
        ledger.record(built.ledger_entry(TARGET_SQLITE))?;
    }

    report.image_slots = reserve_image_slots(&built.graph, slots)?;

    Ok(report)
}
