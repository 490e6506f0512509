use clap::Parser;
use triage_graph::Config;
use triage_graph::images::DirectoryImageSlots;
use triage_graph::pipeline::{run_json, RunOptions};
use std::path::PathBuf;
use std::time::Instant;
use anyhow::Result;

#[derive(Parser, Debug)]
#[command(name = "build-json")]
#[command(about = "Append an enrichment batch to the JSON triage graph")]
struct Args {
    /// Enrichment batch (defaults to triage.input_path)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Append even if this batch was already appended
    #[arg(short, long)]
    force: bool,

    /// Build and verify the graph without writing anything
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;

    // RUST_LOG wins over triage.log_level
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", &config.triage.log_level)
    ).init();

    let input = args.input.unwrap_or_else(|| config.triage.input_path.clone());

    log::info!("Input batch: {}", input.display());
    log::info!("JSON store: {}", config.json_store().display());

    let start = Instant::now();
    let mut slots = DirectoryImageSlots::new(&config.triage.image_root);
    let report = run_json(
        &config,
        &input,
        RunOptions { force: args.force, dry_run: args.dry_run },
        &mut slots,
    )?;

    if report.already_applied {
        println!("Batch already appended; nothing to do.");
        return Ok(());
    }

    println!("Diseases:        {}", report.diseases);
    println!("Rejected:        {}", report.rejected);
    println!("Nodes appended:  {}", report.outcome.appended);
    println!("Nodes in store:  {}", report.outcome.total);
    println!("Image folders:   {}", report.image_slots);
    if let Some(backup) = &report.outcome.backup {
        println!("Backup:          {}", backup.display());
    }
    log::info!("Finished in {:.2}s", start.elapsed().as_secs_f64());

    Ok(())
}
