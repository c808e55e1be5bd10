mod compare;
mod config;
mod dataset;
mod filter;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "framecull",
    version,
    about = "Removes near-duplicate frames from a per-camera surveillance dataset"
)]
struct Cli {
    /// Flat directory containing the captured frames
    #[arg(long, value_name = "DIR")]
    dataset_path: PathBuf,

    /// Per-camera filter parameters (JSON)
    #[arg(long, value_name = "FILE", default_value = "params.json")]
    params_path: PathBuf,

    /// Compute every decision but rename and delete nothing
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let params = config::load_params(&cli.params_path)?;
    println!("▶ Filtering dataset in: {}", cli.dataset_path.display());

    let summary = pipeline::run(&cli.dataset_path, &params, cli.dry_run)?;

    println!(
        "\n✅ {} frame(s) kept, {} duplicate(s) removed, {} corrupt file(s) removed, {} file(s) renamed",
        summary.kept(),
        summary.removed_duplicates(),
        summary.normalize.corrupt_removed,
        summary.normalize.renamed,
    );
    if cli.dry_run {
        println!("⚠️  Dry-run only; no files were changed.");
    }
    Ok(())
}
