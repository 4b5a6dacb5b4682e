//! CLI argument definitions for the ILOSTAT connector.
//!
//! Without flags a run ingests every dataflow and then transforms everything
//! that was cached.
//!
//! | Flags | Ingest | Transform |
//! |-------|--------|-----------|
//! | (none) | all dataflows | all cached dataflows |
//! | `--ingest-only` | all dataflows | skipped |
//! | `--transform-only` | skipped | all cached dataflows |
//! | `--dataflow <ID>` | all dataflows | `ID` only |
//! | `--transform-only --dataflow <ID>` | skipped | `ID` only |
//!
//! ```bash
//! RUST_LOG=debug ilostat --ingest-only
//! ilostat --transform-only --dataflow DF_UNE_DEAP_SEX_AGE_RT --pretty
//! ```

use clap::Parser;
use ilostat_core::RunPlan;

/// Batch connector for the ILO SDMX statistics API.
///
/// Fetches the dataflow catalogue and each dataflow's data into a local raw
/// cache, then normalizes and publishes every cached dataflow into a local
/// `DuckDB` warehouse. Connector state lives under `ILOSTAT_HOME`.
#[derive(Debug, Parser)]
#[command(name = "ilostat", author, version, about = "ILO SDMX batch connector")]
pub struct Cli {
    /// Only fetch and cache raw data.
    #[arg(long, conflicts_with_all = ["transform_only", "dataflow"])]
    pub ingest_only: bool,

    /// Only transform data that is already cached.
    #[arg(long)]
    pub transform_only: bool,

    /// Transform a single dataflow; its failure fails the run.
    #[arg(long, value_name = "ID")]
    pub dataflow: Option<String>,

    /// Pretty-print the JSON run summary.
    #[arg(long, default_value_t = false)]
    pub pretty: bool,
}

impl Cli {
    pub fn plan(&self) -> RunPlan {
        RunPlan::from_flags(self.ingest_only, self.transform_only, self.dataflow.clone())
    }
}
