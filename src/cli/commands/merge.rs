//! Merge command implementation

use super::{load_config, load_table, write_output};
use crate::cli::error::CliError;
use crate::models::Table;
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::info;

/// Arguments for the merge command
#[derive(Debug, Clone)]
pub struct MergeArgs {
    /// Source batch (JSON array of records)
    pub source: PathBuf,
    /// Current dimension snapshot; an absent target means an empty dimension
    pub target: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub policy: Option<PathBuf>,
    /// Merge date (`YYYY-MM-DD`)
    pub as_of: String,
    /// Output path for the merged snapshot; stdout when omitted
    pub output: Option<PathBuf>,
    /// Optional path for the JSON merge report
    pub report: Option<PathBuf>,
}

/// Handle the merge command
pub fn handle_merge(args: &MergeArgs) -> Result<(), CliError> {
    let merge_timestamp = NaiveDate::parse_from_str(&args.as_of, "%Y-%m-%d").map_err(|e| {
        CliError::InvalidArgument(format!("--as-of '{}' is not a date: {}", args.as_of, e))
    })?;
    let config = load_config(args.config.as_deref(), args.policy.as_deref())?;
    let merger = config.merger()?;

    let source = load_table(&args.source)?;
    let target = match &args.target {
        Some(path) => load_table(path)?,
        None => Table::default(),
    };

    let snapshot = merger.merge(&source, &target, merge_timestamp)?;
    info!(
        "Merged snapshot has {} rows ({} versions opened, {} closed)",
        snapshot.report.rows_out, snapshot.report.versions_opened, snapshot.report.versions_closed
    );

    if let Some(path) = &args.report {
        let report = serde_json::to_string_pretty(&snapshot.report)
            .map_err(|e| CliError::SerializationError(format!("Failed to encode report: {}", e)))?;
        write_output(Some(path), &report)?;
    }

    let records = snapshot
        .table
        .to_json_records()
        .map_err(|e| CliError::SerializationError(format!("Failed to encode snapshot: {}", e)))?;
    write_output(args.output.as_ref(), &records)
}
