//! CLI command implementations

pub mod history;
pub mod merge;
pub mod validate;

use crate::cli::error::CliError;
use crate::config::MergeConfig;
use crate::models::{ColumnPolicy, Table};
use std::path::{Path, PathBuf};

/// Read a whole file, tagging failures with the path
pub(crate) fn read_file(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path)
        .map_err(|e| CliError::FileReadError(path.to_path_buf(), e.to_string()))
}

/// Load a table from a JSON array of records
pub(crate) fn load_table(path: &Path) -> Result<Table, CliError> {
    let content = read_file(path)?;
    Table::from_json_records(&content)
        .map_err(|e| CliError::InvalidInput(path.to_path_buf(), e.to_string()))
}

/// Resolve the merge configuration.
///
/// An explicit `--config` file wins over `scd-merge.toml` in the current
/// directory; a `--policy` YAML file replaces the configured policy.
pub(crate) fn load_config(
    config: Option<&Path>,
    policy: Option<&Path>,
) -> Result<MergeConfig, CliError> {
    let mut merge_config = match config {
        Some(path) => MergeConfig::load_file(path)?,
        None => MergeConfig::load(Path::new("."))?,
    };
    if let Some(path) = policy {
        let content = read_file(path)?;
        merge_config.policy = ColumnPolicy::from_yaml(&content)
            .map_err(|e| CliError::InvalidInput(path.to_path_buf(), e.to_string()))?;
        // Versioning overrides apply to the replacement policy too.
        merge_config.apply_env_overrides();
    }
    Ok(merge_config)
}

/// Write to a file, or to stdout when no path is given
pub(crate) fn write_output(output: Option<&PathBuf>, content: &str) -> Result<(), CliError> {
    match output {
        Some(path) => std::fs::write(path, content)
            .map_err(|e| CliError::FileWriteError(path.clone(), e.to_string())),
        None => {
            println!("{}", content);
            Ok(())
        }
    }
}
