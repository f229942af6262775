//! Validate command implementation

use super::{load_config, load_table};
use crate::cli::error::CliError;
use crate::validation::PolicyValidator;
use std::path::Path;

/// Handle the validate command.
///
/// Validates the configured policy and, when a source batch is given, checks
/// that every source column is covered by it.
pub fn handle_validate(
    config: Option<&Path>,
    policy: Option<&Path>,
    source: Option<&Path>,
) -> Result<(), CliError> {
    let merge_config = load_config(config, policy)?;
    let validated = PolicyValidator::new().validate(&merge_config.policy)?;

    if let Some(path) = source {
        let table = load_table(path)?;
        validated.check_source(&table)?;
        println!("Source batch {} matches the policy", path.display());
    }

    println!("Policy is valid. Output columns:");
    for column in validated.output_columns() {
        println!("  {}", column);
    }
    Ok(())
}
