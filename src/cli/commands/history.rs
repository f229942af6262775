//! History check command implementation

use super::{load_config, load_table};
use crate::cli::error::CliError;
use crate::validation::check_history;
use std::path::Path;

/// Handle the check-history command.
///
/// Prints every interval violation and fails when any are found.
pub fn handle_check_history(
    input: &Path,
    config: Option<&Path>,
    policy: Option<&Path>,
) -> Result<(), CliError> {
    let merge_config = load_config(config, policy)?;
    let table = load_table(input)?;
    let violations = check_history(
        &table,
        &merge_config.policy.durable_key,
        &merge_config.policy.versioning,
    );

    if violations.is_empty() {
        println!("History of {} rows is consistent", table.len());
        return Ok(());
    }
    for violation in &violations {
        println!("{} {:?}: {}", violation.key, violation.kind, violation.message);
    }
    Err(CliError::HistoryViolations(violations.len()))
}
