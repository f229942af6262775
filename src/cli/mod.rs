//! Command line support for the `scd-merge` binary

pub mod commands;
pub mod error;
