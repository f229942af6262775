//! Type 7: dual type 1 and type 2 access
//!
//! Row handling is identical to type 2. The extra contract is on the table as
//! a whole: every row carries a non-null durable key and surrogate key, so a
//! fact table can join either through the durable key (current view) or the
//! surrogate key (historical view). The orchestrator enforces that whenever a
//! policy contains a type 7 rule.

use super::{AddRow, Images, KeyContext, ScdHandler};
use crate::models::{ChangeKind, ScdType};

#[derive(Debug, Clone)]
pub struct DualKeys {
    versioned: AddRow,
}

impl DualKeys {
    pub fn new(source: String, output: String) -> Self {
        Self {
            versioned: AddRow::new(source, output),
        }
    }
}

impl ScdHandler for DualKeys {
    fn scd_type(&self) -> ScdType {
        ScdType::Type7
    }

    fn detect(&self, ctx: &KeyContext<'_>) -> ChangeKind {
        self.versioned.detect_version(ctx)
    }

    fn emit(&self, ctx: &KeyContext<'_>, images: &mut Images) {
        self.versioned.emit_version(ctx, images);
    }
}
