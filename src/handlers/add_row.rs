//! Type 2: add new row
//!
//! The handler only decides that a new version is needed and supplies the
//! attribute value for it. Closing the current row, opening the new one and
//! allocating its surrogate key is done by the orchestrator, which has the
//! whole key history in hand.

use super::{Images, KeyContext, ScdHandler};
use crate::models::{ChangeKind, ScdType};

#[derive(Debug, Clone)]
pub struct AddRow {
    source: String,
    output: String,
}

impl AddRow {
    pub fn new(source: String, output: String) -> Self {
        Self { source, output }
    }

    pub(crate) fn detect_version(&self, ctx: &KeyContext<'_>) -> ChangeKind {
        if ctx.differs(&self.source, &self.output) {
            ChangeKind::NewVersion
        } else {
            ChangeKind::None
        }
    }

    pub(crate) fn emit_version(&self, ctx: &KeyContext<'_>, images: &mut Images) {
        images.version_level.set(
            self.output.clone(),
            ctx.incoming_or_existing(&self.source, &self.output),
        );
    }
}

impl ScdHandler for AddRow {
    fn scd_type(&self) -> ScdType {
        ScdType::Type2
    }

    fn detect(&self, ctx: &KeyContext<'_>) -> ChangeKind {
        self.detect_version(ctx)
    }

    fn emit(&self, ctx: &KeyContext<'_>, images: &mut Images) {
        self.emit_version(ctx, images);
    }
}
