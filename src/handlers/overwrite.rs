//! Type 1: overwrite

use super::{Images, KeyContext, ScdHandler};
use crate::models::{ChangeKind, ScdType};

/// Replaces the stored value with the latest source value; no history
#[derive(Debug, Clone)]
pub struct Overwrite {
    source: String,
    output: String,
}

impl Overwrite {
    pub fn new(source: String, output: String) -> Self {
        Self { source, output }
    }
}

impl ScdHandler for Overwrite {
    fn scd_type(&self) -> ScdType {
        ScdType::Type1
    }

    fn detect(&self, ctx: &KeyContext<'_>) -> ChangeKind {
        if ctx.differs(&self.source, &self.output) {
            ChangeKind::InPlace
        } else {
            ChangeKind::None
        }
    }

    fn emit(&self, ctx: &KeyContext<'_>, images: &mut Images) {
        images.key_level.set(
            self.output.clone(),
            ctx.incoming_or_existing(&self.source, &self.output),
        );
    }
}
