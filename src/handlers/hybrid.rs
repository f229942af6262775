//! Type 6: type 1 attributes embedded in a type 2 dimension
//!
//! The historical column versions rows exactly like type 2. The shadow
//! current column is key-level: the orchestrator writes it onto every row of
//! the durable key, past and new, so each row reports today's value next to
//! the value that was in effect during its own interval.

use super::{Images, KeyContext, ScdHandler};
use crate::models::{ChangeKind, ScdType};

#[derive(Debug, Clone)]
pub struct Hybrid {
    source: String,
    historical: String,
    current: String,
}

impl Hybrid {
    pub fn new(source: String, historical: String, current: String) -> Self {
        Self {
            source,
            historical,
            current,
        }
    }
}

impl ScdHandler for Hybrid {
    fn scd_type(&self) -> ScdType {
        ScdType::Type6
    }

    fn detect(&self, ctx: &KeyContext<'_>) -> ChangeKind {
        if ctx.differs(&self.source, &self.historical) {
            ChangeKind::NewVersion
        } else if ctx.differs(&self.source, &self.current) {
            // Shadow drifted from the current version; repair without a new row.
            ChangeKind::InPlace
        } else {
            ChangeKind::None
        }
    }

    fn emit(&self, ctx: &KeyContext<'_>, images: &mut Images) {
        images.version_level.set(
            self.historical.clone(),
            ctx.incoming_or_existing(&self.source, &self.historical),
        );
        images.key_level.set(
            self.current.clone(),
            ctx.incoming_or_existing(&self.source, &self.current),
        );
    }
}
