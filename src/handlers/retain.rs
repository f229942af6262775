//! Type 0: retain original

use super::{Images, KeyContext, ScdHandler};
use crate::models::{ChangeKind, ScdType, Value};

/// Records the first value seen for a member and never changes it
#[derive(Debug, Clone)]
pub struct RetainOriginal {
    source: String,
    output: String,
}

impl RetainOriginal {
    pub fn new(source: String, output: String) -> Self {
        Self { source, output }
    }
}

impl ScdHandler for RetainOriginal {
    fn scd_type(&self) -> ScdType {
        ScdType::Type0
    }

    fn detect(&self, _ctx: &KeyContext<'_>) -> ChangeKind {
        ChangeKind::None
    }

    fn emit(&self, ctx: &KeyContext<'_>, images: &mut Images) {
        let value = match ctx.reference() {
            Some(row) => row.get(&self.output).clone(),
            None => ctx.incoming(&self.source).cloned().unwrap_or(Value::Null),
        };
        images.key_level.set(self.output.clone(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::Fixture;
    use crate::models::Row;

    fn handler() -> RetainOriginal {
        RetainOriginal::new(
            "credit_score".to_string(),
            "original_credit_score".to_string(),
        )
    }

    #[test]
    fn new_member_records_source_value() {
        let fixture = Fixture::new(Row::new().with("credit_score", 730), None);
        let (change, images) = fixture.run(&handler());
        assert_eq!(change, ChangeKind::None);
        assert_eq!(images.key_level.get("original_credit_score"), &Value::Int(730));
    }

    #[test]
    fn existing_member_keeps_target_value() {
        let fixture = Fixture::new(
            Row::new().with("credit_score", 730),
            Some(Row::new().with("original_credit_score", 630)),
        );
        let (change, images) = fixture.run(&handler());
        assert_eq!(change, ChangeKind::None);
        assert_eq!(images.key_level.get("original_credit_score"), &Value::Int(630));
    }

    #[test]
    fn closed_history_still_wins_over_source() {
        let mut fixture = Fixture::new(Row::new().with("credit_score", 730), None);
        fixture.latest_closed = Some(Row::new().with("original_credit_score", 610));
        let (_, images) = fixture.run(&handler());
        assert_eq!(images.key_level.get("original_credit_score"), &Value::Int(610));
    }
}
