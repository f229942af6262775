//! Type 3: add new attribute

use super::{Images, KeyContext, ScdHandler};
use crate::models::{ChangeKind, ScdType, Type3Mode, Value};

/// Keeps a primary column plus an alternate column holding a prior value.
///
/// In [`Type3Mode::Freeze`] the alternate is filled only while it is null, so
/// it keeps the value in place before the first change. In
/// [`Type3Mode::Cascade`] it takes the previous primary on every change.
#[derive(Debug, Clone)]
pub struct AddAttribute {
    source: String,
    primary: String,
    alternate: String,
    mode: Option<Type3Mode>,
}

impl AddAttribute {
    pub fn new(
        source: String,
        primary: String,
        alternate: String,
        mode: Option<Type3Mode>,
    ) -> Self {
        Self {
            source,
            primary,
            alternate,
            mode,
        }
    }

    fn mode(&self, ctx: &KeyContext<'_>) -> Type3Mode {
        self.mode.unwrap_or(ctx.type3_mode)
    }
}

impl ScdHandler for AddAttribute {
    fn scd_type(&self) -> ScdType {
        ScdType::Type3
    }

    fn detect(&self, ctx: &KeyContext<'_>) -> ChangeKind {
        if ctx.differs(&self.source, &self.primary) {
            ChangeKind::InPlace
        } else {
            ChangeKind::None
        }
    }

    fn emit(&self, ctx: &KeyContext<'_>, images: &mut Images) {
        if ctx.reference().is_none() {
            let primary = ctx.incoming(&self.source).cloned().unwrap_or(Value::Null);
            images.key_level.set(self.primary.clone(), primary);
            images.key_level.set(self.alternate.clone(), Value::Null);
            return;
        }

        let previous = ctx.existing(&self.primary);
        let alternate = ctx.existing(&self.alternate);
        let (primary, alternate) = match ctx.incoming(&self.source) {
            Some(new) if !new.same_as(previous) => {
                let shifted = match self.mode(ctx) {
                    Type3Mode::Freeze if !alternate.is_null() => alternate.clone(),
                    Type3Mode::Freeze | Type3Mode::Cascade => previous.clone(),
                };
                (new.clone(), shifted)
            }
            _ => (previous.clone(), alternate.clone()),
        };
        images.key_level.set(self.primary.clone(), primary);
        images.key_level.set(self.alternate.clone(), alternate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::Fixture;
    use crate::models::Row;

    fn handler(mode: Option<Type3Mode>) -> AddAttribute {
        AddAttribute::new(
            "credit_score".to_string(),
            "credit_score".to_string(),
            "credit_score_alternate".to_string(),
            mode,
        )
    }

    fn stored(primary: i64, alternate: Value) -> Row {
        Row::new()
            .with("credit_score", primary)
            .with("credit_score_alternate", alternate)
    }

    #[test]
    fn first_change_moves_previous_into_alternate() {
        let fixture = Fixture::new(
            Row::new().with("credit_score", 730),
            Some(stored(630, Value::Null)),
        );
        let (change, images) = fixture.run(&handler(None));
        assert_eq!(change, ChangeKind::InPlace);
        assert_eq!(images.key_level.get("credit_score"), &Value::Int(730));
        assert_eq!(images.key_level.get("credit_score_alternate"), &Value::Int(630));
    }

    #[test]
    fn freeze_keeps_first_alternate() {
        let fixture = Fixture::new(
            Row::new().with("credit_score", 800),
            Some(stored(730, Value::Int(630))),
        );
        let (_, images) = fixture.run(&handler(None));
        assert_eq!(images.key_level.get("credit_score"), &Value::Int(800));
        assert_eq!(images.key_level.get("credit_score_alternate"), &Value::Int(630));
    }

    #[test]
    fn cascade_shifts_on_every_change() {
        let fixture = Fixture::new(
            Row::new().with("credit_score", 800),
            Some(stored(730, Value::Int(630))),
        );
        let (_, images) = fixture.run(&handler(Some(Type3Mode::Cascade)));
        assert_eq!(images.key_level.get("credit_score_alternate"), &Value::Int(730));
    }

    #[test]
    fn merge_level_mode_applies_without_override() {
        let mut fixture = Fixture::new(
            Row::new().with("credit_score", 800),
            Some(stored(730, Value::Int(630))),
        );
        fixture.type3_mode = Type3Mode::Cascade;
        let (_, images) = fixture.run(&handler(None));
        assert_eq!(images.key_level.get("credit_score_alternate"), &Value::Int(730));
    }

    #[test]
    fn unchanged_keeps_both_columns() {
        let fixture = Fixture::new(
            Row::new().with("credit_score", 730),
            Some(stored(730, Value::Int(630))),
        );
        let (change, images) = fixture.run(&handler(None));
        assert_eq!(change, ChangeKind::None);
        assert_eq!(images.key_level.get("credit_score"), &Value::Int(730));
        assert_eq!(images.key_level.get("credit_score_alternate"), &Value::Int(630));
    }

    #[test]
    fn closed_history_keeps_alternate() {
        let mut fixture = Fixture::new(Row::new().with("customer", "C1"), None);
        fixture.latest_closed = Some(stored(730, Value::Int(630)));
        let (_, images) = fixture.run(&handler(None));
        assert_eq!(images.key_level.get("credit_score"), &Value::Int(730));
        assert_eq!(images.key_level.get("credit_score_alternate"), &Value::Int(630));
    }

    #[test]
    fn new_member_has_null_alternate() {
        let fixture = Fixture::new(Row::new().with("credit_score", 480), None);
        let (_, images) = fixture.run(&handler(None));
        assert_eq!(images.key_level.get("credit_score"), &Value::Int(480));
        assert!(images.key_level.contains("credit_score_alternate"));
        assert!(images.key_level.get("credit_score_alternate").is_null());
    }
}
