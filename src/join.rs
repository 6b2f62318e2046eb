//! Join generation for associations.
//!
//! Whether a join gets the exclusion predicate depends only on whether the
//! model at the far end of it (the target of a direct association, the join
//! model of a through association) is deletion capable. Neither the model
//! being queried nor a `with_deleted` scope on the far end changes that.

use std::sync::Arc;

use rusqlite::types::Value;

use crate::error::Result;
use crate::model::{Association, AssociationKind, Model, Registry};
use crate::predicate::{qualified, quote, Conditions, ExclusionPredicate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Drops base rows without a live partner (`FindOptions::joins`).
    Inner,
    /// Keeps base rows, leaving the partner empty (`FindOptions::includes`).
    LeftOuter,
}
impl JoinKind {
    fn keyword(&self) -> &'static str {
        match self {
            Self::Inner => "inner join",
            Self::LeftOuter => "left outer join",
        }
    }
}

/// One association joined into a query, with its table aliases resolved.
#[derive(Debug, Clone)]
pub struct JoinAssociation {
    kind: JoinKind,
    association: Association,
    source: Arc<Model>,
    source_alias: String,
    target: Arc<Model>,
    alias: String,
    through: Option<(Arc<Model>, String)>,
    augment_target: bool,
    augment_through: bool,
}

impl JoinAssociation {
    /// Resolves `association` on `source`. `counter` numbers the aliases
    /// handed out in one statement so the same table can be joined twice.
    pub fn new(
        registry: &Registry,
        source: &Arc<Model>,
        association: &str,
        kind: JoinKind,
        counter: &mut usize,
    ) -> Result<Self> {
        let association = source.association(association)?.clone();
        let target = registry.model(association.target())?;
        let through = match association.through() {
            Some(through) => {
                let through = registry.model(through)?;
                *counter += 1;
                let alias = format!("{}_{}", through.table(), counter);
                Some((through, alias))
            }
            None => None,
        };
        *counter += 1;
        let alias = format!("{}_{}", target.table(), counter);
        let augment_target = target.is_deletion_capable();
        let augment_through = through
            .as_ref()
            .map(|(model, _)| model.is_deletion_capable())
            .unwrap_or(false);
        Ok(Self {
            kind,
            association,
            source: Arc::clone(source),
            source_alias: source.table().to_string(),
            target,
            alias,
            through,
            augment_target,
            augment_through,
        })
    }
    pub fn association(&self) -> &Association {
        &self.association
    }
    pub fn target(&self) -> &Arc<Model> {
        &self.target
    }
    /// Alias of the target table in the generated SQL.
    pub fn alias(&self) -> &str {
        &self.alias
    }
    /// The complete join clause(s), exclusion predicates included.
    pub fn association_join(&self) -> String {
        let keyword = self.kind.keyword();
        let source_pk = qualified(&self.source_alias, self.source.primary_key());
        let target_pk = qualified(&self.alias, self.target.primary_key());
        match (self.association.kind(), &self.through) {
            (AssociationKind::BelongsTo { foreign_key }, _) => {
                let mut join = format!(
                    "{keyword} {} as {} on {target_pk} = {}",
                    quote(self.target.table()),
                    quote(&self.alias),
                    qualified(&self.source_alias, foreign_key),
                );
                self.append_not_deleted(&mut join, self.augment_target, &self.alias);
                join
            }
            (AssociationKind::HasMany { foreign_key }, _) => {
                let mut join = format!(
                    "{keyword} {} as {} on {} = {source_pk}",
                    quote(self.target.table()),
                    quote(&self.alias),
                    qualified(&self.alias, foreign_key),
                );
                self.append_not_deleted(&mut join, self.augment_target, &self.alias);
                join
            }
            (AssociationKind::HasManyThrough { source_key, target_key, .. }, Some((through, through_alias))) => {
                let mut join = format!(
                    "{keyword} {} as {} on {} = {source_pk}",
                    quote(through.table()),
                    quote(through_alias),
                    qualified(through_alias, source_key),
                );
                self.append_not_deleted(&mut join, self.augment_through, through_alias);
                join.push_str(&format!(
                    " {keyword} {} as {} on {target_pk} = {}",
                    quote(self.target.table()),
                    quote(&self.alias),
                    qualified(through_alias, target_key),
                ));
                self.append_not_deleted(&mut join, self.augment_target, &self.alias);
                join
            }
            // a through association always resolves its join model in new()
            (AssociationKind::HasManyThrough { .. }, None) => String::new(),
        }
    }

    fn append_not_deleted(&self, join: &mut String, augment: bool, alias: &str) {
        if augment {
            join.push_str(" and ");
            join.push_str(&ExclusionPredicate::new(alias).to_sql());
        }
    }
}

/// Join and conditions used to read the targets of a has-many-through
/// association owned by the record `owner_id`. The through table is used
/// unaliased, and gets the exclusion predicate when it is deletion capable.
pub fn through_scope(
    registry: &Registry,
    association: &Association,
    owner_id: i64,
) -> Result<(String, Conditions)> {
    let AssociationKind::HasManyThrough { through, source_key, target_key } = association.kind() else {
        return Ok((String::new(), Conditions::new()));
    };
    let through = registry.model(through)?;
    let target = registry.model(association.target())?;
    let through_table = through.table();
    let join = format!(
        "inner join {} on {} = {}",
        quote(through_table),
        qualified(through_table, target_key),
        qualified(target.table(), target.primary_key()),
    );
    let mut conditions = Conditions::raw(
        format!("{} = ?", qualified(through_table, source_key)),
        [Value::Integer(owner_id)],
    );
    if through.is_deletion_capable() {
        conditions = conditions.and(Conditions::raw(
            ExclusionPredicate::new(through_table).to_sql(),
            Vec::<Value>::new(),
        ));
    }
    Ok((join, conditions))
}
