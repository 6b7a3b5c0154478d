mod drift;

pub use crate::index::{index_name, parse_index_name, Direction, IndexKey};
pub use drift::{detect_drift, enforce, DriftError, DriftPolicy, EnforceOptions, DRIFT_SAMPLE_SIZE};

use crate::context::Context;
use crate::error::{DocSchemaError, Result, StoreError};
use crate::index::{IndexSpec, PRIMARY_INDEX};
use crate::registry::Registry;
use crate::schema::Schema;
use crate::store::DocumentStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    CreateIndex,
    DropIndex,
    FieldDrift,
}

impl ActionKind {
    fn marker(&self) -> char {
        match self {
            ActionKind::CreateIndex => '+',
            ActionKind::DropIndex => '-',
            ActionKind::FieldDrift => '!',
        }
    }
}

/// One step of a plan. `target` is an index name, or a field name for drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationAction {
    pub kind: ActionKind,
    pub collection: String,
    pub target: String,
    pub description: String,
}

/// Ordered actions; each schema's actions are contiguous.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationPlan {
    pub actions: Vec<MigrationAction>,
}

impl MigrationPlan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn of_kind(&self, kind: ActionKind) -> impl Iterator<Item = &MigrationAction> {
        self.actions.iter().filter(move |a| a.kind == kind)
    }

    /// True when the plan would create or drop an index.
    pub fn has_index_changes(&self) -> bool {
        self.actions.iter().any(|a| a.kind != ActionKind::FieldDrift)
    }
}

impl fmt::Display for MigrationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.actions.is_empty() {
            return writeln!(f, "No changes.");
        }

        let mut collections: Vec<&str> = Vec::new();
        for action in &self.actions {
            if !collections.contains(&action.collection.as_str()) {
                collections.push(&action.collection);
            }
        }
        for collection in collections {
            writeln!(f, "{collection}:")?;
            for action in self.actions.iter().filter(|a| a.collection == collection) {
                writeln!(f, "  {} {}", action.kind.marker(), action.description)?;
            }
        }

        let creates = self.of_kind(ActionKind::CreateIndex).count();
        let drops = self.of_kind(ActionKind::DropIndex).count();
        let drifts = self.of_kind(ActionKind::FieldDrift).count();
        writeln!(
            f,
            "{} actions: {creates} to create, {drops} to drop, {drifts} drift warnings",
            self.actions.len()
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrateOptions {
    /// Plan only; issue no create or drop calls.
    #[serde(default)]
    pub dry_run: bool,
    /// Drop indexes the schemas no longer declare.
    #[serde(default)]
    pub drop_extras: bool,
}

#[derive(Debug, Default)]
pub struct MigrationResult {
    pub executed: usize,
    pub skipped: usize,
    pub warnings: Vec<String>,
    /// One entry per failed action.
    pub errors: Vec<DocSchemaError>,
}

impl MigrationResult {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Index names a schema expects, in declaration order, without `_id_`.
///
/// Only top-level fields count. A flagged object or array field gets an index
/// on the whole value; `unique`/`index` on a nested sub-field is not
/// reconciled.
pub fn expected_indexes(schema: &Schema) -> Vec<String> {
    let singles = schema
        .fields
        .iter()
        .filter(|f| f.is_indexed())
        .map(|f| format!("{}_1", f.wire_name));
    let compounds = schema.compound_indexes.iter().map(|c| c.name());

    let mut seen = HashSet::new();
    singles
        .chain(compounds)
        .filter(|name| name != PRIMARY_INDEX && seen.insert(name.clone()))
        .collect()
}

/// Diff each schema's expected indexes against the live catalog, then look
/// for drift. Only read calls are issued.
pub fn plan_migration(
    store: &dyn DocumentStore,
    ctx: &Context,
    schemas: &[Arc<Schema>],
) -> Result<MigrationPlan> {
    let mut plan = MigrationPlan::default();

    for schema in schemas {
        let collection = &schema.collection;
        let existing: Vec<String> = store
            .list_indexes(ctx, collection)
            .map_err(|e| {
                DocSchemaError::store(format!("migration: failed to list indexes on {collection}"), e)
            })?
            .into_iter()
            .map(|i| i.name)
            .filter(|name| name != PRIMARY_INDEX)
            .collect();
        let expected = expected_indexes(schema);

        for name in expected.iter().filter(|n| !existing.contains(n)) {
            plan.actions.push(MigrationAction {
                kind: ActionKind::CreateIndex,
                collection: collection.clone(),
                target: name.clone(),
                description: format!("Create index: {name}"),
            });
        }
        for name in existing.iter().filter(|n| !expected.contains(n)) {
            plan.actions.push(MigrationAction {
                kind: ActionKind::DropIndex,
                collection: collection.clone(),
                target: name.clone(),
                description: format!("Drop index: {name} (not in schema)"),
            });
        }
        for drift in detect_drift(store, ctx, schema, DRIFT_SAMPLE_SIZE)? {
            plan.actions.push(MigrationAction {
                kind: ActionKind::FieldDrift,
                collection: collection.clone(),
                description: format!("Extra field: {}", drift.field),
                target: drift.field,
            });
        }
    }

    log::debug!("Planned {} migration actions over {} schemas", plan.actions.len(), schemas.len());
    Ok(plan)
}

/// Whether a registered schema for `collection` declares `index` as unique.
fn is_unique_index(registry: &Registry, collection: &str, index: &str) -> bool {
    registry.for_collection(collection).iter().any(|schema| {
        schema
            .fields
            .iter()
            .any(|f| f.unique && format!("{}_1", f.wire_name) == index)
            || schema
                .compound_indexes
                .iter()
                .any(|c| c.unique && c.name() == index)
    })
}

/// Apply a plan action by action.
///
/// A failing action is recorded and the rest still run. Drops only happen
/// with `drop_extras`. Cancellation stops the run: the in-flight action
/// records the error and everything after it counts as skipped.
///
/// Whether a created index is unique comes from `registry`, looking only at
/// schemas stored in the action's collection.
pub fn execute_migration(
    store: &dyn DocumentStore,
    ctx: &Context,
    registry: &Registry,
    plan: &MigrationPlan,
    options: &MigrateOptions,
) -> MigrationResult {
    let mut result = MigrationResult::default();

    if options.dry_run {
        result.skipped = plan.actions.len();
        result.warnings.push("Dry run: no changes applied".to_string());
        return result;
    }

    for (i, action) in plan.actions.iter().enumerate() {
        let outcome = match action.kind {
            ActionKind::CreateIndex => {
                let keys = parse_index_name(&action.target);
                if keys.is_empty() {
                    Err(StoreError::Invalid(format!(
                        "cannot derive index keys from name {}",
                        action.target
                    )))
                } else {
                    let spec = IndexSpec {
                        keys,
                        unique: is_unique_index(registry, &action.collection, &action.target),
                    };
                    store.create_index(ctx, &action.collection, &spec).map(|_| ())
                }
            }
            ActionKind::DropIndex => {
                if !options.drop_extras {
                    result.skipped += 1;
                    result.warnings.push(format!(
                        "Skipped drop: {} on {} (enable drop_extras to drop)",
                        action.target, action.collection
                    ));
                    continue;
                }
                store.drop_index(ctx, &action.collection, &action.target)
            }
            ActionKind::FieldDrift => {
                result
                    .warnings
                    .push(format!("{}: {}", action.collection, action.description));
                continue;
            }
        };

        match outcome {
            Ok(()) => {
                log::info!("{} on {}", action.description, action.collection);
                result.executed += 1;
            }
            Err(e) => {
                let cancelled = e.is_cancellation();
                let err = DocSchemaError::store(action.description.clone(), e);
                log::warn!("Migration action failed on {}: {err}", action.collection);
                result.errors.push(err);
                if cancelled {
                    result.skipped += plan.actions.len() - i - 1;
                    break;
                }
            }
        }
    }

    result
}

/// Plan over every registered schema, then execute.
pub fn migrate(
    store: &dyn DocumentStore,
    ctx: &Context,
    registry: &Registry,
    options: &MigrateOptions,
) -> Result<MigrationResult> {
    let plan = plan_migration(store, ctx, &registry.get_all())?;
    Ok(execute_migration(store, ctx, registry, &plan, options))
}
