//! ifc-reconcile
//!
//! Reconciliation core for declared platform resources.
//!
//! Architectural decisions:
//! - Names resolve to backend ids strictly; ids resolve back to names leniently
//! - A catalog snapshot is built per resolution call and never cached
//! - Structured values are compared only in canonical form
//! - List-valued settings keep the order they were last recorded in
//! - Label mutation sequences are serialized process-wide
//!
//! Deterministic, pure logic. No IO. No platform calls.

mod align;
mod canonical;
mod catalog;
mod error;
mod gate;
mod labels;
mod resolver;
mod schema;
mod settings;

pub use align::align;
pub use canonical::{canonical_value, canonicalize, is_empty_rules, EMPTY_RULES};
pub use catalog::{CatalogSnapshot, Entity};
pub use error::ReconcileError;
pub use gate::{LabelMutationGate, LabelMutationGuard};
pub use labels::{
    api_field_for, label_type_for, labels_from_remote, removed_label_types, same_labels,
    tracked_labels_from_remote, validate_labels, LabelSetting, LABEL_FALLBACK_ORDER,
};
pub use resolver::{check_names, find_entity, resolve_ids_to_names, resolve_names_to_ids};
pub use schema::{JWT_SCHEMA, PROJECT_SCHEMA};
pub use settings::{
    merge, merge_views, FieldKind, FieldSpec, ReconciliationOutcome, SettingValue, SettingsSchema,
    SettingsView,
};
