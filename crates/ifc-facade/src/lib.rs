//! ifc-facade
//!
//! Resource lifecycles (create / read / update / delete / import) and the
//! read-only data sources, wired from the reconciliation core and the
//! platform client.
//!
//! Architectural decisions:
//! - Every operation is call-and-return; nothing is cached between calls
//! - Once a write has succeeded, read-back failures degrade to a warning and
//!   the declared values are recorded
//! - Label writes for one resource run as a single gated sequence
//! - Failures carry an [`ErrorKind`]; messages name the offending field,
//!   entity, or HTTP status

mod error;
mod jwt;
mod lifecycle;
mod log_labels;
mod platform;
mod project;
mod resource;
mod servicenow;

pub use error::{Error, ErrorKind};
pub use jwt::{JwtDecl, JwtRecord, JwtResource, DEFAULT_JWT_TYPE, MIN_SECRET_LEN};
pub use lifecycle::{DeclaredResource, RecordedResource, ResourceKind};
pub use log_labels::{LogLabelsDecl, LogLabelsRecord, LogLabelsResource};
pub use platform::{Platform, ProjectSummary, SystemSummary};
pub use project::{ProjectDecl, ProjectRecord, ProjectResource};
pub use resource::ManagedResource;
pub use servicenow::{
    parse_key as parse_servicenow_key, ServiceNowDecl, ServiceNowRecord, ServiceNowResource,
    DEFAULT_DAMPENING_PERIOD,
};

pub use ifc_reconcile::LabelSetting;
