use ifc_client::Transport;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::jwt::{self, JwtDecl, JwtRecord};
use crate::log_labels::{self, LogLabelsDecl, LogLabelsRecord};
use crate::platform::Platform;
use crate::project::{self, ProjectDecl, ProjectRecord};
use crate::resource::ManagedResource;
use crate::servicenow::{self, ServiceNowDecl, ServiceNowRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Project,
    LogLabels,
    Jwt,
    #[serde(rename = "servicenow")]
    ServiceNow,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Project,
        ResourceKind::LogLabels,
        ResourceKind::Jwt,
        ResourceKind::ServiceNow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Project => "project",
            ResourceKind::LogLabels => "log_labels",
            ResourceKind::Jwt => "jwt",
            ResourceKind::ServiceNow => "servicenow",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| {
                Error::invalid_input(format!(
                    "unknown resource kind '{s}' (expected project, log_labels, jwt or servicenow)"
                ))
            })
    }
}

/// A declared resource of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum DeclaredResource {
    Project(ProjectDecl),
    LogLabels(LogLabelsDecl),
    Jwt(JwtDecl),
    ServiceNow(ServiceNowDecl),
}

impl DeclaredResource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            DeclaredResource::Project(_) => ResourceKind::Project,
            DeclaredResource::LogLabels(_) => ResourceKind::LogLabels,
            DeclaredResource::Jwt(_) => ResourceKind::Jwt,
            DeclaredResource::ServiceNow(_) => ResourceKind::ServiceNow,
        }
    }

    /// Same key the matching record reports.
    pub fn key(&self) -> String {
        match self {
            DeclaredResource::Project(d) => d.name.clone(),
            DeclaredResource::LogLabels(d) => d.project_name.clone(),
            DeclaredResource::Jwt(d) => d.system_name.clone(),
            DeclaredResource::ServiceNow(d) => {
                format!("{}@{}", d.account.trim(), d.service_host.trim())
            }
        }
    }

    /// True when `recorded` already holds everything declared, so an update
    /// would write nothing new. A kind mismatch is never in sync.
    pub fn in_sync(&self, recorded: &RecordedResource) -> bool {
        use DeclaredResource as D;
        use RecordedResource as R;
        match (self, recorded) {
            (D::Project(d), R::Project(r)) => project::in_sync(d, r),
            (D::LogLabels(d), R::LogLabels(r)) => log_labels::in_sync(d, r),
            (D::Jwt(d), R::Jwt(r)) => jwt::in_sync(d, r),
            (D::ServiceNow(d), R::ServiceNow(r)) => servicenow::in_sync(d, r),
            _ => false,
        }
    }
}

/// A recorded resource of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedResource {
    Project(ProjectRecord),
    LogLabels(LogLabelsRecord),
    Jwt(JwtRecord),
    ServiceNow(ServiceNowRecord),
}

impl RecordedResource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            RecordedResource::Project(_) => ResourceKind::Project,
            RecordedResource::LogLabels(_) => ResourceKind::LogLabels,
            RecordedResource::Jwt(_) => ResourceKind::Jwt,
            RecordedResource::ServiceNow(_) => ResourceKind::ServiceNow,
        }
    }

    pub fn key(&self) -> String {
        match self {
            RecordedResource::Project(r) => r.name.clone(),
            RecordedResource::LogLabels(r) => r.project_name.clone(),
            RecordedResource::Jwt(r) => r.system_name.clone(),
            RecordedResource::ServiceNow(r) => r.key(),
        }
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        match self {
            RecordedResource::Project(r) => serde_json::to_value(r),
            RecordedResource::LogLabels(r) => serde_json::to_value(r),
            RecordedResource::Jwt(r) => serde_json::to_value(r),
            RecordedResource::ServiceNow(r) => serde_json::to_value(r),
        }
    }

    pub fn from_value(kind: ResourceKind, value: Value) -> serde_json::Result<Self> {
        Ok(match kind {
            ResourceKind::Project => RecordedResource::Project(serde_json::from_value(value)?),
            ResourceKind::LogLabels => RecordedResource::LogLabels(serde_json::from_value(value)?),
            ResourceKind::Jwt => RecordedResource::Jwt(serde_json::from_value(value)?),
            ResourceKind::ServiceNow => {
                RecordedResource::ServiceNow(serde_json::from_value(value)?)
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

fn create_or_update<R: ManagedResource>(
    resource: R,
    declared: &R::Declared,
    previous: Option<&R::Recorded>,
) -> Result<R::Recorded, Error> {
    match previous {
        Some(p) => resource.update(declared, p),
        None => resource.create(declared),
    }
}

fn kind_mismatch(declared: ResourceKind, recorded: ResourceKind) -> Error {
    Error::invalid_input(format!(
        "declared {declared} does not match recorded {recorded}"
    ))
}

impl<T: Transport> Platform<T> {
    /// Create when there is no previous record, update otherwise.
    pub fn apply(
        &self,
        declared: &DeclaredResource,
        previous: Option<&RecordedResource>,
    ) -> Result<RecordedResource, Error> {
        use DeclaredResource as D;
        use RecordedResource as R;
        match (declared, previous) {
            (D::Project(d), None) => create_or_update(self.projects(), d, None).map(R::Project),
            (D::Project(d), Some(R::Project(p))) => {
                create_or_update(self.projects(), d, Some(p)).map(R::Project)
            }
            (D::LogLabels(d), None) => {
                create_or_update(self.log_labels(), d, None).map(R::LogLabels)
            }
            (D::LogLabels(d), Some(R::LogLabels(p))) => {
                create_or_update(self.log_labels(), d, Some(p)).map(R::LogLabels)
            }
            (D::Jwt(d), None) => create_or_update(self.jwt(), d, None).map(R::Jwt),
            (D::Jwt(d), Some(R::Jwt(p))) => create_or_update(self.jwt(), d, Some(p)).map(R::Jwt),
            (D::ServiceNow(d), None) => {
                create_or_update(self.servicenow(), d, None).map(R::ServiceNow)
            }
            (D::ServiceNow(d), Some(R::ServiceNow(p))) => {
                create_or_update(self.servicenow(), d, Some(p)).map(R::ServiceNow)
            }
            (d, Some(p)) => Err(kind_mismatch(d.kind(), p.kind())),
        }
    }

    /// Re-read a recorded resource. `Ok(None)` when it no longer exists.
    pub fn refresh(&self, previous: &RecordedResource) -> Result<Option<RecordedResource>, Error> {
        Ok(match previous {
            RecordedResource::Project(p) => self.projects().read(p)?.map(RecordedResource::Project),
            RecordedResource::LogLabels(p) => {
                self.log_labels().read(p)?.map(RecordedResource::LogLabels)
            }
            RecordedResource::Jwt(p) => self.jwt().read(p)?.map(RecordedResource::Jwt),
            RecordedResource::ServiceNow(p) => {
                self.servicenow().read(p)?.map(RecordedResource::ServiceNow)
            }
        })
    }

    pub fn destroy(&self, previous: &RecordedResource) -> Result<(), Error> {
        match previous {
            RecordedResource::Project(p) => self.projects().delete(p),
            RecordedResource::LogLabels(p) => self.log_labels().delete(p),
            RecordedResource::Jwt(p) => self.jwt().delete(p),
            RecordedResource::ServiceNow(p) => self.servicenow().delete(p),
        }
    }

    pub fn import(
        &self,
        kind: ResourceKind,
        key: &str,
    ) -> Result<Option<RecordedResource>, Error> {
        Ok(match kind {
            ResourceKind::Project => self.projects().import(key)?.map(RecordedResource::Project),
            ResourceKind::LogLabels => {
                self.log_labels().import(key)?.map(RecordedResource::LogLabels)
            }
            ResourceKind::Jwt => self.jwt().import(key)?.map(RecordedResource::Jwt),
            ResourceKind::ServiceNow => {
                self.servicenow().import(key)?.map(RecordedResource::ServiceNow)
            }
        })
    }
}
