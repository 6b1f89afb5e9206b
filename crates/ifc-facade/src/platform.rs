use ifc_client::{PlatformApi, Transport};
use ifc_reconcile::{CatalogSnapshot, LabelMutationGate, LabelSetting};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Error;
use crate::jwt::JwtResource;
use crate::log_labels::LogLabelsResource;
use crate::project::ProjectResource;
use crate::servicenow::ServiceNowResource;

/// Entry point for every resource operation against one platform account.
///
/// Holds no cached platform state: each operation fetches what it needs.
#[derive(Debug)]
pub struct Platform<T> {
    api: PlatformApi<T>,
    gate: &'static LabelMutationGate,
}

/// One system as listed by [`Platform::list_systems`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemSummary {
    pub id: String,
    pub name: String,
    pub display_name: String,
}

/// Read-only project view returned by [`Platform::lookup_project`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectSummary {
    pub name: String,
    pub display_name: Option<String>,
    pub c_value: Option<i64>,
    pub p_value: Option<f64>,
}

impl<T: Transport> Platform<T> {
    /// Uses the process-wide label gate.
    pub fn new(api: PlatformApi<T>) -> Self {
        Self {
            api,
            gate: LabelMutationGate::global(),
        }
    }

    /// Replace the label gate. Tests use a private gate per case.
    pub fn with_gate(mut self, gate: &'static LabelMutationGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn api(&self) -> &PlatformApi<T> {
        &self.api
    }

    pub fn projects(&self) -> ProjectResource<'_, T> {
        ProjectResource::new(self)
    }

    pub fn log_labels(&self) -> LogLabelsResource<'_, T> {
        LogLabelsResource::new(self)
    }

    pub fn jwt(&self) -> JwtResource<'_, T> {
        JwtResource::new(self)
    }

    pub fn servicenow(&self) -> ServiceNowResource<'_, T> {
        ServiceNowResource::new(self)
    }

    // --- catalog -----------------------------------------------------------

    /// Fresh system catalog. A platform that reports nothing gives an empty
    /// snapshot.
    pub fn catalog(&self) -> Result<CatalogSnapshot, Error> {
        let snapshot = match self.api.get_system_framework()? {
            Some(fw) => CatalogSnapshot::from_system_arrays(&fw.own, &fw.shared),
            None => CatalogSnapshot::empty(),
        };
        if snapshot.skipped() > 0 {
            warn!(skipped = snapshot.skipped(), "catalog entries without a usable id were skipped");
        }
        debug!(systems = snapshot.len(), "catalog fetched");
        Ok(snapshot)
    }

    // --- data sources ------------------------------------------------------

    /// Every system visible to the account, in catalog order.
    pub fn list_systems(&self) -> Result<Vec<SystemSummary>, Error> {
        Ok(self
            .catalog()?
            .entities()
            .iter()
            .map(|e| SystemSummary {
                id: e.id.clone(),
                name: e.name.clone(),
                display_name: e.display().to_string(),
            })
            .collect())
    }

    /// Look up one project by name. A project that does not exist is an error.
    pub fn lookup_project(&self, name: &str) -> Result<ProjectSummary, Error> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::invalid_input("project name cannot be empty"));
        }
        let Some(settings) = self.api.get_project_settings(name)? else {
            return Err(Error::missing("project", name));
        };

        let display_name = settings
            .get("projectDisplayName")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Ok(ProjectSummary {
            name: name.to_string(),
            display_name,
            c_value: settings
                .get("cValue")
                .and_then(|v| v.as_f64())
                .map(|f| f.trunc() as i64),
            p_value: settings.get("pValue").and_then(|v| v.as_f64()),
        })
    }

    // --- labels ------------------------------------------------------------

    /// Write `labels` then clear `cleared`, as one gated sequence.
    ///
    /// Clears tolerate absent and unsupported answers. The first failing
    /// write ends the sequence and releases the gate.
    pub(crate) fn mutate_labels(
        &self,
        project: &str,
        labels: &[LabelSetting],
        cleared: &[String],
    ) -> Result<(), Error> {
        let _guard = self.gate.acquire();
        for l in labels {
            debug!(project, label_type = %l.label_type, "writing label rules");
            self.api.put_log_label(project, &l.label_type, &l.rules)?;
        }
        for label_type in cleared {
            debug!(project, label_type = %label_type, "clearing label rules");
            self.api.clear_log_label(project, label_type)?;
        }
        Ok(())
    }
}
