//! Project resource: entity creation, the settings document, and optionally
//! the project's log labels.

use ifc_client::{NewProject, Transport};
use ifc_reconcile::{
    labels_from_remote, merge, removed_label_types, resolve_names_to_ids, same_labels,
    validate_labels, LabelSetting, SettingsView, PROJECT_SCHEMA,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::Error;
use crate::platform::Platform;
use crate::resource::ManagedResource;

const RESOURCE: &str = "project";

/// Declared project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectDecl {
    pub name: String,
    /// Operator-facing system name; resolved to an id at create.
    pub system_name: String,
    pub data_type: String,
    pub instance_type: String,
    pub cloud_type: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub insight_agent_type: Option<String>,
    #[serde(default)]
    pub creation_type: Option<String>,
    /// Settings keyed by platform field name.
    #[serde(default)]
    pub settings: Map<String, Value>,
    /// `None` leaves the project's labels unmanaged.
    #[serde(default)]
    pub labels: Option<Vec<LabelSetting>>,
}

/// Persisted project state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub name: String,
    pub system_name: String,
    pub system_id: String,
    pub data_type: String,
    pub instance_type: String,
    pub cloud_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insight_agent_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_type: Option<String>,
    /// Every schema field the platform reported, overlaid with declared values.
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<LabelSetting>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Create,
    Update,
}

pub struct ProjectResource<'a, T> {
    platform: &'a Platform<T>,
}

impl<'a, T: Transport> ProjectResource<'a, T> {
    pub(crate) fn new(platform: &'a Platform<T>) -> Self {
        Self { platform }
    }

    /// Push declared settings and labels onto an existing project, then read
    /// the settings back. `remote` is the project's current settings.
    ///
    /// On `Stage::Create` the project already exists remotely, so a failed
    /// settings write is logged and the declared values are recorded.
    fn apply(
        &self,
        decl: &ProjectDecl,
        remote: &Map<String, Value>,
        previous_labels: Option<&[LabelSetting]>,
        stage: Stage,
    ) -> Result<Map<String, Value>, Error> {
        let api = self.platform.api();
        let declared = declared_settings(decl);
        let outcome = merge(&PROJECT_SCHEMA, remote, &declared)?;

        match api.update_project_settings(&decl.name, &outcome.outbound.to_wire()) {
            Ok(()) => {}
            Err(e) if stage == Stage::Create => {
                warn!(project = %decl.name, error = %e, "initial settings apply failed; project created without them");
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(labels) = &decl.labels {
            let writes: Vec<LabelSetting> = labels.iter().map(LabelSetting::canonical).collect();
            let cleared = previous_labels
                .map(|prev| removed_label_types(prev, labels))
                .unwrap_or_default();
            self.platform.mutate_labels(&decl.name, &writes, &cleared)?;
        }

        // The write is done; a failed read-back only costs freshness.
        match api.get_project_settings(&decl.name) {
            Ok(Some(fresh)) => Ok(merge(&PROJECT_SCHEMA, &fresh, &declared)?.recorded.to_record()),
            Ok(None) => {
                warn!(project = %decl.name, "project missing on read-back; recording declared settings");
                Ok(outcome.recorded.to_record())
            }
            Err(e) => {
                warn!(project = %decl.name, error = %e, "read-back failed; recording declared settings");
                Ok(outcome.recorded.to_record())
            }
        }
    }
}

impl<T: Transport> ManagedResource for ProjectResource<'_, T> {
    type Declared = ProjectDecl;
    type Recorded = ProjectRecord;

    fn key(recorded: &ProjectRecord) -> String {
        recorded.name.clone()
    }

    fn create(&self, decl: &ProjectDecl) -> Result<ProjectRecord, Error> {
        validate(decl)?;
        info!(project = %decl.name, system = %decl.system_name, "creating project");

        let catalog = self.platform.catalog()?;
        let ids = resolve_names_to_ids(std::slice::from_ref(&decl.system_name), &catalog)?;
        let system_id = ids.into_iter().next().unwrap_or_default();

        self.platform.api().create_project(&NewProject {
            name: decl.name.clone(),
            system_id: system_id.clone(),
            data_type: decl.data_type.clone(),
            instance_type: decl.instance_type.clone(),
            cloud_type: decl.cloud_type.clone(),
            display_name: decl.display_name.clone(),
            insight_agent_type: decl.insight_agent_type.clone(),
            creation_type: decl.creation_type.clone(),
        })?;

        let settings = self.apply(decl, &Map::new(), None, Stage::Create)?;
        info!(project = %decl.name, "project created");
        Ok(record(decl, system_id, settings))
    }

    fn read(&self, previous: &ProjectRecord) -> Result<Option<ProjectRecord>, Error> {
        let api = self.platform.api();
        let Some(remote) = api.get_project_settings(&previous.name)? else {
            info!(project = %previous.name, "project no longer exists");
            return Ok(None);
        };

        let mut out = previous.clone();
        out.settings = merge(&PROJECT_SCHEMA, &remote, &Map::new())?
            .recorded
            .to_record();

        if let Some(prev_labels) = &previous.labels {
            out.labels = Some(match api.get_log_labels(&previous.name) {
                Ok(Some(keywords)) => labels_from_remote(&keywords, prev_labels),
                Ok(None) => {
                    warn!(project = %previous.name, "label endpoint reported nothing; keeping recorded labels");
                    prev_labels.clone()
                }
                Err(e) => {
                    warn!(project = %previous.name, error = %e, "label read failed; keeping recorded labels");
                    prev_labels.clone()
                }
            });
        }
        Ok(Some(out))
    }

    fn update(&self, decl: &ProjectDecl, previous: &ProjectRecord) -> Result<ProjectRecord, Error> {
        validate(decl)?;
        if decl.name != previous.name {
            return Err(Error::invalid_input(format!(
                "project name cannot change ('{}' -> '{}')",
                previous.name, decl.name
            )));
        }
        info!(project = %decl.name, "updating project");

        let Some(remote) = self.platform.api().get_project_settings(&decl.name)? else {
            return Err(Error::missing(RESOURCE, &decl.name));
        };
        let settings = self.apply(decl, &remote, previous.labels.as_deref(), Stage::Update)?;

        let mut out = record(decl, previous.system_id.clone(), settings);
        // creation-only fields stay as created
        out.system_name = previous.system_name.clone();
        out.data_type = previous.data_type.clone();
        out.instance_type = previous.instance_type.clone();
        out.cloud_type = previous.cloud_type.clone();
        info!(project = %decl.name, "project updated");
        Ok(out)
    }

    fn delete(&self, previous: &ProjectRecord) -> Result<(), Error> {
        info!(project = %previous.name, "deleting project");
        self.platform.api().delete_project(&previous.name)?;
        Ok(())
    }

    fn import(&self, name: &str) -> Result<Option<ProjectRecord>, Error> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::invalid_input("project name cannot be empty"));
        }
        let skeleton = ProjectRecord {
            name: name.to_string(),
            labels: Some(Vec::new()),
            ..Default::default()
        };
        self.read(&skeleton)
    }
}

fn validate(decl: &ProjectDecl) -> Result<(), Error> {
    if decl.name.trim().is_empty() {
        return Err(Error::invalid_input("project name cannot be empty"));
    }
    if let Some(labels) = &decl.labels {
        validate_labels(labels)?;
    }
    for key in decl.settings.keys() {
        if PROJECT_SCHEMA.field(key).is_none() {
            warn!(project = %decl.name, field = %key, "unknown project setting ignored");
        }
    }
    // coercion failures surface before anything is created
    SettingsView::from_declared(&PROJECT_SCHEMA, &declared_settings(decl))?;
    Ok(())
}

/// True when an update would push nothing the record does not already hold.
/// Creation-only fields are ignored; update never changes them.
pub(crate) fn in_sync(decl: &ProjectDecl, recorded: &ProjectRecord) -> bool {
    if decl.name != recorded.name
        || decl.display_name != recorded.display_name
        || decl.insight_agent_type != recorded.insight_agent_type
        || decl.creation_type != recorded.creation_type
    {
        return false;
    }
    let Ok(declared) = SettingsView::from_declared(&PROJECT_SCHEMA, &declared_settings(decl))
    else {
        return false;
    };
    let settings_match = declared
        .to_record()
        .iter()
        .all(|(k, v)| recorded.settings.get(k) == Some(v));
    let labels_match = match &decl.labels {
        None => true,
        Some(labels) => same_labels(labels, recorded.labels.as_deref().unwrap_or(&[])),
    };
    settings_match && labels_match
}

/// Declared settings plus the always-present project name.
fn declared_settings(decl: &ProjectDecl) -> Map<String, Value> {
    let mut m = decl.settings.clone();
    m.insert("projectName".to_string(), Value::String(decl.name.clone()));
    m
}

fn record(decl: &ProjectDecl, system_id: String, settings: Map<String, Value>) -> ProjectRecord {
    ProjectRecord {
        name: decl.name.clone(),
        system_name: decl.system_name.clone(),
        system_id,
        data_type: decl.data_type.clone(),
        instance_type: decl.instance_type.clone(),
        cloud_type: decl.cloud_type.clone(),
        display_name: decl.display_name.clone(),
        insight_agent_type: decl.insight_agent_type.clone(),
        creation_type: decl.creation_type.clone(),
        settings,
        labels: decl
            .labels
            .as_ref()
            .map(|l| l.iter().map(LabelSetting::canonical).collect()),
    }
}
