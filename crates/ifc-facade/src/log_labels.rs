//! Standalone log label resource: a subset of one project's label types.

use ifc_client::Transport;
use ifc_reconcile::{
    labels_from_remote, removed_label_types, same_labels, tracked_labels_from_remote,
    validate_labels, LabelSetting,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Error;
use crate::platform::Platform;
use crate::resource::ManagedResource;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLabelsDecl {
    pub project_name: String,
    pub labels: Vec<LabelSetting>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLabelsRecord {
    pub project_name: String,
    pub labels: Vec<LabelSetting>,
}

pub struct LogLabelsResource<'a, T> {
    platform: &'a Platform<T>,
}

impl<'a, T: Transport> LogLabelsResource<'a, T> {
    pub(crate) fn new(platform: &'a Platform<T>) -> Self {
        Self { platform }
    }

    fn write(
        &self,
        decl: &LogLabelsDecl,
        previous: &[LabelSetting],
    ) -> Result<LogLabelsRecord, Error> {
        validate(decl)?;
        let writes: Vec<LabelSetting> = decl.labels.iter().map(LabelSetting::canonical).collect();
        let cleared = removed_label_types(previous, &decl.labels);
        self.platform
            .mutate_labels(&decl.project_name, &writes, &cleared)?;
        Ok(LogLabelsRecord {
            project_name: decl.project_name.clone(),
            labels: writes,
        })
    }
}

impl<T: Transport> ManagedResource for LogLabelsResource<'_, T> {
    type Declared = LogLabelsDecl;
    type Recorded = LogLabelsRecord;

    fn key(recorded: &LogLabelsRecord) -> String {
        recorded.project_name.clone()
    }

    fn create(&self, decl: &LogLabelsDecl) -> Result<LogLabelsRecord, Error> {
        info!(project = %decl.project_name, count = decl.labels.len(), "creating log labels");
        self.write(decl, &[])
    }

    /// Only label types already recorded are tracked. Nothing left means the
    /// resource is gone.
    fn read(&self, previous: &LogLabelsRecord) -> Result<Option<LogLabelsRecord>, Error> {
        let Some(keywords) = self.platform.api().get_log_labels(&previous.project_name)? else {
            return Ok(None);
        };
        let labels = tracked_labels_from_remote(&keywords, &previous.labels);
        if labels.is_empty() {
            info!(project = %previous.project_name, "no tracked label rules remain");
            return Ok(None);
        }
        Ok(Some(LogLabelsRecord {
            project_name: previous.project_name.clone(),
            labels,
        }))
    }

    fn update(
        &self,
        decl: &LogLabelsDecl,
        previous: &LogLabelsRecord,
    ) -> Result<LogLabelsRecord, Error> {
        if decl.project_name != previous.project_name {
            return Err(Error::invalid_input(format!(
                "log label project cannot change ('{}' -> '{}')",
                previous.project_name, decl.project_name
            )));
        }
        info!(project = %decl.project_name, count = decl.labels.len(), "updating log labels");
        self.write(decl, &previous.labels)
    }

    /// Clear every recorded label type. Clears that the platform reports as
    /// absent or unsupported count as done.
    fn delete(&self, previous: &LogLabelsRecord) -> Result<(), Error> {
        info!(project = %previous.project_name, "deleting log labels");
        let types: Vec<String> = previous.labels.iter().map(|l| l.label_type.clone()).collect();
        if let Err(e) = self.platform.mutate_labels(&previous.project_name, &[], &types) {
            warn!(project = %previous.project_name, error = %e, "label clear failed");
            return Err(e);
        }
        Ok(())
    }

    fn import(&self, project_name: &str) -> Result<Option<LogLabelsRecord>, Error> {
        let project_name = project_name.trim();
        if project_name.is_empty() {
            return Err(Error::invalid_input("project name cannot be empty"));
        }
        let Some(keywords) = self.platform.api().get_log_labels(project_name)? else {
            return Ok(None);
        };
        let labels = labels_from_remote(&keywords, &[]);
        if labels.is_empty() {
            return Ok(None);
        }
        Ok(Some(LogLabelsRecord {
            project_name: project_name.to_string(),
            labels,
        }))
    }
}

pub(crate) fn in_sync(decl: &LogLabelsDecl, recorded: &LogLabelsRecord) -> bool {
    decl.project_name == recorded.project_name && same_labels(&decl.labels, &recorded.labels)
}

fn validate(decl: &LogLabelsDecl) -> Result<(), Error> {
    if decl.project_name.trim().is_empty() {
        return Err(Error::invalid_input("project name cannot be empty"));
    }
    if decl.labels.is_empty() {
        return Err(Error::invalid_input(format!(
            "log labels for '{}' declare no label types",
            decl.project_name
        )));
    }
    validate_labels(&decl.labels)?;
    Ok(())
}
