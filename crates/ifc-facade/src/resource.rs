use crate::error::Error;

/// Create / read / update / delete / import for one declared resource kind.
///
/// `Declared` is what the operator wants; `Recorded` is what gets persisted
/// between runs and handed back as `previous`.
pub trait ManagedResource {
    type Declared;
    type Recorded;

    /// Stable key of a record, used to pair declared and recorded entries.
    fn key(recorded: &Self::Recorded) -> String;

    fn create(&self, declared: &Self::Declared) -> Result<Self::Recorded, Error>;

    /// Current platform state. `Ok(None)` means the resource is gone.
    fn read(&self, previous: &Self::Recorded) -> Result<Option<Self::Recorded>, Error>;

    fn update(
        &self,
        declared: &Self::Declared,
        previous: &Self::Recorded,
    ) -> Result<Self::Recorded, Error>;

    fn delete(&self, previous: &Self::Recorded) -> Result<(), Error>;

    /// Adopt an existing platform resource by key. `Ok(None)` when there is
    /// nothing to adopt.
    fn import(&self, key: &str) -> Result<Option<Self::Recorded>, Error>;
}
