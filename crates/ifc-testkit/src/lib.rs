//! ifc-testkit
//!
//! Test-only platform double plus the cross-crate scenario tests under
//! `tests/`. Never linked into the CLI.

mod fake_platform;

pub use fake_platform::{
    FakePlatform, RecordedCall, CREATE_PROJECT_PATH, DELETE_PROJECT_PATH, KEYWORDS_PATH, MASK,
    SERVICE_INTEGRATION_PATH, SETTINGS_PATH, SYSTEM_FRAMEWORK_PATH,
};
