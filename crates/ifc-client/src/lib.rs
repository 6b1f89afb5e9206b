//! ifc-client
//!
//! Platform transport and typed endpoints.
//!
//! Two layers:
//! - [`Transport`]: authenticated `call` / `call_form` returning status + body
//! - [`PlatformApi`]: one method per platform endpoint, applying the status
//!   contract (200 = ok, 404/204 = absent, anything else = error)
//!
//! No retries. Failures are surfaced to the caller as they occur.

mod api;
mod error;
mod http;
mod transport;

pub use api::{
    NewProject, PlatformApi, ServiceNowRemote, ServiceNowWrite, SystemFramework,
};
pub use error::ClientError;
pub use http::{Credentials, HttpTransport, DEFAULT_TIMEOUT};
pub use transport::{Method, RemoteResponse, Transport};
