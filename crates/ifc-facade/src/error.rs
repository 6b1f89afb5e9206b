use ifc_client::ClientError;
use ifc_reconcile::ReconcileError;

/// Coarse failure class, stable across error sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    SchemaViolation,
    RemoteError,
    TransportError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::SchemaViolation => "SCHEMA_VIOLATION",
            ErrorKind::RemoteError => "REMOTE_ERROR",
            ErrorKind::TransportError => "TRANSPORT_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a resource lifecycle operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    Reconcile(ReconcileError),
    Client(ClientError),
    /// A resource the operation needs does not exist on the platform.
    Missing { resource: &'static str, key: String },
}

impl Error {
    pub fn missing(resource: &'static str, key: impl Into<String>) -> Self {
        Error::Missing {
            resource,
            key: key.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::Reconcile(ReconcileError::invalid_input(msg))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Reconcile(ReconcileError::InvalidInput(_)) => ErrorKind::InvalidInput,
            Error::Reconcile(ReconcileError::NotFound { .. }) => ErrorKind::NotFound,
            Error::Reconcile(ReconcileError::SchemaViolation { .. }) => ErrorKind::SchemaViolation,
            Error::Client(ClientError::InvalidInput(_)) => ErrorKind::InvalidInput,
            Error::Client(ClientError::Transport(_)) => ErrorKind::TransportError,
            Error::Client(ClientError::Remote { .. } | ClientError::Decode { .. }) => {
                ErrorKind::RemoteError
            }
            Error::Missing { .. } => ErrorKind::NotFound,
        }
    }

    /// HTTP status of a remote rejection, if that is what this is.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Client(e) => e.status(),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Reconcile(e) => write!(f, "{e}"),
            Error::Client(e) => write!(f, "{e}"),
            Error::Missing { resource, key } => write!(f, "{resource} '{key}' not found"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Reconcile(e) => Some(e),
            Error::Client(e) => Some(e),
            Error::Missing { .. } => None,
        }
    }
}

impl From<ReconcileError> for Error {
    fn from(e: ReconcileError) -> Self {
        Error::Reconcile(e)
    }
}

impl From<ClientError> for Error {
    fn from(e: ClientError) -> Self {
        Error::Client(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_the_source() {
        let e: Error = ReconcileError::NotFound {
            what: "system".into(),
            missing: vec!["Billing".into()],
        }
        .into();
        assert_eq!(e.kind(), ErrorKind::NotFound);
        assert_eq!(e.to_string(), "system(s) not found: Billing");

        let e: Error = ClientError::remote("get project", 502, b"bad gateway").into();
        assert_eq!(e.kind(), ErrorKind::RemoteError);
        assert_eq!(e.status(), Some(502));

        let e: Error = ClientError::Transport("connection refused".into()).into();
        assert_eq!(e.kind(), ErrorKind::TransportError);
        assert_eq!(e.status(), None);

        assert_eq!(Error::missing("project", "p1").kind(), ErrorKind::NotFound);
        assert_eq!(Error::missing("project", "p1").to_string(), "project 'p1' not found");
    }
}
