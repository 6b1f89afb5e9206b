/// Failures raised by the reconciliation core.
///
/// None of these involve the network; transport and remote failures are
/// reported by the client crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// A required identifier was empty or blank.
    InvalidInput(String),
    /// Named entities could not be found. An empty `missing` list means the
    /// catalog itself had nothing in it.
    NotFound { what: String, missing: Vec<String> },
    /// A declared value cannot be coerced to the field's declared kind.
    SchemaViolation {
        field: String,
        expected: &'static str,
        got: String,
    },
}

impl ReconcileError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn schema_violation(
        field: impl Into<String>,
        expected: &'static str,
        got: impl Into<String>,
    ) -> Self {
        Self::SchemaViolation {
            field: field.into(),
            expected,
            got: got.into(),
        }
    }
}

impl std::fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::NotFound { what, missing } if missing.is_empty() => {
                write!(f, "no {what}s found")
            }
            Self::NotFound { what, missing } => {
                write!(f, "{what}(s) not found: {}", missing.join(", "))
            }
            Self::SchemaViolation {
                field,
                expected,
                got,
            } => write!(
                f,
                "field '{field}' cannot be coerced: expected {expected}, got {got}"
            ),
        }
    }
}

impl std::error::Error for ReconcileError {}
