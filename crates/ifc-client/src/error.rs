use std::fmt;

/// Longest body fragment carried in error messages.
const BODY_PREVIEW_BYTES: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Rejected before any request was sent.
    InvalidInput(String),
    /// Network-level failure: connect, timeout, body read.
    Transport(String),
    /// The platform answered with a status (or body) the operation does not
    /// accept.
    Remote {
        operation: String,
        status: u16,
        body: String,
    },
    /// The platform answered 200 with a body that could not be decoded.
    Decode { operation: String, message: String },
}

impl ClientError {
    pub fn remote(operation: impl Into<String>, status: u16, body: &[u8]) -> Self {
        Self::Remote {
            operation: operation.into(),
            status,
            body: preview(body),
        }
    }

    pub fn decode(operation: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Decode {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Status code for remote errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Remote {
                operation,
                status,
                body,
            } => write!(f, "{operation} failed: HTTP {status} - {body}"),
            Self::Decode { operation, message } => {
                write!(f, "{operation} failed: cannot decode response: {message}")
            }
        }
    }
}

impl std::error::Error for ClientError {}

fn preview(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= BODY_PREVIEW_BYTES {
        return text.into_owned();
    }
    let mut cut = BODY_PREVIEW_BYTES;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_names_status_and_body() {
        let e = ClientError::remote("update project", 500, b"{\"message\":\"boom\"}");
        assert_eq!(
            e.to_string(),
            "update project failed: HTTP 500 - {\"message\":\"boom\"}"
        );
        assert_eq!(e.status(), Some(500));
    }

    #[test]
    fn long_bodies_are_cut_on_a_char_boundary() {
        let body = "é".repeat(400);
        let e = ClientError::remote("x", 502, body.as_bytes());
        let ClientError::Remote { body, .. } = e else {
            panic!("expected remote error");
        };
        assert!(body.ends_with("..."));
        assert!(body.len() <= BODY_PREVIEW_BYTES + 3);
    }
}
