use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Raw platform answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RemoteResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// 404 and 204 both mean "no such resource".
    pub fn is_absent(&self) -> bool {
        self.status == 404 || self.status == 204
    }

    /// Apply the status contract: `Some(self)` on 200, `None` when absent,
    /// an error carrying status and body otherwise.
    pub fn present(self, operation: &str) -> Result<Option<Self>, ClientError> {
        if self.is_ok() {
            Ok(Some(self))
        } else if self.is_absent() {
            Ok(None)
        } else {
            Err(self.into_error(operation))
        }
    }

    /// Accept 200 and any of `also_ok`; error on everything else.
    pub fn expect(self, operation: &str, also_ok: &[u16]) -> Result<Self, ClientError> {
        if self.is_ok() || also_ok.contains(&self.status) {
            Ok(self)
        } else {
            Err(self.into_error(operation))
        }
    }

    pub fn into_error(self, operation: &str) -> ClientError {
        ClientError::remote(operation, self.status, &self.body)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self, operation: &str) -> Result<T, ClientError> {
        serde_json::from_slice(&self.body).map_err(|e| ClientError::decode(operation, e))
    }
}

/// Authenticated call-and-return access to the platform.
///
/// Implementations attach process-level credentials to every request.
pub trait Transport: Send + Sync {
    /// JSON-bodied request.
    fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<RemoteResponse, ClientError>;

    /// Form-encoded request.
    fn call_form(
        &self,
        method: Method,
        path: &str,
        fields: &[(String, String)],
    ) -> Result<RemoteResponse, ClientError>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<RemoteResponse, ClientError> {
        (**self).call(method, path, body)
    }

    fn call_form(
        &self,
        method: Method,
        path: &str,
        fields: &[(String, String)],
    ) -> Result<RemoteResponse, ClientError> {
        (**self).call_form(method, path, fields)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<RemoteResponse, ClientError> {
        (**self).call(method, path, body)
    }

    fn call_form(
        &self,
        method: Method,
        path: &str,
        fields: &[(String, String)],
    ) -> Result<RemoteResponse, ClientError> {
        (**self).call_form(method, path, fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_contract() {
        assert!(RemoteResponse::new(200, "{}").present("op").unwrap().is_some());
        assert!(RemoteResponse::new(404, "").present("op").unwrap().is_none());
        assert!(RemoteResponse::new(204, "").present("op").unwrap().is_none());

        let err = RemoteResponse::new(503, "down").present("read thing").unwrap_err();
        assert_eq!(err.to_string(), "read thing failed: HTTP 503 - down");
    }

    #[test]
    fn expect_allows_listed_statuses() {
        assert!(RemoteResponse::new(405, "").expect("delete", &[404, 405]).is_ok());
        assert!(RemoteResponse::new(500, "").expect("delete", &[404, 405]).is_err());
    }
}
