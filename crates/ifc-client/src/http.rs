use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::debug;

use crate::error::ClientError;
use crate::transport::{Method, RemoteResponse, Transport};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const HEADER_USER: &str = "X-User-Name";
const HEADER_KEY: &str = "X-API-Key";

/// Platform identity attached to every request.
///
/// **The license key is redacted in `Debug` output.**
#[derive(Clone)]
pub struct Credentials {
    pub base_url: String,
    pub username: String,
    pub license_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("license_key", &"<REDACTED>")
            .finish()
    }
}

impl Credentials {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        license_key: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            license_key: license_key.into(),
        }
    }

    fn validate(&self) -> Result<(), ClientError> {
        if self.base_url.trim().is_empty() {
            return Err(ClientError::InvalidInput("base URL cannot be empty".into()));
        }
        if self.username.trim().is_empty() {
            return Err(ClientError::InvalidInput("username cannot be empty".into()));
        }
        if self.license_key.trim().is_empty() {
            return Err(ClientError::InvalidInput("license key cannot be empty".into()));
        }
        Ok(())
    }
}

/// HTTP transport over a blocking reqwest client.
///
/// Must be built and dropped outside an async context (or inside
/// `spawn_blocking`); reqwest's blocking client owns its own runtime.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    creds: Credentials,
}

impl HttpTransport {
    pub fn new(creds: Credentials) -> Result<Self, ClientError> {
        Self::with_timeout(creds, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(creds: Credentials, timeout: Duration) -> Result<Self, ClientError> {
        creds.validate()?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Transport(format!("http client build failed: {e}")))?;
        Ok(Self { http, creds })
    }

    pub fn username(&self) -> &str {
        &self.creds.username
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.creds.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::blocking::RequestBuilder {
        let m = match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };
        self.http
            .request(m, self.url(path))
            .header(HEADER_USER, &self.creds.username)
            .header(HEADER_KEY, &self.creds.license_key)
    }

    fn send(
        &self,
        method: Method,
        path: &str,
        req: reqwest::blocking::RequestBuilder,
    ) -> Result<RemoteResponse, ClientError> {
        let resp = req.send().map_err(|e| {
            ClientError::Transport(format!("{} {} failed: {e}", method.as_str(), path))
        })?;
        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .map_err(|e| ClientError::Transport(format!("read response body failed: {e}")))?
            .to_vec();
        debug!(method = method.as_str(), path, status, bytes = body.len(), "platform call");
        Ok(RemoteResponse { status, body })
    }
}

impl Transport for HttpTransport {
    fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<RemoteResponse, ClientError> {
        let mut req = self
            .request(method, path)
            .header(CONTENT_TYPE, "application/json");
        if let Some(b) = body {
            let bytes = serde_json::to_vec(b)
                .map_err(|e| ClientError::InvalidInput(format!("request body encode failed: {e}")))?;
            req = req.body(bytes);
        }
        self.send(method, path, req)
    }

    fn call_form(
        &self,
        method: Method,
        path: &str,
        fields: &[(String, String)],
    ) -> Result<RemoteResponse, ClientError> {
        let mut all: Vec<(&str, &str)> = fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        all.push(("userName", &self.creds.username));
        all.push(("licenseKey", &self.creds.license_key));

        let req = self.request(method, path).form(&all);
        self.send(method, path, req)
    }
}
