use std::collections::BTreeMap;
use thiserror::Error;

use super::item::{FeatureItem, FeatureKind};
use crate::plugins::ROLE_HEADER;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0} context has no API client")]
    NoClient(&'static str),
    #[error("expected a {expected} item, got a {got}")]
    KindMismatch { expected: &'static str, got: &'static str },
}

impl ShellError {
    /// Unique-constraint rejection from the server.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ShellError::Status { status: 409, .. })
    }
}

/// Thin client for the plugin routes under `/api/<name>`.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    role: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            role: None,
        }
    }

    /// Send `role` in the role header on every request.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    fn url(&self, kind: FeatureKind, suffix: &str) -> String {
        format!("{}/api/{}{suffix}", self.base_url, kind.plugin_name())
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        let req = self.http.request(method, url);
        match &self.role {
            Some(role) => req.header(ROLE_HEADER, role),
            None => req,
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, ShellError> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = match resp.json::<serde_json::Value>().await {
            Ok(body) => body["error"].as_str().unwrap_or_default().to_string(),
            Err(_) => String::new(),
        };
        let message = if message.is_empty() {
            status.canonical_reason().unwrap_or("error").to_string()
        } else {
            message
        };
        Err(ShellError::Status { status: status.as_u16(), message })
    }

    async fn item(kind: FeatureKind, resp: reqwest::Response) -> Result<FeatureItem, ShellError> {
        let value: serde_json::Value = resp.json().await?;
        Ok(FeatureItem::from_value(kind, value)?)
    }

    pub async fn list(&self, kind: FeatureKind) -> Result<Vec<FeatureItem>, ShellError> {
        let resp = self.send(self.request(reqwest::Method::GET, self.url(kind, ""))).await?;
        let rows: Vec<serde_json::Value> = resp.json().await?;
        rows.into_iter()
            .map(|row| FeatureItem::from_value(kind, row).map_err(ShellError::from))
            .collect()
    }

    pub async fn create(&self, item: &FeatureItem) -> Result<FeatureItem, ShellError> {
        let kind = item.kind();
        let req = self.request(reqwest::Method::POST, self.url(kind, "")).json(&item.to_value());
        let resp = self.send(req).await?;
        Self::item(kind, resp).await
    }

    pub async fn update(&self, id: i64, item: &FeatureItem) -> Result<FeatureItem, ShellError> {
        let kind = item.kind();
        let req = self
            .request(reqwest::Method::PUT, self.url(kind, &format!("/{id}")))
            .json(&item.to_value());
        let resp = self.send(req).await?;
        Self::item(kind, resp).await
    }

    pub async fn delete(&self, kind: FeatureKind, id: i64) -> Result<(), ShellError> {
        self.send(self.request(reqwest::Method::DELETE, self.url(kind, &format!("/{id}"))))
            .await
            .map(|_| ())
    }

    /// Column labels for list views.
    pub async fn field_map(&self, kind: FeatureKind) -> Result<BTreeMap<String, String>, ShellError> {
        let resp = self.send(self.request(reqwest::Method::GET, self.url(kind, "/map"))).await?;
        Ok(resp.json().await?)
    }
}
