//! GCP Client
//!
//! Main client for interacting with GCP APIs, combining authentication,
//! HTTP functionality and per-service endpoint resolution.

use super::auth::GcpCredentials;
use super::http::{with_query, GcpHttpClient};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Default interval between polls of a long-running operation
pub const DEFAULT_OPERATION_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Base URLs for every API the snippets talk to.
///
/// Hosts containing `{location}` are templates resolved per call, e.g. the
/// Vertex AI and regional Parameter Manager endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Endpoints {
    pub compute: String,
    pub storage: String,
    pub iam_credentials: String,
    pub oauth2: String,
    pub google_certs: String,
    pub sts: String,
    pub metadata: String,
    pub language: String,
    pub gameservices: String,
    pub aiplatform: String,
    pub aiplatform_ws: String,
    pub parametermanager: String,
    pub parametermanager_regional: String,
    pub privateca: String,
    pub securitycenter: String,
    pub spanner: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            compute: "https://compute.googleapis.com".to_string(),
            storage: "https://storage.googleapis.com".to_string(),
            iam_credentials: "https://iamcredentials.googleapis.com".to_string(),
            oauth2: "https://oauth2.googleapis.com".to_string(),
            google_certs: "https://www.googleapis.com".to_string(),
            sts: "https://sts.googleapis.com".to_string(),
            metadata: "http://metadata.google.internal".to_string(),
            language: "https://language.googleapis.com".to_string(),
            gameservices: "https://gameservices.googleapis.com".to_string(),
            aiplatform: "https://{location}-aiplatform.googleapis.com".to_string(),
            aiplatform_ws: "wss://{location}-aiplatform.googleapis.com".to_string(),
            parametermanager: "https://parametermanager.googleapis.com".to_string(),
            parametermanager_regional: "https://parametermanager.{location}.rep.googleapis.com"
                .to_string(),
            privateca: "https://privateca.googleapis.com".to_string(),
            securitycenter: "https://securitycenter.googleapis.com".to_string(),
            spanner: "https://spanner.googleapis.com".to_string(),
        }
    }
}

impl Endpoints {
    /// Point every service at a single base URL (emulators, mock servers)
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        let ws = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.clone()
        };

        Self {
            compute: base.clone(),
            storage: base.clone(),
            iam_credentials: base.clone(),
            oauth2: base.clone(),
            google_certs: base.clone(),
            sts: base.clone(),
            metadata: base.clone(),
            language: base.clone(),
            gameservices: base.clone(),
            aiplatform: base.clone(),
            aiplatform_ws: ws,
            parametermanager: base.clone(),
            parametermanager_regional: base.clone(),
            privateca: base.clone(),
            securitycenter: base.clone(),
            spanner: base,
        }
    }

    /// Vertex AI REST host for a location
    pub fn aiplatform_host(&self, location: &str) -> String {
        resolve_location_template(&self.aiplatform, location)
    }

    /// Vertex AI WebSocket host for a location
    pub fn aiplatform_ws_host(&self, location: &str) -> String {
        resolve_location_template(&self.aiplatform_ws, location)
    }

    /// Regional Parameter Manager host
    pub fn parametermanager_regional_host(&self, location: &str) -> String {
        self.parametermanager_regional.replace("{location}", location)
    }
}

/// `global` has no location prefix on Vertex AI hosts
fn resolve_location_template(template: &str, location: &str) -> String {
    if location == "global" {
        template.replace("{location}-", "")
    } else {
        template.replace("{location}", location)
    }
}

/// Main GCP client
#[derive(Clone)]
pub struct GcpClient {
    pub credentials: GcpCredentials,
    pub http: GcpHttpClient,
    pub endpoints: Endpoints,
    pub operation_poll_interval: Duration,
}

impl GcpClient {
    /// Create a new GCP client backed by Application Default Credentials
    pub async fn new() -> Result<Self> {
        let credentials = GcpCredentials::new()
            .await
            .context("Failed to initialize GCP credentials")?;

        Self::with_credentials(credentials)
    }

    /// Create a client from explicit credentials
    pub fn with_credentials(credentials: GcpCredentials) -> Result<Self> {
        let http = GcpHttpClient::new()?;

        Ok(Self {
            credentials,
            http,
            endpoints: Endpoints::default(),
            operation_poll_interval: DEFAULT_OPERATION_POLL_INTERVAL,
        })
    }

    /// Override service endpoints
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Override the long-running operation poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.operation_poll_interval = interval;
        self
    }

    /// Get the current access token
    pub async fn get_token(&self) -> Result<String> {
        self.credentials.get_token().await
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.get(url, &token).await
    }

    /// Make a POST request to a GCP API
    pub async fn post(&self, url: &str, body: Option<&Value>) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.post(url, &token, body).await
    }

    /// Make a PATCH request to a GCP API
    pub async fn patch(&self, url: &str, body: &Value) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.patch(url, &token, body).await
    }

    /// Make a DELETE request to a GCP API
    pub async fn delete(&self, url: &str) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.delete(url, &token).await
    }

    /// Follow `nextPageToken` across a list call and collect every `items_key` entry
    pub async fn list_all(&self, url: &str, items_key: &str) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page_url = match &page_token {
                Some(token) => with_query(url, &[("pageToken", token.as_str())]),
                None => url.to_string(),
            };

            let response = self.get(&page_url).await?;
            if let Some(page) = response.get(items_key).and_then(|v| v.as_array()) {
                items.extend(page.iter().cloned());
            }

            match response.get("nextPageToken").and_then(|v| v.as_str()) {
                Some(token) if !token.is_empty() => page_token = Some(token.to_string()),
                _ => return Ok(items),
            }
        }
    }

    // =========================================================================
    // Compute Engine API helpers
    // =========================================================================

    /// Build Compute Engine API URL
    pub fn compute_url(&self, project: &str, path: &str) -> String {
        format!(
            "{}/compute/v1/projects/{}/{}",
            self.endpoints.compute, project, path
        )
    }

    /// Build zonal Compute Engine API URL
    pub fn compute_zonal_url(&self, project: &str, zone: &str, resource: &str) -> String {
        self.compute_url(project, &format!("zones/{}/{}", zone, resource))
    }

    /// Build regional Compute Engine API URL
    pub fn compute_regional_url(&self, project: &str, region: &str, resource: &str) -> String {
        self.compute_url(project, &format!("regions/{}/{}", region, resource))
    }

    /// Build global Compute Engine API URL
    pub fn compute_global_url(&self, project: &str, resource: &str) -> String {
        self.compute_url(project, &format!("global/{}", resource))
    }

    /// Build aggregated Compute Engine API URL (all zones)
    pub fn compute_aggregated_url(&self, project: &str, resource: &str) -> String {
        self.compute_url(project, &format!("aggregated/{}", resource))
    }

    // =========================================================================
    // Cloud Storage API helpers
    // =========================================================================

    /// Build Cloud Storage API URL
    pub fn storage_url(&self, path: &str) -> String {
        format!("{}/storage/v1/{}", self.endpoints.storage, path)
    }

    // =========================================================================
    // Other service helpers
    // =========================================================================

    pub fn iam_credentials_url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.endpoints.iam_credentials, path)
    }

    pub fn gameservices_root(&self) -> String {
        format!("{}/v1", self.endpoints.gameservices)
    }

    /// Vertex AI URL, e.g. `aiplatform_url("us-central1", "v1", "projects/...")`
    pub fn aiplatform_url(&self, location: &str, version: &str, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoints.aiplatform_host(location),
            version,
            path
        )
    }

    pub fn privateca_root(&self) -> String {
        format!("{}/v1", self.endpoints.privateca)
    }

    pub fn securitycenter_root(&self, version: &str) -> String {
        format!("{}/{}", self.endpoints.securitycenter, version)
    }

    pub fn spanner_root(&self) -> String {
        format!("{}/v1", self.endpoints.spanner)
    }
}

/// Last `/`-separated segment of a resource name or self link
pub fn short_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Read a string field from a JSON resource, empty when absent
pub fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(|v| v.as_str()).unwrap_or_default()
}

/// Format a GCP API error for display
pub fn format_gcp_error(error: &anyhow::Error) -> String {
    super::http::format_gcp_error(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aiplatform_host_resolution() {
        let endpoints = Endpoints::default();
        assert_eq!(
            endpoints.aiplatform_host("us-central1"),
            "https://us-central1-aiplatform.googleapis.com"
        );
        assert_eq!(
            endpoints.aiplatform_host("global"),
            "https://aiplatform.googleapis.com"
        );
        assert_eq!(
            endpoints.aiplatform_ws_host("europe-west4"),
            "wss://europe-west4-aiplatform.googleapis.com"
        );
        assert_eq!(
            endpoints.parametermanager_regional_host("us-east4"),
            "https://parametermanager.us-east4.rep.googleapis.com"
        );
    }

    #[test]
    fn test_with_base_rewrites_every_service() {
        let endpoints = Endpoints::with_base("http://127.0.0.1:8080/");
        assert_eq!(endpoints.compute, "http://127.0.0.1:8080");
        assert_eq!(endpoints.aiplatform_host("us-central1"), "http://127.0.0.1:8080");
        assert_eq!(endpoints.aiplatform_ws_host("global"), "ws://127.0.0.1:8080");
        assert_eq!(
            endpoints.parametermanager_regional_host("us-east4"),
            "http://127.0.0.1:8080"
        );
    }

    #[test]
    fn test_compute_urls() {
        let client = GcpClient::with_credentials(GcpCredentials::from_static_token("t")).unwrap();
        assert_eq!(
            client.compute_zonal_url("p", "us-central1-a", "instances/vm"),
            "https://compute.googleapis.com/compute/v1/projects/p/zones/us-central1-a/instances/vm"
        );
        assert_eq!(
            client.compute_regional_url("p", "us-central1", "addresses"),
            "https://compute.googleapis.com/compute/v1/projects/p/regions/us-central1/addresses"
        );
        assert_eq!(
            client.compute_aggregated_url("p", "instances"),
            "https://compute.googleapis.com/compute/v1/projects/p/aggregated/instances"
        );
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("projects/p/zones/z/instances/vm-1"), "vm-1");
        assert_eq!(short_name("plain"), "plain");
    }
}
