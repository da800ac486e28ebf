//! Okta as the identity provider for workload identity federation

use super::external_account::{
    ExternalAccountCredentials, ExternalAccountOptions, SubjectTokenSupplier,
};
use crate::gcp::client::{str_field, Endpoints, GcpClient};
use crate::gcp::http::{with_query, GcpHttpClient};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Refresh the Okta token this long before it expires
const REFRESH_BUFFER: Duration = Duration::from_secs(60);

const OKTA_SCOPE: &str = "gcp.test.read";

#[derive(Default)]
struct CachedSubjectToken {
    token: String,
    expires_at: Option<Instant>,
}

/// Fetches Okta access tokens with the client credentials grant
pub struct OktaClientCredentialsSupplier {
    token_url: String,
    client_id: String,
    client_secret: String,
    http: GcpHttpClient,
    cache: Mutex<CachedSubjectToken>,
}

impl OktaClientCredentialsSupplier {
    /// Token endpoint of the `default` authorization server of `domain`
    pub fn new(domain: &str, client_id: &str, client_secret: &str) -> Result<Self> {
        let token_url = format!("{}/oauth2/default/v1/token", domain.trim_end_matches('/'));
        Self::with_token_url(token_url, client_id, client_secret)
    }

    pub fn with_token_url(
        token_url: impl Into<String>,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Self> {
        Ok(Self {
            token_url: token_url.into(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            http: GcpHttpClient::new()?,
            cache: Mutex::new(CachedSubjectToken::default()),
        })
    }

    async fn fetch_token(&self) -> Result<(String, u64)> {
        let response = self
            .http
            .post_form(
                &self.token_url,
                &[("grant_type", "client_credentials"), ("scope", OKTA_SCOPE)],
                Some((self.client_id.as_str(), self.client_secret.as_str())),
            )
            .await
            .context("failed to fetch Okta token")?;

        let token = str_field(&response, "access_token");
        if token.is_empty() {
            anyhow::bail!("Okta response missing access_token");
        }
        let expires_in = response
            .get("expires_in")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        Ok((token.to_string(), expires_in))
    }
}

#[async_trait]
impl SubjectTokenSupplier for OktaClientCredentialsSupplier {
    async fn subject_token(&self) -> Result<String> {
        let mut cache = self.cache.lock().await;

        if let Some(expires_at) = cache.expires_at {
            if !cache.token.is_empty() && Instant::now() + REFRESH_BUFFER < expires_at {
                tracing::debug!("Returning cached Okta token");
                return Ok(cache.token.clone());
            }
        }

        tracing::debug!("Fetching new token from Okta");
        let (token, expires_in) = self.fetch_token().await?;
        cache.token = token;
        cache.expires_at = Some(Instant::now() + Duration::from_secs(expires_in));
        Ok(cache.token.clone())
    }
}

/// Okta federation settings, from a JSON secrets file with environment fallback
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct OktaSettings {
    #[serde(default, rename = "gcp_workload_audience")]
    pub audience: String,
    #[serde(default, rename = "gcs_bucket_name")]
    pub bucket: String,
    #[serde(default, rename = "gcp_service_account_impersonation_url")]
    pub impersonation_url: String,
    #[serde(default, rename = "okta_domain")]
    pub domain: String,
    #[serde(default, rename = "okta_client_id")]
    pub client_id: String,
    #[serde(default, rename = "okta_client_secret")]
    pub client_secret: String,
}

impl OktaSettings {
    pub const SECRETS_FILE: &'static str = "custom-credentials-okta-secrets.json";

    /// Values from `path` win; empty ones fall back to the environment
    pub fn load(path: &Path) -> Self {
        let mut settings: OktaSettings = std::fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();

        let fill = |field: &mut String, var: &str| {
            if field.is_empty() {
                if let Ok(value) = std::env::var(var) {
                    *field = value;
                }
            }
        };
        fill(&mut settings.audience, "GCP_WORKLOAD_AUDIENCE");
        fill(&mut settings.bucket, "GCS_BUCKET_NAME");
        fill(&mut settings.impersonation_url, "GCP_SERVICE_ACCOUNT_IMPERSONATION_URL");
        fill(&mut settings.domain, "OKTA_DOMAIN");
        fill(&mut settings.client_id, "OKTA_CLIENT_ID");
        fill(&mut settings.client_secret, "OKTA_CLIENT_SECRET");
        settings
    }

    /// Names of required settings that are still empty
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("GCP_WORKLOAD_AUDIENCE", &self.audience),
            ("OKTA_DOMAIN", &self.domain),
            ("OKTA_CLIENT_ID", &self.client_id),
            ("OKTA_CLIENT_SECRET", &self.client_secret),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    fn impersonation(&self) -> Option<String> {
        Some(self.impersonation_url.clone()).filter(|url| !url.is_empty())
    }
}

fn okta_credentials(
    endpoints: &Endpoints,
    settings: &OktaSettings,
    scopes: &[&str],
    supplier: Arc<dyn SubjectTokenSupplier>,
) -> Result<ExternalAccountCredentials> {
    let missing = settings.missing();
    if !missing.is_empty() {
        anyhow::bail!("missing required configuration: {}", missing.join(", "));
    }

    let mut options = ExternalAccountOptions::new(&settings.audience, &endpoints.sts);
    options.service_account_impersonation_url = settings.impersonation();
    options.scopes = scopes.iter().map(|s| s.to_string()).collect();
    ExternalAccountCredentials::new(options, supplier)
}

/// List up to five buckets of `project` with Okta-federated credentials
pub async fn authenticate_with_okta_supplier(
    w: &mut impl Write,
    endpoints: &Endpoints,
    settings: &OktaSettings,
    project: &str,
    supplier: Arc<dyn SubjectTokenSupplier>,
) -> Result<Vec<String>> {
    let credentials = okta_credentials(
        endpoints,
        settings,
        &["https://www.googleapis.com/auth/cloud-platform"],
        supplier,
    )?
    .credentials()
    .await
    .context("failed to create credentials")?;

    let client = GcpClient::with_credentials(credentials)?.with_endpoints(endpoints.clone());
    let url = with_query(&client.storage_url("b"), &[("project", project)]);
    let response = client
        .get(&url)
        .await
        .context("failed to list buckets (authentication might have failed)")?;

    let mut names = Vec::new();
    let items = response.get("items").and_then(|v| v.as_array());
    for bucket in items.into_iter().flatten() {
        if names.len() >= 5 {
            writeln!(w, "... (stopping after 5 buckets)")?;
            break;
        }
        let name = str_field(bucket, "name").to_string();
        writeln!(w, " - {}", name)?;
        names.push(name);
    }
    Ok(names)
}

/// Check read access to `settings.bucket` with Okta-federated credentials
pub async fn authenticate_with_okta_credentials(
    w: &mut impl Write,
    endpoints: &Endpoints,
    settings: &OktaSettings,
    supplier: Arc<dyn SubjectTokenSupplier>,
) -> Result<()> {
    if settings.bucket.is_empty() {
        anyhow::bail!("missing required configuration: GCS_BUCKET_NAME");
    }

    let credentials = okta_credentials(
        endpoints,
        settings,
        &["https://www.googleapis.com/auth/devstorage.read_only"],
        supplier,
    )?
    .credentials()
    .await
    .context("Token")?;

    let client = GcpClient::with_credentials(credentials)?.with_endpoints(endpoints.clone());
    client
        .get(&client.storage_url(&format!("b/{}", settings.bucket)))
        .await
        .context("GCS request failed")?;

    writeln!(
        w,
        "Success! Authenticated and accessed bucket: {}",
        settings.bucket
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_missing_fields() {
        let settings = OktaSettings {
            audience: "aud".to_string(),
            domain: "https://example.okta.com".to_string(),
            ..Default::default()
        };
        assert_eq!(settings.missing(), vec!["OKTA_CLIENT_ID", "OKTA_CLIENT_SECRET"]);
        assert_eq!(settings.impersonation(), None);
    }

    #[test]
    fn test_settings_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(OktaSettings::SECRETS_FILE);
        std::fs::write(
            &path,
            r#"{
                "gcp_workload_audience": "//iam.googleapis.com/projects/1/locations/global/workloadIdentityPools/p/providers/okta",
                "gcs_bucket_name": "my-bucket",
                "okta_domain": "https://dev-1.okta.com",
                "okta_client_id": "id",
                "okta_client_secret": "secret"
            }"#,
        )
        .unwrap();

        let settings = OktaSettings::load(&path);
        assert_eq!(settings.bucket, "my-bucket");
        assert_eq!(settings.client_id, "id");
    }

    #[test]
    fn test_token_url_from_domain() {
        let supplier = OktaClientCredentialsSupplier::new("https://dev-1.okta.com/", "id", "secret").unwrap();
        assert_eq!(supplier.token_url, "https://dev-1.okta.com/oauth2/default/v1/token");
    }
}
