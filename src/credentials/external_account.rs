//! Workload identity federation with a caller-supplied subject token

use crate::gcp::auth::{GcpCredentials, DEFAULT_SCOPES};
use crate::gcp::client::str_field;
use crate::gcp::http::GcpHttpClient;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

const TOKEN_EXCHANGE_GRANT: &str = "urn:ietf:params:oauth:grant-type:token-exchange";
const ACCESS_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:access_token";
pub const JWT_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:jwt";

/// Source of the third-party token presented to STS
#[async_trait]
pub trait SubjectTokenSupplier: Send + Sync {
    async fn subject_token(&self) -> Result<String>;
}

/// Settings of an external account credential
#[derive(Debug, Clone)]
pub struct ExternalAccountOptions {
    /// Workload identity pool provider, `//iam.googleapis.com/projects/.../providers/...`
    pub audience: String,
    pub subject_token_type: String,
    /// STS token endpoint
    pub token_url: String,
    /// Full `...:generateAccessToken` URL, when a service account is impersonated
    pub service_account_impersonation_url: Option<String>,
    pub scopes: Vec<String>,
}

impl ExternalAccountOptions {
    pub fn new(audience: impl Into<String>, sts_base: &str) -> Self {
        Self {
            audience: audience.into(),
            subject_token_type: JWT_TOKEN_TYPE.to_string(),
            token_url: format!("{}/v1/token", sts_base),
            service_account_impersonation_url: None,
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Google access token obtained from an external identity
pub struct ExternalAccountCredentials {
    options: ExternalAccountOptions,
    supplier: Arc<dyn SubjectTokenSupplier>,
    http: GcpHttpClient,
}

impl ExternalAccountCredentials {
    pub fn new(
        options: ExternalAccountOptions,
        supplier: Arc<dyn SubjectTokenSupplier>,
    ) -> Result<Self> {
        Ok(Self {
            options,
            supplier,
            http: GcpHttpClient::new()?,
        })
    }

    /// Exchange the subject token at STS, then impersonate if configured
    pub async fn token(&self) -> Result<String> {
        let subject_token = self.supplier.subject_token().await?;
        let scope = self.options.scopes.join(" ");

        let form = [
            ("grant_type", TOKEN_EXCHANGE_GRANT),
            ("audience", self.options.audience.as_str()),
            ("scope", scope.as_str()),
            ("requested_token_type", ACCESS_TOKEN_TYPE),
            ("subject_token", subject_token.as_str()),
            ("subject_token_type", self.options.subject_token_type.as_str()),
        ];
        let response = self
            .http
            .post_form(&self.options.token_url, &form, None)
            .await
            .context("STS token exchange failed")?;

        let federated = str_field(&response, "access_token").to_string();
        if federated.is_empty() {
            anyhow::bail!("STS response has no access_token");
        }

        let Some(impersonation_url) = &self.options.service_account_impersonation_url else {
            return Ok(federated);
        };

        tracing::debug!("Impersonating service account with federated token");
        let body = json!({
            "scope": self.options.scopes,
            "lifetime": "3600s",
        });
        let response = self
            .http
            .post(impersonation_url, &federated, Some(&body))
            .await
            .context("service account impersonation failed")?;

        let token = str_field(&response, "accessToken").to_string();
        if token.is_empty() {
            anyhow::bail!("impersonation response has no accessToken");
        }
        Ok(token)
    }

    /// Credentials for [`crate::gcp::GcpClient`] holding a freshly exchanged token
    pub async fn credentials(&self) -> Result<GcpCredentials> {
        Ok(GcpCredentials::from_static_token(self.token().await?))
    }
}
