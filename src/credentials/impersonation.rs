use crate::gcp::auth::GcpCredentials;
use crate::gcp::client::{str_field, GcpClient};
use anyhow::{Context, Result};
use serde_json::json;
use std::io::Write;

/// Short-lived token minted for another service account
#[derive(Debug, Clone, PartialEq)]
pub struct ImpersonatedToken {
    pub access_token: String,
    pub expire_time: String,
}

impl ImpersonatedToken {
    /// Credentials that send this token as-is
    pub fn into_credentials(self) -> GcpCredentials {
        GcpCredentials::from_static_token(self.access_token)
    }
}

/// Mint an access token for `service_account` using the caller's own credentials.
/// The caller needs `roles/iam.serviceAccountTokenCreator` on the target.
pub async fn get_access_token_from_impersonated_credentials(
    w: &mut impl Write,
    client: &GcpClient,
    service_account: &str,
    scope: &str,
) -> Result<ImpersonatedToken> {
    let url = client.iam_credentials_url(&format!(
        "projects/-/serviceAccounts/{}:generateAccessToken",
        service_account
    ));
    let body = json!({
        "scope": [scope],
        "lifetime": "3600s",
    });

    let response = client
        .post(&url, Some(&body))
        .await
        .context("failed to generate impersonated access token")?;

    let token = ImpersonatedToken {
        access_token: str_field(&response, "accessToken").to_string(),
        expire_time: str_field(&response, "expireTime").to_string(),
    };
    if token.access_token.is_empty() {
        anyhow::bail!("generateAccessToken response has no accessToken");
    }

    writeln!(w, "Generated OAuth2 token with expiry {}", token.expire_time)?;
    Ok(token)
}
