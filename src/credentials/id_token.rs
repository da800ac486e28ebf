//! Google-signed ID tokens: minting and verification

use crate::gcp::client::Endpoints;
use crate::gcp::http::{with_query, GcpHttpClient};
use anyhow::{Context, Result};
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use std::path::Path;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const GOOGLE_ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];

/// Fields of a service account key file used for signing
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: String,
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read key file {}", path.display()))?;
        serde_json::from_str(&content).context("failed to parse service account key file")
    }
}

#[derive(Debug, Serialize)]
struct IdTokenAssertion<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    target_audience: &'a str,
    iat: i64,
    exp: i64,
}

/// Ask the metadata server for an ID token of the attached service account
pub async fn get_id_token_from_metadata_server(
    w: &mut impl Write,
    endpoints: &Endpoints,
    audience: &str,
) -> Result<String> {
    let http = GcpHttpClient::new()?;
    let url = with_query(
        &format!(
            "{}/computeMetadata/v1/instance/service-accounts/default/identity",
            endpoints.metadata
        ),
        &[("audience", audience), ("format", "full")],
    );

    let token = http
        .get_with_headers(&url, &[("Metadata-Flavor", "Google")])
        .await
        .context("failed to fetch ID token from metadata server")?;
    let token = token.trim().to_string();
    if token.is_empty() {
        anyhow::bail!("metadata server returned an empty ID token");
    }

    writeln!(w, "Generated ID token.")?;
    Ok(token)
}

/// Sign an assertion with the key file and trade it for a Google ID token
pub async fn get_id_token_from_service_account(
    w: &mut impl Write,
    endpoints: &Endpoints,
    key_path: &Path,
    audience: &str,
) -> Result<String> {
    let key = ServiceAccountKey::from_file(key_path)?;
    let token_url = format!("{}/token", endpoints.oauth2);

    let assertion = sign_id_token_assertion(&key, &token_url, audience)?;

    let http = GcpHttpClient::new()?;
    let response = http
        .post_form(
            &token_url,
            &[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())],
            None,
        )
        .await
        .context("failed to exchange assertion for ID token")?;

    let id_token = response
        .get("id_token")
        .and_then(|v| v.as_str())
        .context("token response has no id_token")?
        .to_string();

    writeln!(w, "Generated ID token.")?;
    Ok(id_token)
}

/// RS256 JWT asserting `target_audience`, addressed to the token endpoint
pub fn sign_id_token_assertion(
    key: &ServiceAccountKey,
    token_url: &str,
    audience: &str,
) -> Result<String> {
    let iat = chrono::Utc::now().timestamp();
    let claims = IdTokenAssertion {
        iss: &key.client_email,
        sub: &key.client_email,
        aud: token_url,
        target_audience: audience,
        iat,
        exp: iat + 3600,
    };

    let mut header = Header::new(Algorithm::RS256);
    if !key.private_key_id.is_empty() {
        header.kid = Some(key.private_key_id.clone());
    }

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .context("invalid private key in key file")?;
    jsonwebtoken::encode(&header, &claims, &encoding_key).context("failed to sign assertion")
}

/// Check an ID token against Google's published keys
pub async fn verify_google_id_token(
    w: &mut impl Write,
    endpoints: &Endpoints,
    token: &str,
    audience: &str,
) -> Result<Value> {
    let http = GcpHttpClient::new()?;
    let certs_url = format!("{}/oauth2/v3/certs", endpoints.google_certs);
    let jwks = http
        .inner()
        .get(&certs_url)
        .send()
        .await
        .context("failed to fetch Google certificates")?
        .error_for_status()
        .context("failed to fetch Google certificates")?
        .json::<JwkSet>()
        .await
        .context("failed to parse Google certificates")?;

    let claims = verify_with_jwks(&jwks, token, audience)?;

    writeln!(w, "ID token verified.")?;
    writeln!(w, "{}", serde_json::to_string_pretty(&claims)?)?;
    Ok(claims)
}

/// Validate signature, audience, issuer and expiry against a key set
pub fn verify_with_jwks(jwks: &JwkSet, token: &str, audience: &str) -> Result<Value> {
    let header = jsonwebtoken::decode_header(token).context("malformed ID token")?;
    let kid = header.kid.context("ID token has no key id")?;
    let jwk = jwks
        .find(&kid)
        .with_context(|| format!("no Google certificate with key id {}", kid))?;
    let decoding_key = DecodingKey::from_jwk(jwk).context("unusable Google certificate")?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[audience]);
    validation.set_issuer(&GOOGLE_ISSUERS);

    let data = jsonwebtoken::decode::<Value>(token, &decoding_key, &validation)
        .context("ID token validation failed")?;
    Ok(data.claims)
}
