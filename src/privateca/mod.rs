//! Certificate Authority Service snippets
//!
//! CA pools, root certificate authorities inside them and certificates issued
//! by those authorities.

use crate::gcp::client::{str_field, GcpClient};
use crate::gcp::http::with_query;
use crate::gcp::operation::wait_operation;
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use std::io::Write;

pub fn ca_pool_name(project: &str, location: &str, ca_pool_id: &str) -> String {
    format!("projects/{}/locations/{}/caPools/{}", project, location, ca_pool_id)
}

pub fn ca_name(project: &str, location: &str, ca_pool_id: &str, ca_id: &str) -> String {
    format!(
        "{}/certificateAuthorities/{}",
        ca_pool_name(project, location, ca_pool_id),
        ca_id
    )
}

/// Fail unless the operation left the CA in `expected` state
fn ensure_state(ca: &Value, expected: &str, verb: &str) -> Result<()> {
    let state = str_field(ca, "state");
    if state != expected {
        anyhow::bail!(
            "unable to {} Certificate Authority. Current state: {}",
            verb,
            state
        );
    }
    Ok(())
}

/// Create a CA pool on the Enterprise tier
pub async fn create_ca_pool(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    ca_pool_id: &str,
) -> Result<Value> {
    let url = with_query(
        &format!(
            "{}/projects/{}/locations/{}/caPools",
            client.privateca_root(),
            project,
            location
        ),
        &[("caPoolId", ca_pool_id)],
    );
    let body = json!({ "tier": "ENTERPRISE" });

    let op = client
        .post(&url, Some(&body))
        .await
        .context("CreateCaPool failed")?;
    let pool = wait_operation(client, &client.privateca_root(), &op)
        .await
        .context("CreateCaPool failed during wait")?;

    write!(w, "CA Pool created")?;
    Ok(pool)
}

/// Delete a CA pool. It must not contain any CA.
pub async fn delete_ca_pool(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    ca_pool_id: &str,
) -> Result<()> {
    let url = format!(
        "{}/{}",
        client.privateca_root(),
        ca_pool_name(project, location, ca_pool_id)
    );
    let op = client.delete(&url).await.context("DeleteCaPool failed")?;
    wait_operation(client, &client.privateca_root(), &op)
        .await
        .context("DeleteCaPool failed during wait")?;

    write!(w, "CA Pool deleted")?;
    Ok(())
}

/// Create a self-signed root CA in a pool
pub async fn create_ca(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    ca_pool_id: &str,
    ca_id: &str,
    ca_common_name: &str,
    org: &str,
    ca_duration_secs: i64,
) -> Result<Value> {
    let url = with_query(
        &format!(
            "{}/{}/certificateAuthorities",
            client.privateca_root(),
            ca_pool_name(project, location, ca_pool_id)
        ),
        &[("certificateAuthorityId", ca_id)],
    );
    let body = json!({
        "type": "SELF_SIGNED",
        "keySpec": { "algorithm": "RSA_PKCS1_2048_SHA256" },
        "config": {
            "subjectConfig": {
                "subject": {
                    "commonName": ca_common_name,
                    "organization": org,
                },
            },
            "x509Config": {
                "keyUsage": {
                    "baseKeyUsage": { "crlSign": true, "certSign": true },
                },
                "caOptions": { "isCa": true },
            },
        },
        "lifetime": format!("{}s", ca_duration_secs),
    });

    let op = client
        .post(&url, Some(&body))
        .await
        .context("CreateCertificateAuthority failed")?;
    let ca = wait_operation(client, &client.privateca_root(), &op)
        .await
        .context("CreateCertificateAuthority failed during wait")?;

    write!(w, "CA {} created", ca_id)?;
    Ok(ca)
}

/// Run a CA state transition (`:enable`, `:disable`, `:undelete`, delete) and check the result
async fn transition_ca(
    client: &GcpClient,
    project: &str,
    location: &str,
    ca_pool_id: &str,
    ca_id: &str,
    action: CaAction,
) -> Result<Value> {
    let name = ca_name(project, location, ca_pool_id, ca_id);
    let base = format!("{}/{}", client.privateca_root(), name);

    let op = match action {
        CaAction::Delete => client.delete(&base).await,
        _ => {
            client
                .post(&format!("{}:{}", base, action.verb()), Some(&json!({})))
                .await
        }
    }
    .with_context(|| format!("{} Certificate Authority failed", action.verb()))?;

    let ca = wait_operation(client, &client.privateca_root(), &op)
        .await
        .with_context(|| format!("{} Certificate Authority failed during wait", action.verb()))?;

    ensure_state(&ca, action.expected_state(), action.verb())?;
    Ok(ca)
}

#[derive(Debug, Clone, Copy)]
enum CaAction {
    Enable,
    Disable,
    Delete,
    Undelete,
}

impl CaAction {
    fn verb(&self) -> &'static str {
        match self {
            CaAction::Enable => "enable",
            CaAction::Disable => "disable",
            CaAction::Delete => "delete",
            CaAction::Undelete => "undelete",
        }
    }

    fn expected_state(&self) -> &'static str {
        match self {
            CaAction::Enable => "ENABLED",
            CaAction::Disable => "DISABLED",
            CaAction::Delete => "DELETED",
            // Undeleted authorities come back disabled
            CaAction::Undelete => "DISABLED",
        }
    }
}

pub async fn enable_ca(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    ca_pool_id: &str,
    ca_id: &str,
) -> Result<Value> {
    let ca = transition_ca(client, project, location, ca_pool_id, ca_id, CaAction::Enable).await?;
    write!(w, "Successfully enabled Certificate Authority: {}.", ca_id)?;
    Ok(ca)
}

pub async fn disable_ca(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    ca_pool_id: &str,
    ca_id: &str,
) -> Result<Value> {
    let ca = transition_ca(client, project, location, ca_pool_id, ca_id, CaAction::Disable).await?;
    write!(w, "Successfully disabled Certificate Authority: {}.", ca_id)?;
    Ok(ca)
}

/// Schedule a CA for deletion. It stays restorable during the grace period.
pub async fn delete_ca(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    ca_pool_id: &str,
    ca_id: &str,
) -> Result<Value> {
    let ca = transition_ca(client, project, location, ca_pool_id, ca_id, CaAction::Delete).await?;
    write!(w, "Successfully deleted Certificate Authority: {}.", ca_id)?;
    Ok(ca)
}

pub async fn undelete_ca(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    ca_pool_id: &str,
    ca_id: &str,
) -> Result<Value> {
    let ca = transition_ca(client, project, location, ca_pool_id, ca_id, CaAction::Undelete).await?;
    write!(w, "Successfully undeleted Certificate Authority: {}.", ca_id)?;
    Ok(ca)
}

/// Issue a server/client certificate for `domain_name` from `ca_id`
pub async fn create_certificate(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    ca_pool_id: &str,
    ca_id: &str,
    cert_id: &str,
    common_name: &str,
    domain_name: &str,
    cert_duration_secs: i64,
    public_key_pem: &[u8],
) -> Result<Value> {
    let url = with_query(
        &format!(
            "{}/{}/certificates",
            client.privateca_root(),
            ca_pool_name(project, location, ca_pool_id)
        ),
        &[
            ("certificateId", cert_id),
            ("issuingCertificateAuthorityId", ca_id),
        ],
    );
    let body = json!({
        "config": {
            "publicKey": {
                "key": STANDARD.encode(public_key_pem),
                "format": "PEM",
            },
            "subjectConfig": {
                "subject": { "commonName": common_name },
                "subjectAltName": { "dnsNames": [domain_name] },
            },
            "x509Config": {
                "keyUsage": {
                    "baseKeyUsage": {
                        "digitalSignature": true,
                        "keyEncipherment": true,
                    },
                    "extendedKeyUsage": {
                        "serverAuth": true,
                        "clientAuth": true,
                    },
                },
            },
        },
        "lifetime": format!("{}s", cert_duration_secs),
    });

    let certificate = client
        .post(&url, Some(&body))
        .await
        .context("CreateCertificate failed")?;

    write!(w, "Certificate {} created", cert_id)?;
    Ok(certificate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ca_names() {
        assert_eq!(
            ca_name("p", "us-central1", "pool", "ca"),
            "projects/p/locations/us-central1/caPools/pool/certificateAuthorities/ca"
        );
    }

    #[test]
    fn test_ensure_state() {
        assert!(ensure_state(&json!({"state": "ENABLED"}), "ENABLED", "enable").is_ok());
        let err = ensure_state(&json!({"state": "STAGED"}), "ENABLED", "enable").unwrap_err();
        assert_eq!(
            err.to_string(),
            "unable to enable Certificate Authority. Current state: STAGED"
        );
    }
}
