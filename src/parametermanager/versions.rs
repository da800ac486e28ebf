use super::ParameterLocation;
use crate::gcp::client::{str_field, GcpClient};
use crate::gcp::http::with_query;
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use std::io::Write;

fn version_url(
    client: &GcpClient,
    location: &ParameterLocation,
    project: &str,
    parameter_id: &str,
    version_id: &str,
) -> String {
    format!(
        "{}/{}",
        location.api_root(client),
        location.version_name(project, parameter_id, version_id)
    )
}

async fn create(
    client: &GcpClient,
    location: &ParameterLocation,
    project: &str,
    parameter_id: &str,
    version_id: &str,
    payload: &[u8],
) -> Result<Value> {
    let url = with_query(
        &format!(
            "{}/{}/versions",
            location.api_root(client),
            location.parameter_name(project, parameter_id)
        ),
        &[("parameterVersionId", version_id)],
    );
    let body = json!({
        "payload": { "data": STANDARD.encode(payload) },
    });
    client
        .post(&url, Some(&body))
        .await
        .context("failed to create parameter version")
}

/// Version with an opaque payload
pub async fn create_param_version(
    w: &mut impl Write,
    client: &GcpClient,
    location: &ParameterLocation,
    project: &str,
    parameter_id: &str,
    version_id: &str,
    payload: &str,
) -> Result<Value> {
    let version = create(
        client,
        location,
        project,
        parameter_id,
        version_id,
        payload.as_bytes(),
    )
    .await?;
    writeln!(w, "Created {} version: {}", location.kind(), str_field(&version, "name"))?;
    Ok(version)
}

/// Version of a JSON parameter; `payload` is serialized as-is
pub async fn create_structured_param_version(
    w: &mut impl Write,
    client: &GcpClient,
    location: &ParameterLocation,
    project: &str,
    parameter_id: &str,
    version_id: &str,
    payload: &Value,
) -> Result<Value> {
    let data = serde_json::to_vec(payload).context("failed to encode payload")?;
    let version = create(client, location, project, parameter_id, version_id, &data).await?;
    writeln!(w, "Created {} version: {}", location.kind(), str_field(&version, "name"))?;
    Ok(version)
}

/// Payload that resolves a Secret Manager version when rendered
pub fn secret_reference_payload(secret_version: &str) -> String {
    json!({
        "username": "test-user",
        "password": format!("__REF__(//secretmanager.googleapis.com/{})", secret_version),
    })
    .to_string()
}

pub async fn create_param_version_with_secret(
    w: &mut impl Write,
    client: &GcpClient,
    location: &ParameterLocation,
    project: &str,
    parameter_id: &str,
    version_id: &str,
    secret_version: &str,
) -> Result<Value> {
    let payload = secret_reference_payload(secret_version);
    let version = create(
        client,
        location,
        project,
        parameter_id,
        version_id,
        payload.as_bytes(),
    )
    .await?;
    writeln!(
        w,
        "Created {} version with secret reference: {}",
        location.kind(),
        str_field(&version, "name")
    )?;
    Ok(version)
}

fn is_disabled(version: &Value) -> bool {
    version
        .get("disabled")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

pub async fn get_param_version(
    w: &mut impl Write,
    client: &GcpClient,
    location: &ParameterLocation,
    project: &str,
    parameter_id: &str,
    version_id: &str,
) -> Result<Value> {
    let version = client
        .get(&version_url(client, location, project, parameter_id, version_id))
        .await
        .context("failed to get parameter version")?;

    writeln!(
        w,
        "Found {} version {} with disabled state in {}",
        location.kind(),
        str_field(&version, "name"),
        is_disabled(&version)
    )?;
    Ok(version)
}

pub async fn list_param_versions(
    w: &mut impl Write,
    client: &GcpClient,
    location: &ParameterLocation,
    project: &str,
    parameter_id: &str,
) -> Result<Vec<Value>> {
    let url = format!(
        "{}/{}/versions",
        location.api_root(client),
        location.parameter_name(project, parameter_id)
    );
    let versions = client
        .list_all(&url, "parameterVersions")
        .await
        .context("failed to list parameter versions")?;

    for version in &versions {
        writeln!(
            w,
            "Found {} version {} with disabled state in {}",
            location.kind(),
            str_field(version, "name"),
            is_disabled(version)
        )?;
    }
    Ok(versions)
}

/// Resolve secret references and return the rendered payload
pub async fn render_param_version(
    w: &mut impl Write,
    client: &GcpClient,
    location: &ParameterLocation,
    project: &str,
    parameter_id: &str,
    version_id: &str,
) -> Result<String> {
    let url = format!(
        "{}:render",
        version_url(client, location, project, parameter_id, version_id)
    );
    let response = client
        .get(&url)
        .await
        .context("failed to render parameter version")?;

    let rendered = STANDARD
        .decode(str_field(&response, "renderedPayload"))
        .context("rendered payload is not valid base64")?;
    let rendered = String::from_utf8_lossy(&rendered).into_owned();

    writeln!(
        w,
        "Rendered {} version: {}",
        location.kind(),
        str_field(&response, "parameterVersion")
    )?;
    writeln!(w, "Rendered payload: {}", rendered)?;
    Ok(rendered)
}

async fn set_disabled(
    client: &GcpClient,
    location: &ParameterLocation,
    project: &str,
    parameter_id: &str,
    version_id: &str,
    disabled: bool,
) -> Result<Value> {
    let url = with_query(
        &version_url(client, location, project, parameter_id, version_id),
        &[("updateMask", "disabled")],
    );
    client
        .patch(&url, &json!({ "disabled": disabled }))
        .await
        .context("failed to update parameter version")
}

pub async fn enable_param_version(
    w: &mut impl Write,
    client: &GcpClient,
    location: &ParameterLocation,
    project: &str,
    parameter_id: &str,
    version_id: &str,
) -> Result<Value> {
    let version = set_disabled(client, location, project, parameter_id, version_id, false).await?;
    writeln!(w, "Enabled {} version {}", location.kind(), str_field(&version, "name"))?;
    Ok(version)
}

pub async fn disable_param_version(
    w: &mut impl Write,
    client: &GcpClient,
    location: &ParameterLocation,
    project: &str,
    parameter_id: &str,
    version_id: &str,
) -> Result<Value> {
    let version = set_disabled(client, location, project, parameter_id, version_id, true).await?;
    writeln!(w, "Disabled {} version {}", location.kind(), str_field(&version, "name"))?;
    Ok(version)
}

pub async fn delete_param_version(
    w: &mut impl Write,
    client: &GcpClient,
    location: &ParameterLocation,
    project: &str,
    parameter_id: &str,
    version_id: &str,
) -> Result<()> {
    client
        .delete(&version_url(client, location, project, parameter_id, version_id))
        .await
        .context("failed to delete parameter version")?;

    writeln!(
        w,
        "Deleted {} version {}",
        location.kind(),
        location.version_name(project, parameter_id, version_id)
    )?;
    Ok(())
}
