use super::{ParameterFormat, ParameterLocation};
use crate::gcp::client::{str_field, GcpClient};
use crate::gcp::http::with_query;
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::io::Write;

/// `format` of a parameter resource; the API omits it for UNFORMATTED
pub fn format_of(parameter: &Value) -> &str {
    match str_field(parameter, "format") {
        "" => "UNFORMATTED",
        format => format,
    }
}

async fn create(
    client: &GcpClient,
    location: &ParameterLocation,
    project: &str,
    parameter_id: &str,
    body: &Value,
) -> Result<Value> {
    let url = with_query(
        &format!("{}/{}/parameters", location.api_root(client), location.parent(project)),
        &[("parameterId", parameter_id)],
    );
    client
        .post(&url, Some(body))
        .await
        .context("failed to create parameter")
}

fn parameter_url(
    client: &GcpClient,
    location: &ParameterLocation,
    project: &str,
    parameter_id: &str,
) -> String {
    format!(
        "{}/{}",
        location.api_root(client),
        location.parameter_name(project, parameter_id)
    )
}

/// Unformatted parameter
pub async fn create_param(
    w: &mut impl Write,
    client: &GcpClient,
    location: &ParameterLocation,
    project: &str,
    parameter_id: &str,
) -> Result<Value> {
    let parameter = create(client, location, project, parameter_id, &json!({})).await?;
    writeln!(w, "Created {}: {}", location.kind(), str_field(&parameter, "name"))?;
    Ok(parameter)
}

/// Parameter whose versions must parse as `format`
pub async fn create_structured_param(
    w: &mut impl Write,
    client: &GcpClient,
    location: &ParameterLocation,
    project: &str,
    parameter_id: &str,
    format: ParameterFormat,
) -> Result<Value> {
    let body = json!({ "format": format.as_str() });
    let parameter = create(client, location, project, parameter_id, &body).await?;
    writeln!(
        w,
        "Created {} {} with format {}",
        location.kind(),
        str_field(&parameter, "name"),
        format_of(&parameter)
    )?;
    Ok(parameter)
}

/// Parameter encrypted with a customer-managed Cloud KMS key
pub async fn create_param_with_kms_key(
    w: &mut impl Write,
    client: &GcpClient,
    location: &ParameterLocation,
    project: &str,
    parameter_id: &str,
    kms_key: &str,
) -> Result<Value> {
    let body = json!({ "kmsKey": kms_key });
    let parameter = create(client, location, project, parameter_id, &body).await?;
    writeln!(
        w,
        "Created {} {} with kms_key {}",
        location.kind(),
        str_field(&parameter, "name"),
        str_field(&parameter, "kmsKey")
    )?;
    Ok(parameter)
}

pub async fn update_param_kms_key(
    w: &mut impl Write,
    client: &GcpClient,
    location: &ParameterLocation,
    project: &str,
    parameter_id: &str,
    kms_key: &str,
) -> Result<Value> {
    let url = with_query(
        &parameter_url(client, location, project, parameter_id),
        &[("updateMask", "kms_key")],
    );
    let parameter = client
        .patch(&url, &json!({ "kmsKey": kms_key }))
        .await
        .context("failed to update parameter")?;

    writeln!(
        w,
        "Updated {} {} with kms_key {}",
        location.kind(),
        str_field(&parameter, "name"),
        str_field(&parameter, "kmsKey")
    )?;
    Ok(parameter)
}

pub async fn remove_param_kms_key(
    w: &mut impl Write,
    client: &GcpClient,
    location: &ParameterLocation,
    project: &str,
    parameter_id: &str,
) -> Result<Value> {
    let url = with_query(
        &parameter_url(client, location, project, parameter_id),
        &[("updateMask", "kms_key")],
    );
    let parameter = client
        .patch(&url, &json!({}))
        .await
        .context("failed to update parameter")?;

    writeln!(
        w,
        "Removed kms_key for {} {}",
        location.kind(),
        str_field(&parameter, "name")
    )?;
    Ok(parameter)
}

pub async fn get_param(
    w: &mut impl Write,
    client: &GcpClient,
    location: &ParameterLocation,
    project: &str,
    parameter_id: &str,
) -> Result<Value> {
    let parameter = client
        .get(&parameter_url(client, location, project, parameter_id))
        .await
        .context("failed to get parameter")?;

    writeln!(
        w,
        "Found {} {} with format {}",
        location.kind(),
        str_field(&parameter, "name"),
        format_of(&parameter)
    )?;
    Ok(parameter)
}

pub async fn list_params(
    w: &mut impl Write,
    client: &GcpClient,
    location: &ParameterLocation,
    project: &str,
) -> Result<Vec<Value>> {
    let url = format!("{}/{}/parameters", location.api_root(client), location.parent(project));
    let parameters = client
        .list_all(&url, "parameters")
        .await
        .context("failed to list parameters")?;

    for parameter in &parameters {
        writeln!(
            w,
            "Found {} {} with format {} ",
            location.kind(),
            str_field(parameter, "name"),
            format_of(parameter)
        )?;
    }
    Ok(parameters)
}

pub async fn delete_param(
    w: &mut impl Write,
    client: &GcpClient,
    location: &ParameterLocation,
    project: &str,
    parameter_id: &str,
) -> Result<()> {
    let name = location.parameter_name(project, parameter_id);
    client
        .delete(&parameter_url(client, location, project, parameter_id))
        .await
        .context("failed to delete parameter")?;

    writeln!(w, "Deleted {} {}", location.kind(), name)?;
    Ok(())
}
