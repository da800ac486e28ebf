use crate::gcp::auth::GcpCredentials;
use crate::gcp::client::{str_field, Endpoints, GcpClient};
use crate::gcp::http::with_query;
use anyhow::{Context, Result};
use serde_json::Value;
use std::io::Write;

async fn list_buckets(w: &mut impl Write, client: &GcpClient, project: &str) -> Result<Vec<Value>> {
    let url = with_query(&client.storage_url("b"), &[("project", project)]);
    let buckets = client
        .list_all(&url, "items")
        .await
        .context("Bucket iterator")?;

    for bucket in &buckets {
        writeln!(w, "Bucket: {}", str_field(bucket, "name"))?;
    }
    writeln!(w, "Listed all storage buckets.")?;
    Ok(buckets)
}

/// List buckets with whatever credentials the environment provides.
///
/// The client already carries ADC, so nothing is configured here.
pub async fn authenticate_implicit_with_adc(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
) -> Result<Vec<Value>> {
    list_buckets(w, client, project).await
}

/// Resolve ADC by hand, then list buckets with the resulting client
pub async fn authenticate_explicit_with_adc(
    w: &mut impl Write,
    endpoints: &Endpoints,
    project: &str,
) -> Result<Vec<Value>> {
    let provider = gcp_auth::provider()
        .await
        .context("failed to find default credentials")?;
    let credentials = GcpCredentials::from_provider(provider);

    if let Some(detected) = credentials.project_id().await {
        tracing::debug!("Default credentials belong to project {}", detected);
    }

    let client = GcpClient::with_credentials(credentials)?.with_endpoints(endpoints.clone());
    list_buckets(w, &client, project).await
}
