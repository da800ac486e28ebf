//! Long-running operations
//!
//! Compute Engine returns its own `Operation` resource which is awaited through
//! the `operations/{op}/wait` endpoint. Every other API used here returns a
//! `google.longrunning.Operation` which is polled by name until `done`.

use super::client::{short_name, str_field, GcpClient};
use anyhow::{Context, Result};
use serde_json::Value;

/// State of an operation after a single poll
#[derive(Debug, Clone, PartialEq)]
pub enum OperationStatus {
    Running,
    Done,
    Failed(String),
    Unknown(String),
}

/// Classify a Compute Engine operation resource
pub fn compute_operation_status(operation: &Value) -> OperationStatus {
    match str_field(operation, "status") {
        "DONE" => match compute_operation_error(operation) {
            Some(error) => OperationStatus::Failed(error),
            None => OperationStatus::Done,
        },
        "PENDING" | "RUNNING" => OperationStatus::Running,
        other => OperationStatus::Unknown(other.to_string()),
    }
}

/// Classify a `google.longrunning.Operation`
pub fn lro_status(operation: &Value) -> OperationStatus {
    let done = operation
        .get("done")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if !done {
        return OperationStatus::Running;
    }
    match operation.get("error") {
        Some(error) => {
            let message = error
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("operation failed without a message");
            OperationStatus::Failed(message.to_string())
        }
        None => OperationStatus::Done,
    }
}

/// Join every message in a Compute `error.errors` list
fn compute_operation_error(operation: &Value) -> Option<String> {
    let errors = operation
        .get("error")
        .and_then(|e| e.get("errors"))
        .and_then(|e| e.as_array())?;

    if errors.is_empty() {
        return None;
    }

    Some(
        errors
            .iter()
            .map(|e| {
                let code = str_field(e, "code");
                let message = str_field(e, "message");
                format!("{}: {}", code, message)
            })
            .collect::<Vec<_>>()
            .join("; "),
    )
}

/// Block until a Compute Engine operation is DONE.
///
/// The scope of the `wait` call (zonal, regional or global) follows the
/// operation's own `zone`/`region` field.
pub async fn wait_compute_operation(
    client: &GcpClient,
    project: &str,
    operation: &Value,
) -> Result<Value> {
    let name = str_field(operation, "name");
    if name.is_empty() {
        anyhow::bail!("Compute operation has no name");
    }

    let wait_path = format!("operations/{}/wait", name);
    let url = match (
        operation.get("zone").and_then(|v| v.as_str()),
        operation.get("region").and_then(|v| v.as_str()),
    ) {
        (Some(zone), _) => client.compute_zonal_url(project, short_name(zone), &wait_path),
        (None, Some(region)) => {
            client.compute_regional_url(project, short_name(region), &wait_path)
        }
        (None, None) => client.compute_global_url(project, &wait_path),
    };

    let mut current = operation.clone();
    loop {
        match compute_operation_status(&current) {
            OperationStatus::Done => return Ok(current),
            OperationStatus::Failed(error) => {
                anyhow::bail!("Operation {} failed: {}", name, error)
            }
            OperationStatus::Running => {}
            OperationStatus::Unknown(s) => {
                anyhow::bail!("Operation {} returned unknown status {:?}", name, s)
            }
        }

        tracing::debug!("Waiting for compute operation {}", name);
        current = client
            .post(&url, None)
            .await
            .with_context(|| format!("Failed to wait for operation {}", name))?;
    }
}

/// Fetch a `google.longrunning.Operation` once and classify it
pub async fn poll_operation(
    client: &GcpClient,
    api_root: &str,
    name: &str,
) -> Result<(OperationStatus, Value)> {
    let url = format!("{}/{}", api_root, name);
    let operation = client.get(&url).await?;
    Ok((lro_status(&operation), operation))
}

/// Poll a `google.longrunning.Operation` until done and return its `response`
pub async fn wait_operation(
    client: &GcpClient,
    api_root: &str,
    operation: &Value,
) -> Result<Value> {
    let name = str_field(operation, "name").to_string();
    let mut current = operation.clone();

    loop {
        match lro_status(&current) {
            OperationStatus::Done => {
                return Ok(current.get("response").cloned().unwrap_or(Value::Null));
            }
            OperationStatus::Failed(error) => {
                anyhow::bail!("Operation {} failed: {}", name, error)
            }
            OperationStatus::Running | OperationStatus::Unknown(_) => {}
        }

        if name.is_empty() {
            anyhow::bail!("Operation is still running but has no name to poll");
        }

        tokio::time::sleep(client.operation_poll_interval).await;
        tracing::debug!("Polling operation {}", name);
        let (_, next) = poll_operation(client, api_root, &name)
            .await
            .with_context(|| format!("Failed to poll operation {}", name))?;
        current = next;
    }
}
