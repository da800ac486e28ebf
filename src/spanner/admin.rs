//! Database admin calls: creation and schema updates

use crate::gcp::client::GcpClient;
use crate::gcp::operation::wait_operation;
use anyhow::{Context, Result};
use regex::Regex;
use serde_json::{json, Value};
use tracing::info;

/// Split `projects/p/instances/i/databases/d` into the instance and database id
pub fn parse_database_name(db: &str) -> Result<(&str, &str)> {
    let re = Regex::new(r"^(.*)/databases/(.*)$").context("invalid database name pattern")?;
    let caps = re
        .captures(db)
        .with_context(|| format!("Invalid database id {}", db))?;
    match (caps.get(1), caps.get(2)) {
        (Some(instance), Some(id)) => Ok((instance.as_str(), id.as_str())),
        _ => anyhow::bail!("Invalid database id {}", db),
    }
}

/// Create `db` with the given schema and wait for it to be ready
pub async fn create_database(
    client: &GcpClient,
    db: &str,
    extra_statements: &[&str],
) -> Result<Value> {
    let (instance, database_id) = parse_database_name(db)?;

    let url = format!("{}/{}/databases", client.spanner_root(), instance);
    let body = json!({
        "createStatement": format!("CREATE DATABASE `{}`", database_id),
        "extraStatements": extra_statements,
    });

    let op = client
        .post(&url, Some(&body))
        .await
        .context("CreateDatabase")?;
    let database = wait_operation(client, &client.spanner_root(), &op).await?;

    info!("Created database {}", db);
    Ok(database)
}

/// Apply DDL statements to an existing database and wait for completion
pub async fn update_database_ddl(client: &GcpClient, db: &str, statements: &[&str]) -> Result<()> {
    let url = format!("{}/{}/ddl", client.spanner_root(), db);
    let op = client
        .patch(&url, &json!({ "statements": statements }))
        .await
        .context("UpdateDatabaseDdl")?;
    wait_operation(client, &client.spanner_root(), &op).await?;

    info!("Updated schema of {}", db);
    Ok(())
}
