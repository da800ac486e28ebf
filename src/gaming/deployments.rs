use super::deployment_name;
use crate::gcp::client::{str_field, GcpClient};
use crate::gcp::http::with_query;
use crate::gcp::operation::wait_operation;
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::io::Write;

pub async fn create_game_server_deployment(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    deployment_id: &str,
) -> Result<Value> {
    let parent = format!("projects/{}/locations/global", project);
    let url = with_query(
        &format!("{}/{}/gameServerDeployments", client.gameservices_root(), parent),
        &[("deploymentId", deployment_id)],
    );
    let body = json!({ "description": "My Game Server Deployment" });

    let op = client
        .post(&url, Some(&body))
        .await
        .context("CreateGameServerDeployment")?;
    let deployment = wait_operation(client, &client.gameservices_root(), &op)
        .await
        .context("Wait")?;

    write!(w, "Deployment created: {}", str_field(&deployment, "name"))?;
    Ok(deployment)
}

pub async fn get_game_server_deployment(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    deployment_id: &str,
) -> Result<Value> {
    let url = format!(
        "{}/{}",
        client.gameservices_root(),
        deployment_name(project, deployment_id)
    );
    let deployment = client.get(&url).await.context("GetGameServerDeployment")?;

    write!(w, "Deployment retrieved: {}", str_field(&deployment, "name"))?;
    Ok(deployment)
}

pub async fn list_game_server_deployments(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
) -> Result<Vec<Value>> {
    let url = format!(
        "{}/projects/{}/locations/global/gameServerDeployments",
        client.gameservices_root(),
        project
    );
    let deployments = client
        .list_all(&url, "gameServerDeployments")
        .await
        .context("ListGameServerDeployments")?;

    for deployment in &deployments {
        writeln!(w, "Deployment listed: {}", str_field(deployment, "name"))?;
    }
    Ok(deployments)
}

pub async fn delete_game_server_deployment(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    deployment_id: &str,
) -> Result<()> {
    let url = format!(
        "{}/{}",
        client.gameservices_root(),
        deployment_name(project, deployment_id)
    );
    let op = client
        .delete(&url)
        .await
        .context("DeleteGameServerDeployment")?;
    wait_operation(client, &client.gameservices_root(), &op)
        .await
        .context("Wait")?;

    write!(w, "Deployment deleted.")?;
    Ok(())
}
