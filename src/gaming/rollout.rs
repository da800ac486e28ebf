use super::{config_name, deployment_name, realm_name};
use crate::gcp::client::{str_field, GcpClient};
use crate::gcp::http::with_query;
use crate::gcp::operation::wait_operation;
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::io::Write;

/// Render a rollout as its default line plus one line per override
pub fn format_rollout(rollout: &Value) -> String {
    let mut out = format!(
        "Rollout default: {}\n",
        str_field(rollout, "defaultGameServerConfig")
    );

    let overrides = rollout
        .get("gameServerConfigOverrides")
        .and_then(|v| v.as_array());
    for config_override in overrides.into_iter().flatten() {
        let realms: Vec<&str> = config_override
            .get("realmsSelector")
            .and_then(|s| s.get("realms"))
            .and_then(|r| r.as_array())
            .map(|realms| realms.iter().filter_map(|r| r.as_str()).collect())
            .unwrap_or_default();
        out.push_str(&format!(
            "Override these realms [{}]with this config: {}\n",
            realms.join(" "),
            str_field(config_override, "configVersion")
        ));
    }
    out
}

pub async fn get_game_server_deployment_rollout(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    deployment_id: &str,
) -> Result<Value> {
    let url = format!(
        "{}/{}/rollout",
        client.gameservices_root(),
        deployment_name(project, deployment_id)
    );
    let rollout = client
        .get(&url)
        .await
        .context("GetGameServerDeploymentRollout")?;

    write!(w, "{}", format_rollout(&rollout))?;
    Ok(rollout)
}

/// PATCH the rollout with a field mask and wait for the operation
async fn update_rollout(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    deployment_id: &str,
    update_mask: &str,
    mut rollout: Value,
) -> Result<Value> {
    let deployment = deployment_name(project, deployment_id);
    rollout["name"] = Value::String(format!("{}/rollout", deployment));

    let url = with_query(
        &format!("{}/{}/rollout", client.gameservices_root(), deployment),
        &[("updateMask", update_mask)],
    );
    let op = client
        .patch(&url, &rollout)
        .await
        .context("UpdateGameServerDeploymentRollout")?;
    let updated = wait_operation(client, &client.gameservices_root(), &op)
        .await
        .context("Wait")?;

    write!(w, "Deployment rollout updated: {}", str_field(&updated, "name"))?;
    Ok(updated)
}

pub async fn update_rollout_default_config(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    deployment_id: &str,
    config_id: &str,
) -> Result<Value> {
    let rollout = json!({
        "defaultGameServerConfig": config_name(project, deployment_id, config_id),
    });
    update_rollout(w, client, project, deployment_id, "default_game_server_config", rollout).await
}

pub async fn update_rollout_clear_default_config(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    deployment_id: &str,
) -> Result<Value> {
    let rollout = json!({ "defaultGameServerConfig": "" });
    update_rollout(w, client, project, deployment_id, "default_game_server_config", rollout).await
}

/// Run `config_id` in one realm instead of the default
pub async fn update_rollout_override_config(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    realm_location: &str,
    realm_id: &str,
    deployment_id: &str,
    config_id: &str,
) -> Result<Value> {
    let rollout = json!({
        "gameServerConfigOverrides": [{
            "realmsSelector": {
                "realms": [realm_name(project, realm_location, realm_id)],
            },
            "configVersion": config_name(project, deployment_id, config_id),
        }],
    });
    update_rollout(w, client, project, deployment_id, "game_server_config_overrides", rollout).await
}

pub async fn update_rollout_clear_override_config(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    deployment_id: &str,
) -> Result<Value> {
    let rollout = json!({ "gameServerConfigOverrides": [] });
    update_rollout(w, client, project, deployment_id, "game_server_config_overrides", rollout).await
}
