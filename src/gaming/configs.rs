use super::{config_name, deployment_name};
use crate::gcp::client::{str_field, GcpClient};
use crate::gcp::http::with_query;
use crate::gcp::operation::wait_operation;
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::io::Write;

/// Agones fleet spec shipped with every new config
const FLEET_SPEC_YAML: &str = r#"
replicas: 10
scheduling: Packed
strategy:
  type: RollingUpdate
  rollingUpdate:
    maxSurge: 25%
    maxUnavailable: 25%
template:
  metadata:
    labels:
      gameName: udp-server
  spec:
    ports:
    - name: default
      portPolicy: Dynamic
      containerPort: 7654
      protocol: UDP
    health:
      initialDelaySeconds: 30
      periodSeconds: 60
    sdkServer:
      logLevel: Info
      grpcPort: 9357
      httpPort: 9358
    template:
      spec:
        containers:
        - name: dedicated
          image: gcr.io/agones-images/udp-server:0.21
          imagePullPolicy: Always
          resources:
            requests:
              memory: 200Mi
              cpu: 500m
            limits:
              memory: 200Mi
              cpu: 500m
"#;

/// The API takes fleet specs as JSON strings
pub fn fleet_spec_json() -> Result<String> {
    let spec: serde_yaml::Value =
        serde_yaml::from_str(FLEET_SPEC_YAML).context("invalid fleet spec")?;
    serde_json::to_string(&spec).context("failed to encode fleet spec")
}

pub async fn create_game_server_config(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    deployment_id: &str,
    config_id: &str,
) -> Result<Value> {
    let url = with_query(
        &format!(
            "{}/{}/configs",
            client.gameservices_root(),
            deployment_name(project, deployment_id)
        ),
        &[("configId", config_id)],
    );
    let body = json!({
        "description": "My Game Server Config",
        "fleetConfigs": [{
            "name": "fleet-spec-1",
            "fleetSpec": fleet_spec_json()?,
        }],
    });

    let op = client
        .post(&url, Some(&body))
        .await
        .context("CreateGameServerConfig")?;
    let config = wait_operation(client, &client.gameservices_root(), &op)
        .await
        .context("Wait")?;

    write!(w, "Config created: {}", str_field(&config, "name"))?;
    Ok(config)
}

pub async fn get_game_server_config(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    deployment_id: &str,
    config_id: &str,
) -> Result<Value> {
    let url = format!(
        "{}/{}",
        client.gameservices_root(),
        config_name(project, deployment_id, config_id)
    );
    let config = client.get(&url).await.context("GetGameServerConfig")?;

    write!(w, "Config retrieved: {}", str_field(&config, "name"))?;
    Ok(config)
}

pub async fn list_game_server_configs(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    deployment_id: &str,
) -> Result<Vec<Value>> {
    let url = format!(
        "{}/{}/configs",
        client.gameservices_root(),
        deployment_name(project, deployment_id)
    );
    let configs = client
        .list_all(&url, "gameServerConfigs")
        .await
        .context("ListGameServerConfigs")?;

    for config in &configs {
        writeln!(w, "Config listed: {}", str_field(config, "name"))?;
    }
    Ok(configs)
}

pub async fn delete_game_server_config(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    deployment_id: &str,
    config_id: &str,
) -> Result<()> {
    let url = format!(
        "{}/{}",
        client.gameservices_root(),
        config_name(project, deployment_id, config_id)
    );
    let op = client.delete(&url).await.context("DeleteGameServerConfig")?;
    wait_operation(client, &client.gameservices_root(), &op)
        .await
        .context("Wait")?;

    write!(w, "Config deleted.")?;
    Ok(())
}
