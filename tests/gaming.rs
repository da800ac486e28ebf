//! Game Servers snippets against a mocked REST API

use gcp_snippets::gaming;
use gcp_snippets::gcp::auth::GcpCredentials;
use gcp_snippets::gcp::client::{Endpoints, GcpClient};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DEPLOYMENTS: &str = "/v1/projects/test-project/locations/global/gameServerDeployments";
const DEPLOYMENT_NAME: &str = "projects/test-project/locations/global/gameServerDeployments/my-deployment";

fn test_client(server: &MockServer) -> GcpClient {
    GcpClient::with_credentials(GcpCredentials::from_static_token("test-token"))
        .unwrap()
        .with_endpoints(Endpoints::with_base(&server.uri()))
        .with_poll_interval(Duration::from_millis(10))
}

fn output(buf: Vec<u8>) -> String {
    String::from_utf8(buf).unwrap()
}

#[tokio::test]
async fn test_create_deployment_polls_operation() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(DEPLOYMENTS))
        .and(query_param("deploymentId", "my-deployment"))
        .and(body_partial_json(json!({"description": "My Game Server Deployment"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/test-project/locations/global/operations/op-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/projects/test-project/locations/global/operations/op-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/test-project/locations/global/operations/op-1",
            "done": true,
            "response": {"name": DEPLOYMENT_NAME}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut buf = Vec::new();
    gaming::create_game_server_deployment(&mut buf, &client, "test-project", "my-deployment")
        .await
        .unwrap();

    assert_eq!(output(buf), format!("Deployment created: {}", DEPLOYMENT_NAME));
}

#[tokio::test]
async fn test_create_deployment_operation_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(DEPLOYMENTS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/test-project/locations/global/operations/op-2",
            "done": true,
            "error": {"code": 6, "message": "already exists"}
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut buf = Vec::new();
    let err = gaming::create_game_server_deployment(&mut buf, &client, "test-project", "my-deployment")
        .await
        .unwrap_err();

    assert!(format!("{:#}", err).contains("already exists"));
    assert!(buf.is_empty());
}

#[tokio::test]
async fn test_get_and_delete_deployment() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/{}", DEPLOYMENT_NAME)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": DEPLOYMENT_NAME})))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path(format!("/v1/{}", DEPLOYMENT_NAME)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/test-project/locations/global/operations/op-3",
            "done": true,
            "response": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);

    let mut buf = Vec::new();
    gaming::get_game_server_deployment(&mut buf, &client, "test-project", "my-deployment")
        .await
        .unwrap();
    assert_eq!(output(buf), format!("Deployment retrieved: {}", DEPLOYMENT_NAME));

    let mut buf = Vec::new();
    gaming::delete_game_server_deployment(&mut buf, &client, "test-project", "my-deployment")
        .await
        .unwrap();
    assert_eq!(output(buf), "Deployment deleted.");
}

#[tokio::test]
async fn test_list_deployments() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DEPLOYMENTS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "gameServerDeployments": [{"name": "d1"}, {"name": "d2"}]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut buf = Vec::new();
    gaming::list_game_server_deployments(&mut buf, &client, "test-project")
        .await
        .unwrap();

    assert_eq!(output(buf), "Deployment listed: d1\nDeployment listed: d2\n");
}

#[tokio::test]
async fn test_create_config_sends_fleet_spec() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/v1/{}/configs", DEPLOYMENT_NAME)))
        .and(query_param("configId", "my-config"))
        .and(body_partial_json(json!({
            "description": "My Game Server Config",
            "fleetConfigs": [{"name": "fleet-spec-1"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "op-4",
            "done": true,
            "response": {"name": format!("{}/configs/my-config", DEPLOYMENT_NAME)}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut buf = Vec::new();
    gaming::create_game_server_config(&mut buf, &client, "test-project", "my-deployment", "my-config")
        .await
        .unwrap();

    assert_eq!(
        output(buf),
        format!("Config created: {}/configs/my-config", DEPLOYMENT_NAME)
    );

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let spec: serde_json::Value =
        serde_json::from_str(body["fleetConfigs"][0]["fleetSpec"].as_str().unwrap()).unwrap();
    assert_eq!(spec["replicas"], 10);
}

#[tokio::test]
async fn test_list_configs() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/{}/configs", DEPLOYMENT_NAME)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "gameServerConfigs": [{"name": "c1"}]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut buf = Vec::new();
    gaming::list_game_server_configs(&mut buf, &client, "test-project", "my-deployment")
        .await
        .unwrap();

    assert_eq!(output(buf), "Config listed: c1\n");
}

#[tokio::test]
async fn test_get_rollout_prints_overrides() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/{}/rollout", DEPLOYMENT_NAME)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "defaultGameServerConfig": "cfg-default",
            "gameServerConfigOverrides": [{
                "realmsSelector": {"realms": ["realm-a"]},
                "configVersion": "cfg-override"
            }]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut buf = Vec::new();
    gaming::get_game_server_deployment_rollout(&mut buf, &client, "test-project", "my-deployment")
        .await
        .unwrap();

    assert_eq!(
        output(buf),
        "Rollout default: cfg-default\nOverride these realms [realm-a]with this config: cfg-override\n"
    );
}

#[tokio::test]
async fn test_update_rollout_override_uses_field_mask() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path(format!("/v1/{}/rollout", DEPLOYMENT_NAME)))
        .and(query_param("updateMask", "game_server_config_overrides"))
        .and(body_partial_json(json!({
            "name": format!("{}/rollout", DEPLOYMENT_NAME),
            "gameServerConfigOverrides": [{
                "realmsSelector": {"realms": ["projects/test-project/locations/us-central1/realms/my-realm"]},
                "configVersion": format!("{}/configs/my-config", DEPLOYMENT_NAME)
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "op-5",
            "done": true,
            "response": {"name": DEPLOYMENT_NAME}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut buf = Vec::new();
    gaming::update_rollout_override_config(
        &mut buf,
        &client,
        "test-project",
        "us-central1",
        "my-realm",
        "my-deployment",
        "my-config",
    )
    .await
    .unwrap();

    assert_eq!(output(buf), format!("Deployment rollout updated: {}", DEPLOYMENT_NAME));
}

#[tokio::test]
async fn test_clear_default_config() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path(format!("/v1/{}/rollout", DEPLOYMENT_NAME)))
        .and(query_param("updateMask", "default_game_server_config"))
        .and(body_partial_json(json!({"defaultGameServerConfig": ""})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "op-6",
            "done": true,
            "response": {"name": DEPLOYMENT_NAME}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut buf = Vec::new();
    gaming::update_rollout_clear_default_config(&mut buf, &client, "test-project", "my-deployment")
        .await
        .unwrap();

    assert_eq!(output(buf), format!("Deployment rollout updated: {}", DEPLOYMENT_NAME));
}
