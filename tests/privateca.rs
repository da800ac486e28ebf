//! Certificate Authority Service snippets against a mocked REST API

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use gcp_snippets::gcp::auth::GcpCredentials;
use gcp_snippets::gcp::client::{Endpoints, GcpClient};
use gcp_snippets::privateca;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const POOL: &str = "projects/test-project/locations/us-central1/caPools/my-pool";
const CA: &str = "projects/test-project/locations/us-central1/caPools/my-pool/certificateAuthorities/my-ca";

fn test_client(server: &MockServer) -> GcpClient {
    GcpClient::with_credentials(GcpCredentials::from_static_token("test-token"))
        .unwrap()
        .with_endpoints(Endpoints::with_base(&server.uri()))
        .with_poll_interval(Duration::from_millis(10))
}

fn output(buf: Vec<u8>) -> String {
    String::from_utf8(buf).unwrap()
}

fn done_with(response: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "name": "projects/test-project/locations/us-central1/operations/op-1",
        "done": true,
        "response": response
    }))
}

#[tokio::test]
async fn test_create_ca_pool_waits_for_operation() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/projects/test-project/locations/us-central1/caPools"))
        .and(query_param("caPoolId", "my-pool"))
        .and(body_partial_json(json!({"tier": "ENTERPRISE"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/test-project/locations/us-central1/operations/op-1",
            "done": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/projects/test-project/locations/us-central1/operations/op-1"))
        .respond_with(done_with(json!({"name": POOL})))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut buf = Vec::new();
    let pool = privateca::create_ca_pool(&mut buf, &client, "test-project", "us-central1", "my-pool")
        .await
        .unwrap();

    assert_eq!(pool["name"], POOL);
    assert_eq!(output(buf), "CA Pool created");
}

#[tokio::test]
async fn test_create_self_signed_ca() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/v1/{}/certificateAuthorities", POOL)))
        .and(query_param("certificateAuthorityId", "my-ca"))
        .and(body_partial_json(json!({
            "type": "SELF_SIGNED",
            "keySpec": {"algorithm": "RSA_PKCS1_2048_SHA256"},
            "config": {
                "subjectConfig": {"subject": {"commonName": "My CA", "organization": "Test Org"}},
                "x509Config": {"caOptions": {"isCa": true}}
            },
            "lifetime": "31536000s"
        })))
        .respond_with(done_with(json!({"name": CA, "state": "STAGED"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut buf = Vec::new();
    privateca::create_ca(
        &mut buf,
        &client,
        "test-project",
        "us-central1",
        "my-pool",
        "my-ca",
        "My CA",
        "Test Org",
        31_536_000,
    )
    .await
    .unwrap();

    assert_eq!(output(buf), "CA my-ca created");
}

#[tokio::test]
async fn test_enable_ca_checks_final_state() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/v1/{}:enable", CA)))
        .respond_with(done_with(json!({"name": CA, "state": "ENABLED"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut buf = Vec::new();
    privateca::enable_ca(&mut buf, &client, "test-project", "us-central1", "my-pool", "my-ca")
        .await
        .unwrap();

    assert_eq!(output(buf), "Successfully enabled Certificate Authority: my-ca.");
}

#[tokio::test]
async fn test_disable_ca_unexpected_state_is_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/v1/{}:disable", CA)))
        .respond_with(done_with(json!({"name": CA, "state": "ENABLED"})))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut buf = Vec::new();
    let err = privateca::disable_ca(&mut buf, &client, "test-project", "us-central1", "my-pool", "my-ca")
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "unable to disable Certificate Authority. Current state: ENABLED"
    );
    assert!(buf.is_empty());
}

#[tokio::test]
async fn test_delete_and_undelete_ca() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path(format!("/v1/{}", CA)))
        .respond_with(done_with(json!({"name": CA, "state": "DELETED"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/v1/{}:undelete", CA)))
        .respond_with(done_with(json!({"name": CA, "state": "DISABLED"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);

    let mut buf = Vec::new();
    privateca::delete_ca(&mut buf, &client, "test-project", "us-central1", "my-pool", "my-ca")
        .await
        .unwrap();
    assert_eq!(output(buf), "Successfully deleted Certificate Authority: my-ca.");

    let mut buf = Vec::new();
    privateca::undelete_ca(&mut buf, &client, "test-project", "us-central1", "my-pool", "my-ca")
        .await
        .unwrap();
    assert_eq!(output(buf), "Successfully undeleted Certificate Authority: my-ca.");
}

#[tokio::test]
async fn test_create_certificate_encodes_public_key() {
    let server = MockServer::start().await;
    let public_key = b"-----BEGIN PUBLIC KEY-----\nMIIB\n-----END PUBLIC KEY-----\n";

    Mock::given(method("POST"))
        .and(path(format!("/v1/{}/certificates", POOL)))
        .and(query_param("certificateId", "my-cert"))
        .and(query_param("issuingCertificateAuthorityId", "my-ca"))
        .and(body_partial_json(json!({
            "config": {
                "publicKey": {"key": STANDARD.encode(public_key), "format": "PEM"},
                "subjectConfig": {
                    "subject": {"commonName": "cert-name"},
                    "subjectAltName": {"dnsNames": ["example.com"]}
                }
            },
            "lifetime": "86400s"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": format!("{}/certificates/my-cert", POOL),
            "pemCertificate": "-----BEGIN CERTIFICATE-----"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut buf = Vec::new();
    privateca::create_certificate(
        &mut buf,
        &client,
        "test-project",
        "us-central1",
        "my-pool",
        "my-ca",
        "my-cert",
        "cert-name",
        "example.com",
        86_400,
        public_key,
    )
    .await
    .unwrap();

    assert_eq!(output(buf), "Certificate my-cert created");
}

#[tokio::test]
async fn test_delete_ca_pool() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path(format!("/v1/{}", POOL)))
        .respond_with(done_with(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut buf = Vec::new();
    privateca::delete_ca_pool(&mut buf, &client, "test-project", "us-central1", "my-pool")
        .await
        .unwrap();

    assert_eq!(output(buf), "CA Pool deleted");
}
