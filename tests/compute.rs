//! Compute Engine snippets against a mocked REST API

use gcp_snippets::compute::{address, instances, CpuSeries, IpType};
use gcp_snippets::gcp::auth::GcpCredentials;
use gcp_snippets::gcp::client::{Endpoints, GcpClient};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{bearer_token, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ZONAL: &str = "/compute/v1/projects/test-project/zones/us-central1-a";
const REGIONAL: &str = "/compute/v1/projects/test-project/regions/us-central1";
const GLOBAL: &str = "/compute/v1/projects/test-project/global";

fn test_client(server: &MockServer) -> GcpClient {
    GcpClient::with_credentials(GcpCredentials::from_static_token("test-token"))
        .unwrap()
        .with_endpoints(Endpoints::with_base(&server.uri()))
        .with_poll_interval(Duration::from_millis(10))
}

fn done_zonal_op() -> Value {
    json!({
        "name": "operation-1",
        "status": "DONE",
        "zone": "https://compute.googleapis.com/compute/v1/projects/test-project/zones/us-central1-a"
    })
}

fn output(buf: Vec<u8>) -> String {
    String::from_utf8(buf).unwrap()
}

mod address_tests {
    use super::*;

    #[tokio::test]
    async fn test_reserve_regional_premium_address() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(format!("{}/addresses", REGIONAL)))
            .and(bearer_token("test-token"))
            .and(body_partial_json(json!({"name": "my-ip", "networkTier": "PREMIUM"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operation-2",
                "status": "DONE",
                "region": "regions/us-central1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{}/addresses/my-ip", REGIONAL)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"name": "my-ip", "address": "34.1.2.3"})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut buf = Vec::new();
        address::reserve_new_regional_external(
            &mut buf,
            &client,
            "test-project",
            "us-central1",
            "my-ip",
            true,
        )
        .await
        .unwrap();

        assert_eq!(output(buf), "Regional address my-ip reserved: 34.1.2.3\n");
    }

    #[tokio::test]
    async fn test_reserve_global_waits_for_running_operation() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(format!("{}/addresses", GLOBAL)))
            .and(body_partial_json(json!({"ipVersion": "IPV6"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"name": "operation-3", "status": "RUNNING"})),
            )
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(format!("{}/operations/operation-3/wait", GLOBAL)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"name": "operation-3", "status": "DONE"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{}/addresses/v6-ip", GLOBAL)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"name": "v6-ip", "address": "2600:1901::"})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut buf = Vec::new();
        address::reserve_new_global_external(&mut buf, &client, "test-project", "v6-ip", true)
            .await
            .unwrap();

        assert_eq!(output(buf), "Global address v6-ip reserved: 2600:1901::\n");
    }

    #[tokio::test]
    async fn test_operation_without_status_stops_waiting() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(format!("{}/addresses", GLOBAL)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"name": "operation-7", "status": "RUNNING"})),
            )
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(format!("{}/operations/operation-7/wait", GLOBAL)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "operation-7"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut buf = Vec::new();
        let err =
            address::reserve_new_global_external(&mut buf, &client, "test-project", "v4-ip", false)
                .await
                .unwrap_err();

        assert!(format!("{:#}", err).contains("Operation operation-7 returned unknown status \"\""));
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_list_regional_external_follows_pages() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{}/addresses", REGIONAL)))
            .and(query_param("filter", "addressType=EXTERNAL"))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "ip-b", "address": "34.0.0.2"}]
            })))
            .with_priority(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{}/addresses", REGIONAL)))
            .and(query_param("filter", "addressType=EXTERNAL"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "ip-a", "address": "34.0.0.1"}],
                "nextPageToken": "page-2"
            })))
            .with_priority(2)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut buf = Vec::new();
        let addresses =
            address::list_regional_external(&mut buf, &client, "test-project", "us-central1")
                .await
                .unwrap();

        assert_eq!(addresses.len(), 2);
        assert_eq!(output(buf), "ip-a 34.0.0.1\nip-b 34.0.0.2\n");
    }

    #[tokio::test]
    async fn test_release_global_address() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path(format!("{}/addresses/old-ip", GLOBAL)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"name": "operation-4", "status": "DONE"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut buf = Vec::new();
        address::release_global_static_external(&mut buf, &client, "test-project", "old-ip")
            .await
            .unwrap();

        assert_eq!(output(buf), "Static external IP address released\n");
    }

    #[tokio::test]
    async fn test_promote_ephemeral_address() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(format!("{}/addresses", REGIONAL)))
            .and(body_partial_json(json!({
                "name": "promoted",
                "address": "35.1.1.1",
                "addressType": "EXTERNAL"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operation-5",
                "status": "DONE",
                "region": "regions/us-central1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut buf = Vec::new();
        address::promote_ephemeral_address(
            &mut buf,
            &client,
            "test-project",
            "us-central1",
            "35.1.1.1",
            "promoted",
        )
        .await
        .unwrap();

        assert_eq!(
            output(buf),
            "Ephemeral IP 35.1.1.1 address promoted successfully\n"
        );
    }

    #[tokio::test]
    async fn test_assign_static_address_replaces_access_config() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{}/instances/vm-1", ZONAL)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "vm-1",
                "networkInterfaces": [{
                    "name": "nic0",
                    "accessConfigs": [{"name": "External NAT", "natIP": "34.9.9.9"}]
                }]
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(format!("{}/instances/vm-1/deleteAccessConfig", ZONAL)))
            .and(query_param("accessConfig", "External NAT"))
            .and(query_param("networkInterface", "nic0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(done_zonal_op()))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(format!("{}/instances/vm-1/addAccessConfig", ZONAL)))
            .and(query_param("networkInterface", "nic0"))
            .and(body_partial_json(json!({"natIP": "34.1.2.3", "type": "ONE_TO_ONE_NAT"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(done_zonal_op()))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut buf = Vec::new();
        address::assign_static_address_to_existing_vm(
            &mut buf,
            &client,
            "test-project",
            "us-central1-a",
            "vm-1",
            "34.1.2.3",
            "nic0",
        )
        .await
        .unwrap();

        assert_eq!(
            output(buf),
            "Static address 34.1.2.3 assigned to the instance vm-1\n"
        );
    }

    #[tokio::test]
    async fn test_unassign_unknown_ip_fails() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{}/instances/vm-1", ZONAL)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "vm-1",
                "networkInterfaces": [{
                    "name": "nic0",
                    "accessConfigs": [{"name": "External NAT", "natIP": "34.9.9.9"}]
                }]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut buf = Vec::new();
        let err = address::unassign_static_address_from_existing_vm(
            &mut buf,
            &client,
            "test-project",
            "us-central1-a",
            "vm-1",
            "34.1.2.3",
            "nic0",
        )
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "no access config found for IP 34.1.2.3");
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_print_internal_ip_addresses() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{}/instances/vm-1", ZONAL)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "vm-1",
                "networkInterfaces": [{"name": "nic0", "networkIP": "10.0.0.5"}]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut buf = Vec::new();
        let ips = address::print_instance_ip_addresses(
            &mut buf,
            &client,
            "test-project",
            "us-central1-a",
            "vm-1",
            IpType::Internal,
        )
        .await
        .unwrap();

        assert_eq!(ips, vec!["10.0.0.5"]);
        assert_eq!(output(buf), "Internal IP addresses of vm-1: [\"10.0.0.5\"]\n");
    }
}

mod instance_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_instance() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(format!("{}/instances", ZONAL)))
            .and(body_partial_json(json!({
                "name": "vm-1",
                "machineType": "zones/us-central1-a/machineTypes/n1-standard-1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(done_zonal_op()))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut buf = Vec::new();
        instances::create_instance(
            &mut buf,
            &client,
            "test-project",
            "us-central1-a",
            "vm-1",
            "n1-standard-1",
            "projects/debian-cloud/global/images/family/debian-12",
            "global/networks/default",
        )
        .await
        .unwrap();

        assert_eq!(output(buf), "Instance created\n");
    }

    #[tokio::test]
    async fn test_failed_operation_is_reported() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(format!("{}/instances/vm-1/stop", ZONAL)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operation-9",
                "status": "DONE",
                "error": {"errors": [{"code": "RESOURCE_NOT_READY", "message": "busy"}]}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut buf = Vec::new();
        let err = instances::stop_instance(&mut buf, &client, "test-project", "us-central1-a", "vm-1")
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("RESOURCE_NOT_READY: busy"));
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_list_instances() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{}/instances", ZONAL)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"name": "vm-1", "machineType": "https://x/zones/us-central1-a/machineTypes/e2-small"},
                    {"name": "vm-2", "machineType": "https://x/zones/us-central1-a/machineTypes/n1-standard-1"}
                ]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut buf = Vec::new();
        instances::list_instances(&mut buf, &client, "test-project", "us-central1-a")
            .await
            .unwrap();

        assert_eq!(
            output(buf),
            "Instances found in zone us-central1-a:\n- vm-1 e2-small\n- vm-2 n1-standard-1\n"
        );
    }

    #[tokio::test]
    async fn test_list_all_instances_groups_by_zone() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/test-project/aggregated/instances"))
            .and(query_param("maxResults", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": {
                    "zones/europe-west1-b": {
                        "instances": [{"name": "eu-vm", "machineType": "zones/europe-west1-b/machineTypes/e2-micro"}]
                    },
                    "zones/us-east1-c": {"warning": {"code": "NO_RESULTS_ON_PAGE"}}
                }
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut buf = Vec::new();
        let by_zone = instances::list_all_instances(&mut buf, &client, "test-project")
            .await
            .unwrap();

        assert_eq!(by_zone.len(), 1);
        assert_eq!(
            output(buf),
            "Instances found:\nzones/europe-west1-b\n- eu-vm e2-micro\n"
        );
    }

    #[tokio::test]
    async fn test_resume_requires_suspended_instance() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{}/instances/vm-1", ZONAL)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"name": "vm-1", "status": "RUNNING"})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut buf = Vec::new();
        let err =
            instances::resume_instance(&mut buf, &client, "test-project", "us-central1-a", "vm-1")
                .await
                .unwrap_err();

        assert_eq!(
            err.to_string(),
            "only suspended instances can be resumed, instance vm-1 is in RUNNING state"
        );
    }

    #[tokio::test]
    async fn test_start_with_encryption_key_uses_boot_disk() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{}/instances/vm-1", ZONAL)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "vm-1",
                "disks": [{"source": "zones/us-central1-a/disks/vm-1"}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(format!("{}/instances/vm-1/startWithEncryptionKey", ZONAL)))
            .and(body_partial_json(json!({
                "disks": [{
                    "source": "zones/us-central1-a/disks/vm-1",
                    "diskEncryptionKey": {"rawKey": "c2VjcmV0"}
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(done_zonal_op()))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut buf = Vec::new();
        instances::start_instance_with_encryption_key(
            &mut buf,
            &client,
            "test-project",
            "us-central1-a",
            "vm-1",
            "c2VjcmV0",
        )
        .await
        .unwrap();

        assert_eq!(output(buf), "Instance with encryption key started\n");
    }

    #[tokio::test]
    async fn test_change_machine_type_requires_terminated() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{}/instances/vm-1", ZONAL)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"name": "vm-1", "status": "TERMINATED"})),
            )
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(format!("{}/instances/vm-1/setMachineType", ZONAL)))
            .and(body_partial_json(json!({
                "machineType": "zones/us-central1-a/machineTypes/e2-standard-2"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(done_zonal_op()))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut buf = Vec::new();
        instances::change_machine_type(
            &mut buf,
            &client,
            "test-project",
            "us-central1-a",
            "vm-1",
            "e2-standard-2",
        )
        .await
        .unwrap();

        assert_eq!(output(buf), "Instance updated\n");
    }

    #[tokio::test]
    async fn test_extended_memory_on_custom_instance() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{}/instances/vm-1", ZONAL)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "vm-1",
                "status": "TERMINATED",
                "machineType": "https://x/zones/us-central1-a/machineTypes/n2-custom-8-10240"
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(format!("{}/instances/vm-1/setMachineType", ZONAL)))
            .and(body_partial_json(json!({
                "machineType": "zones/us-central1-a/machineTypes/n2-custom-8-81920-ext"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(done_zonal_op()))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut buf = Vec::new();
        instances::modify_instance_with_extended_memory(
            &mut buf,
            &client,
            "test-project",
            "us-central1-a",
            "vm-1",
            81920,
        )
        .await
        .unwrap();

        assert_eq!(output(buf), "Instance updated\n");
    }

    #[tokio::test]
    async fn test_custom_machine_type_validation_happens_before_request() {
        let server = MockServer::start().await;
        let client = test_client(&server);
        let mut buf = Vec::new();

        let err = instances::create_instance_with_custom_machine_type(
            &mut buf,
            &client,
            "test-project",
            "us-central1-a",
            "vm-1",
            CpuSeries::E2,
            3,
            4096,
        )
        .await
        .unwrap_err();

        assert!(err
            .to_string()
            .starts_with("invalid number of cores requested. Allowed number of cores for e2-custom is: [2 4"));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_bulk_insert_labels_and_lists_batch() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{}/instanceTemplates/web", GLOBAL)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "web",
                "selfLink": "https://x/projects/test-project/global/instanceTemplates/web"
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(format!("{}/instances/bulkInsert", ZONAL)))
            .and(body_partial_json(json!({
                "sourceInstanceTemplate": "https://x/projects/test-project/global/instanceTemplates/web",
                "count": "3",
                "minCount": "3",
                "namePattern": "web-##",
                "instanceProperties": {"labels": {"team": "games"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(done_zonal_op()))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{}/instances", ZONAL)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "web-01"}, {"name": "web-02"}, {"name": "web-03"}]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let mut buf = Vec::new();
        let labels = [("team".to_string(), "games".to_string())].into_iter().collect();
        let created = instances::bulk_insert_instances(
            &mut buf,
            &client,
            "test-project",
            "us-central1-a",
            "web",
            3,
            "web-##",
            None,
            Some(labels),
        )
        .await
        .unwrap();

        assert_eq!(created.len(), 3);
        assert_eq!(output(buf), "Bulk instance creation completed\n");

        let requests = server.received_requests().await.unwrap();
        let list = requests
            .iter()
            .find(|r| r.method.as_str() == "GET" && r.url.path().ends_with("/instances"))
            .unwrap();
        let filter: String = list
            .url
            .query_pairs()
            .find(|(k, _)| k == "filter")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert!(filter.starts_with("labels.bulk_batch = "));
    }
}
