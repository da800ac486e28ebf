//! VM instance lifecycle

use super::machine_type::{CpuSeries, CustomMachineType};
use crate::gcp::client::{short_name, str_field, GcpClient};
use crate::gcp::http::with_query;
use crate::gcp::operation::wait_compute_operation;
use anyhow::{Context, Result};
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::io::Write;

fn instance_url(client: &GcpClient, project: &str, zone: &str, instance_name: &str) -> String {
    client.compute_zonal_url(project, zone, &format!("instances/{}", instance_name))
}

/// Boot disk from an image plus one NIC on `network`
pub async fn create_instance(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    instance_name: &str,
    machine_type: &str,
    source_image: &str,
    network_name: &str,
) -> Result<()> {
    let body = json!({
        "name": instance_name,
        "machineType": format!("zones/{}/machineTypes/{}", zone, machine_type),
        "disks": [{
            "initializeParams": {
                "diskSizeGb": "10",
                "sourceImage": source_image,
            },
            "autoDelete": true,
            "boot": true,
            "type": "PERSISTENT",
        }],
        "networkInterfaces": [{
            "name": network_name,
        }],
    });

    let url = client.compute_zonal_url(project, zone, "instances");
    let op = client
        .post(&url, Some(&body))
        .await
        .context("unable to create instance")?;
    wait_compute_operation(client, project, &op)
        .await
        .context("unable to wait for the operation")?;

    tracing::info!("Created instance {}", instance_name);
    writeln!(w, "Instance created")?;
    Ok(())
}

pub async fn get_instance(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    instance_name: &str,
) -> Result<Value> {
    let instance = client
        .get(&instance_url(client, project, zone, instance_name))
        .await
        .context("unable to get instance")?;

    writeln!(w, "Instance: {}", str_field(&instance, "name"))?;
    Ok(instance)
}

pub async fn list_instances(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
) -> Result<Vec<Value>> {
    let url = client.compute_zonal_url(project, zone, "instances");
    let instances = client
        .list_all(&url, "items")
        .await
        .context("unable to list instances")?;

    writeln!(w, "Instances found in zone {}:", zone)?;
    for instance in &instances {
        writeln!(
            w,
            "- {} {}",
            str_field(instance, "name"),
            short_name(str_field(instance, "machineType"))
        )?;
    }
    Ok(instances)
}

/// Group an aggregated list response by scope, skipping empty scopes
fn aggregated_instances(response: &Value) -> Vec<(String, Vec<Value>)> {
    let Some(items) = response.get("items").and_then(|v| v.as_object()) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|(scope, scoped)| {
            let instances = scoped.get("instances").and_then(|v| v.as_array())?;
            if instances.is_empty() {
                return None;
            }
            Some((scope.clone(), instances.clone()))
        })
        .collect()
}

/// List instances across every zone of a project
pub async fn list_all_instances(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
) -> Result<HashMap<String, Vec<Value>>> {
    let base_url = with_query(
        &client.compute_aggregated_url(project, "instances"),
        &[("maxResults", "3")],
    );

    let mut by_zone: HashMap<String, Vec<Value>> = HashMap::new();
    let mut page_token: Option<String> = None;

    writeln!(w, "Instances found:")?;
    loop {
        let url = match &page_token {
            Some(token) => with_query(&base_url, &[("pageToken", token.as_str())]),
            None => base_url.clone(),
        };
        let response = client
            .get(&url)
            .await
            .context("unable to list instances")?;

        for (zone, instances) in aggregated_instances(&response) {
            writeln!(w, "{}", zone)?;
            for instance in &instances {
                writeln!(
                    w,
                    "- {} {}",
                    str_field(instance, "name"),
                    short_name(str_field(instance, "machineType"))
                )?;
            }
            by_zone.entry(zone).or_default().extend(instances);
        }

        match response.get("nextPageToken").and_then(|v| v.as_str()) {
            Some(token) if !token.is_empty() => page_token = Some(token.to_string()),
            _ => break,
        }
    }

    Ok(by_zone)
}

pub async fn delete_instance(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    instance_name: &str,
) -> Result<()> {
    let op = client
        .delete(&instance_url(client, project, zone, instance_name))
        .await
        .context("unable to delete instance")?;
    wait_compute_operation(client, project, &op)
        .await
        .context("unable to wait for the operation")?;

    tracing::info!("Deleted instance {}", instance_name);
    writeln!(w, "Instance deleted")?;
    Ok(())
}

/// POST a state-change verb such as `start` or `stop` and wait for it
async fn instance_action(
    client: &GcpClient,
    project: &str,
    zone: &str,
    instance_name: &str,
    action: &str,
    body: Option<&Value>,
) -> Result<()> {
    let url = format!("{}/{}", instance_url(client, project, zone, instance_name), action);
    let op = client
        .post(&url, body)
        .await
        .with_context(|| format!("unable to {} instance", action))?;
    wait_compute_operation(client, project, &op)
        .await
        .context("unable to wait for the operation")?;

    tracing::info!("Instance {}: {} done", instance_name, action);
    Ok(())
}

pub async fn start_instance(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    instance_name: &str,
) -> Result<()> {
    instance_action(client, project, zone, instance_name, "start", None).await?;
    writeln!(w, "Instance started")?;
    Ok(())
}

/// Start an instance whose boot disk is protected by a customer-supplied key
pub async fn start_instance_with_encryption_key(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    instance_name: &str,
    raw_key: &str,
) -> Result<()> {
    let instance = client
        .get(&instance_url(client, project, zone, instance_name))
        .await
        .context("unable to get instance")?;

    let disk_source = instance
        .get("disks")
        .and_then(|v| v.as_array())
        .and_then(|disks| disks.first())
        .map(|disk| str_field(disk, "source").to_string())
        .filter(|source| !source.is_empty())
        .with_context(|| format!("instance {} has no attached disk", instance_name))?;

    let body = json!({
        "disks": [{
            "source": disk_source,
            "diskEncryptionKey": { "rawKey": raw_key },
        }],
    });

    instance_action(
        client,
        project,
        zone,
        instance_name,
        "startWithEncryptionKey",
        Some(&body),
    )
    .await?;
    writeln!(w, "Instance with encryption key started")?;
    Ok(())
}

pub async fn stop_instance(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    instance_name: &str,
) -> Result<()> {
    instance_action(client, project, zone, instance_name, "stop", None).await?;
    writeln!(w, "Instance stopped")?;
    Ok(())
}

pub async fn reset_instance(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    instance_name: &str,
) -> Result<()> {
    instance_action(client, project, zone, instance_name, "reset", None).await?;
    writeln!(w, "Instance reset")?;
    Ok(())
}

pub async fn suspend_instance(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    instance_name: &str,
) -> Result<()> {
    instance_action(client, project, zone, instance_name, "suspend", None).await?;
    writeln!(w, "Instance suspended")?;
    Ok(())
}

pub async fn resume_instance(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    instance_name: &str,
) -> Result<()> {
    let instance = client
        .get(&instance_url(client, project, zone, instance_name))
        .await
        .context("unable to get instance")?;

    let status = str_field(&instance, "status");
    if status != "SUSPENDED" {
        anyhow::bail!(
            "only suspended instances can be resumed, instance {} is in {} state",
            instance_name,
            status
        );
    }

    instance_action(client, project, zone, instance_name, "resume", None).await?;
    writeln!(w, "Instance resumed")?;
    Ok(())
}

/// Fetch an instance and fail unless it is stopped
async fn get_terminated_instance(
    client: &GcpClient,
    project: &str,
    zone: &str,
    instance_name: &str,
) -> Result<Value> {
    let instance = client
        .get(&instance_url(client, project, zone, instance_name))
        .await
        .context("unable to get instance")?;

    let status = str_field(&instance, "status");
    if status != "TERMINATED" {
        anyhow::bail!(
            "only machines in TERMINATED state can have their machine type changed. {} is in {} state",
            instance_name,
            status
        );
    }
    Ok(instance)
}

async fn set_machine_type(
    client: &GcpClient,
    project: &str,
    zone: &str,
    instance_name: &str,
    machine_type: &str,
) -> Result<()> {
    let body = json!({ "machineType": machine_type });
    instance_action(client, project, zone, instance_name, "setMachineType", Some(&body)).await
}

/// Switch a stopped instance to another predefined machine type
pub async fn change_machine_type(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    instance_name: &str,
    new_machine_type: &str,
) -> Result<()> {
    get_terminated_instance(client, project, zone, instance_name).await?;
    set_machine_type(
        client,
        project,
        zone,
        instance_name,
        &format!("zones/{}/machineTypes/{}", zone, new_machine_type),
    )
    .await?;

    writeln!(w, "Instance updated")?;
    Ok(())
}

/// Block on an operation returned by an earlier call
pub async fn wait_for_operation(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    operation: &Value,
) -> Result<Value> {
    let done = wait_compute_operation(client, project, operation)
        .await
        .context("unable to wait for the operation")?;
    writeln!(w, "Operation finished")?;
    Ok(done)
}

/// Create an instance that takes everything from a template
pub async fn create_instance_from_template(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    instance_name: &str,
    source_template: &str,
) -> Result<()> {
    let url = with_query(
        &client.compute_zonal_url(project, zone, "instances"),
        &[("sourceInstanceTemplate", source_template)],
    );
    let body = json!({ "name": instance_name });

    let op = client
        .post(&url, Some(&body))
        .await
        .context("unable to create instance")?;
    wait_compute_operation(client, project, &op)
        .await
        .context("unable to wait for the operation")?;

    writeln!(w, "Instance created")?;
    Ok(())
}

/// Disk types in a template are bare names; instances need zone-qualified ones
fn zonal_template_disks(template: &Value, zone: &str) -> Vec<Value> {
    let mut disks: Vec<Value> = template
        .get("properties")
        .and_then(|p| p.get("disks"))
        .and_then(|d| d.as_array())
        .cloned()
        .unwrap_or_default();

    for disk in disks.iter_mut() {
        if let Some(params) = disk.get_mut("initializeParams").and_then(|p| p.as_object_mut()) {
            let disk_type = params
                .get("diskType")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            if !disk_type.is_empty() {
                params.insert(
                    "diskType".to_string(),
                    Value::String(format!("zones/{}/diskTypes/{}", zone, disk_type)),
                );
            }
        }
    }
    disks
}

/// Create an instance from a template with a different machine type and an extra disk
pub async fn create_instance_from_template_with_overrides(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    instance_name: &str,
    template_name: &str,
    machine_type: &str,
    new_disk_source_image: &str,
) -> Result<()> {
    let template = client
        .get(&client.compute_global_url(project, &format!("instanceTemplates/{}", template_name)))
        .await
        .context("unable to get instance template")?;

    // Overriding a repeated field replaces it, so the template's disks are resent
    let mut disks = zonal_template_disks(&template, zone);
    disks.push(json!({
        "initializeParams": {
            "diskSizeGb": "10",
            "sourceImage": new_disk_source_image,
        },
        "autoDelete": true,
        "boot": false,
        "type": "PERSISTENT",
    }));

    let body = json!({
        "name": instance_name,
        "machineType": format!("zones/{}/machineTypes/{}", zone, machine_type),
        "disks": disks,
    });
    let url = with_query(
        &client.compute_zonal_url(project, zone, "instances"),
        &[("sourceInstanceTemplate", str_field(&template, "selfLink"))],
    );

    let op = client
        .post(&url, Some(&body))
        .await
        .context("unable to create instance")?;
    wait_compute_operation(client, project, &op)
        .await
        .context("unable to wait for the operation")?;

    writeln!(w, "Instance created")?;
    Ok(())
}

/// Create `count` instances from a template in one request.
///
/// `name_pattern` holds one run of `#` placeholders, e.g. `inst-####`.
/// Returns the instances carrying the generated `bulk_batch` label.
pub async fn bulk_insert_instances(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    template_name: &str,
    count: i64,
    name_pattern: &str,
    min_count: Option<i64>,
    labels: Option<HashMap<String, String>>,
) -> Result<Vec<Value>> {
    let template = client
        .get(&client.compute_global_url(project, &format!("instanceTemplates/{}", template_name)))
        .await
        .context("getInstanceTemplate")?;

    let batch_id = uuid::Uuid::new_v4().to_string();
    let mut labels: Map<String, Value> = labels
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    labels.insert("bulk_batch".to_string(), Value::String(batch_id.clone()));

    let body = json!({
        "sourceInstanceTemplate": str_field(&template, "selfLink"),
        "count": count.to_string(),
        "minCount": min_count.unwrap_or(count).to_string(),
        "namePattern": name_pattern,
        "instanceProperties": { "labels": labels },
    });

    let url = client.compute_zonal_url(project, zone, "instances/bulkInsert");
    let op = client
        .post(&url, Some(&body))
        .await
        .context("BulkInsert")?;
    wait_compute_operation(client, project, &op)
        .await
        .context("unable to wait for the operation")?;

    writeln!(w, "Bulk instance creation completed")?;

    let filter = format!("labels.bulk_batch = {}", batch_id);
    let list_url = with_query(
        &client.compute_zonal_url(project, zone, "instances"),
        &[("filter", filter.as_str())],
    );
    client
        .list_all(&list_url, "items")
        .await
        .context("unable to list bulk-created instances")
}

/// Create an instance with a validated custom shape
pub async fn create_instance_with_custom_machine_type(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    instance_name: &str,
    series: CpuSeries,
    core_count: u32,
    memory_mb: u32,
) -> Result<()> {
    let machine_type = CustomMachineType::new(zone, series, memory_mb, core_count)?;

    let body = json!({
        "name": instance_name,
        "machineType": machine_type.to_string(),
        "disks": [{
            "initializeParams": {
                "diskSizeGb": "10",
                "sourceImage": "projects/debian-cloud/global/images/family/debian-12",
            },
            "autoDelete": true,
            "boot": true,
        }],
        "networkInterfaces": [{
            "name": "global/networks/default",
        }],
    });

    let url = client.compute_zonal_url(project, zone, "instances");
    let op = client
        .post(&url, Some(&body))
        .await
        .context("unable to create instance")?;
    wait_compute_operation(client, project, &op)
        .await
        .context("unable to wait for the operation")?;

    tracing::info!("Created instance {} as {}", instance_name, machine_type.short_name());
    writeln!(w, "Instance created")?;
    Ok(())
}

/// Split `n2-custom-8-10240[-ext]` into its series and core count
fn parse_custom_machine_type(machine_type: &str) -> Option<(CpuSeries, u32)> {
    let re = Regex::new(r"^(.+)-(\d+)-(\d+)(-ext)?$").ok()?;
    let caps = re.captures(short_name(machine_type))?;
    let series = CpuSeries::from_prefix(caps.get(1)?.as_str())?;
    let cores = caps.get(2)?.as_str().parse().ok()?;
    Some((series, cores))
}

/// Give a stopped custom-shape instance more memory than the per-core maximum
pub async fn modify_instance_with_extended_memory(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    instance_name: &str,
    new_memory_mb: u32,
) -> Result<()> {
    let instance = get_terminated_instance(client, project, zone, instance_name).await?;

    let current = str_field(&instance, "machineType");
    let (series, cores) = parse_custom_machine_type(current).with_context(|| {
        format!("instance {} does not use a custom machine type: {}", instance_name, current)
    })?;
    if !series.limit().allow_extra_memory {
        anyhow::bail!("extended memory is not available for {}", series);
    }

    let machine_type = CustomMachineType::new(zone, series, new_memory_mb, cores)?;
    set_machine_type(client, project, zone, instance_name, &machine_type.to_string()).await?;

    writeln!(w, "Instance updated")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregated_instances_skips_empty_scopes() {
        let response = json!({
            "items": {
                "zones/us-central1-a": {
                    "instances": [{"name": "a", "machineType": "zones/us-central1-a/machineTypes/e2-small"}]
                },
                "zones/us-central1-b": {
                    "warning": {"code": "NO_RESULTS_ON_PAGE"}
                },
                "zones/us-central1-c": {"instances": []}
            }
        });
        let grouped = aggregated_instances(&response);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].0, "zones/us-central1-a");
        assert_eq!(grouped[0].1[0]["name"], "a");
    }

    #[test]
    fn test_zonal_template_disks() {
        let template = json!({
            "properties": {
                "disks": [
                    {"initializeParams": {"diskType": "pd-balanced"}, "boot": true},
                    {"initializeParams": {"sourceImage": "img"}}
                ]
            }
        });
        let disks = zonal_template_disks(&template, "europe-central2-b");
        assert_eq!(
            disks[0]["initializeParams"]["diskType"],
            "zones/europe-central2-b/diskTypes/pd-balanced"
        );
        assert!(disks[1]["initializeParams"].get("diskType").is_none());
    }

    #[test]
    fn test_parse_custom_machine_type() {
        assert_eq!(
            parse_custom_machine_type("https://compute/zones/z/machineTypes/n2-custom-8-10240"),
            Some((CpuSeries::N2, 8))
        );
        assert_eq!(
            parse_custom_machine_type("zones/z/machineTypes/custom-4-655360-ext"),
            Some((CpuSeries::N1, 4))
        );
        assert_eq!(parse_custom_machine_type("zones/z/machineTypes/n1-standard-1"), None);
    }
}
