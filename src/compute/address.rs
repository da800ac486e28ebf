//! Static and ephemeral external IP addresses

use crate::gcp::client::{str_field, GcpClient};
use crate::gcp::http::with_query;
use crate::gcp::operation::wait_compute_operation;
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::io::Write;

/// Which addresses of an instance to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum IpType {
    External,
    Internal,
    Ipv6,
}

/// Reserve a regional external address on the PREMIUM or STANDARD tier
pub async fn reserve_new_regional_external(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    region: &str,
    address_name: &str,
    is_premium: bool,
) -> Result<Value> {
    let network_tier = if is_premium { "PREMIUM" } else { "STANDARD" };
    let body = json!({
        "name": address_name,
        "networkTier": network_tier,
    });

    let url = client.compute_regional_url(project, region, "addresses");
    let op = client
        .post(&url, Some(&body))
        .await
        .context("unable to reserve regional address")?;
    wait_compute_operation(client, project, &op)
        .await
        .context("waiting for the regional address reservation operation to complete")?;

    let address = get_regional_address(client, project, region, address_name)
        .await
        .context("unable to get reserved regional address")?;

    writeln!(
        w,
        "Regional address {} reserved: {}",
        address_name,
        str_field(&address, "address")
    )?;
    Ok(address)
}

/// Reserve a global external IPv4 or IPv6 address
pub async fn reserve_new_global_external(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    address_name: &str,
    is_v6: bool,
) -> Result<Value> {
    let ip_version = if is_v6 { "IPV6" } else { "IPV4" };
    let body = json!({
        "name": address_name,
        "ipVersion": ip_version,
    });

    let url = client.compute_global_url(project, "addresses");
    let op = client
        .post(&url, Some(&body))
        .await
        .context("unable to reserve global address")?;
    wait_compute_operation(client, project, &op)
        .await
        .context("waiting for the global address reservation operation to complete")?;

    let address = get_global_address(client, project, address_name)
        .await
        .context("unable to get reserved global address")?;

    writeln!(
        w,
        "Global address {} reserved: {}",
        address_name,
        str_field(&address, "address")
    )?;
    Ok(address)
}

async fn get_regional_address(
    client: &GcpClient,
    project: &str,
    region: &str,
    address_name: &str,
) -> Result<Value> {
    let url = client.compute_regional_url(project, region, &format!("addresses/{}", address_name));
    client.get(&url).await
}

async fn get_global_address(
    client: &GcpClient,
    project: &str,
    address_name: &str,
) -> Result<Value> {
    let url = client.compute_global_url(project, &format!("addresses/{}", address_name));
    client.get(&url).await
}

pub async fn get_regional_external(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    region: &str,
    address_name: &str,
) -> Result<Value> {
    let address = get_regional_address(client, project, region, address_name)
        .await
        .context("unable to get regional address")?;

    writeln!(
        w,
        "Regional address {} has external IP address: {}",
        address_name,
        str_field(&address, "address")
    )?;
    Ok(address)
}

pub async fn get_global_external(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    address_name: &str,
) -> Result<Value> {
    let address = get_global_address(client, project, address_name)
        .await
        .context("unable to get global address")?;

    writeln!(
        w,
        "Global address {} has external IP address: {}",
        address_name,
        str_field(&address, "address")
    )?;
    Ok(address)
}

/// List the external addresses reserved in a region
pub async fn list_regional_external(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    region: &str,
) -> Result<Vec<Value>> {
    let url = with_query(
        &client.compute_regional_url(project, region, "addresses"),
        &[("filter", "addressType=EXTERNAL")],
    );
    let addresses = client
        .list_all(&url, "items")
        .await
        .context("unable to list regional addresses")?;

    for address in &addresses {
        writeln!(w, "{} {}", str_field(address, "name"), str_field(address, "address"))?;
    }
    Ok(addresses)
}

/// List the global external addresses of a project
pub async fn list_global_external(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
) -> Result<Vec<Value>> {
    let url = with_query(
        &client.compute_global_url(project, "addresses"),
        &[("filter", "addressType=EXTERNAL")],
    );
    let addresses = client
        .list_all(&url, "items")
        .await
        .context("unable to list global addresses")?;

    for address in &addresses {
        writeln!(w, "{} {}", str_field(address, "name"), str_field(address, "address"))?;
    }
    Ok(addresses)
}

pub async fn release_regional_static_external(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    region: &str,
    address_name: &str,
) -> Result<()> {
    let url = client.compute_regional_url(project, region, &format!("addresses/{}", address_name));
    let op = client
        .delete(&url)
        .await
        .context("unable to release static external IP address")?;
    wait_compute_operation(client, project, &op)
        .await
        .context("unable to wait for the operation")?;

    tracing::info!("Released regional address {}", address_name);
    writeln!(w, "Static external IP address released")?;
    Ok(())
}

pub async fn release_global_static_external(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    address_name: &str,
) -> Result<()> {
    let url = client.compute_global_url(project, &format!("addresses/{}", address_name));
    let op = client
        .delete(&url)
        .await
        .context("unable to release static external IP address")?;
    wait_compute_operation(client, project, &op)
        .await
        .context("unable to wait for the operation")?;

    tracing::info!("Released global address {}", address_name);
    writeln!(w, "Static external IP address released")?;
    Ok(())
}

/// Turn an ephemeral external IP into a reserved static address
pub async fn promote_ephemeral_address(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    region: &str,
    ephemeral_ip: &str,
    address_name: &str,
) -> Result<()> {
    let body = json!({
        "name": address_name,
        "address": ephemeral_ip,
        "addressType": "EXTERNAL",
    });

    let url = client.compute_regional_url(project, region, "addresses");
    let op = client
        .post(&url, Some(&body))
        .await
        .context("failed to promote ephemeral IP address")?;
    wait_compute_operation(client, project, &op)
        .await
        .context("failed to wait for the operation")?;

    writeln!(w, "Ephemeral IP {} address promoted successfully", ephemeral_ip)?;
    Ok(())
}

/// Create a Debian VM whose first NIC uses an already reserved address
pub async fn assign_static_external_to_new_vm(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    instance_name: &str,
    ip_address: &str,
) -> Result<Value> {
    let body = json!({
        "name": instance_name,
        "machineType": format!("zones/{}/machineTypes/n1-standard-1", zone),
        "disks": [{
            "initializeParams": {
                "diskSizeGb": "10",
                "sourceImage": "projects/debian-cloud/global/images/family/debian-12",
                "diskType": format!("zones/{}/diskTypes/pd-standard", zone),
            },
            "autoDelete": true,
            "boot": true,
            "type": "PERSISTENT",
        }],
        "networkInterfaces": [{
            "accessConfigs": [{
                "type": "ONE_TO_ONE_NAT",
                "name": "external-nat",
                "natIP": ip_address,
            }],
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

    let instance = client
        .get(&client.compute_zonal_url(project, zone, &format!("instances/{}", instance_name)))
        .await
        .context("unable to get instance")?;

    writeln!(w, "Static address {} assigned to new VM", ip_address)?;
    Ok(instance)
}

/// Replace the access config of a NIC with one pointing at `ip_address`
pub async fn assign_static_address_to_existing_vm(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    instance_name: &str,
    ip_address: &str,
    network_interface_name: &str,
) -> Result<()> {
    let instance_url = client.compute_zonal_url(project, zone, &format!("instances/{}", instance_name));
    let instance = client
        .get(&instance_url)
        .await
        .context("failed to get instance")?;

    let nic = find_network_interface(&instance, network_interface_name).with_context(|| {
        format!(
            "no network interface named '{}' found on instance {}",
            network_interface_name, instance_name
        )
    })?;

    if let Some(access_config) = nic
        .get("accessConfigs")
        .and_then(|v| v.as_array())
        .and_then(|configs| configs.first())
    {
        let url = with_query(
            &format!("{}/deleteAccessConfig", instance_url),
            &[
                ("accessConfig", str_field(access_config, "name")),
                ("networkInterface", network_interface_name),
            ],
        );
        let op = client
            .post(&url, None)
            .await
            .context("failed to delete existing access config")?;
        wait_compute_operation(client, project, &op)
            .await
            .context("failed to wait for the operation")?;
    }

    let body = json!({
        "name": "external-nat",
        "natIP": ip_address,
        "type": "ONE_TO_ONE_NAT",
    });
    let url = with_query(
        &format!("{}/addAccessConfig", instance_url),
        &[("networkInterface", network_interface_name)],
    );
    let op = client
        .post(&url, Some(&body))
        .await
        .context("failed to add access config")?;
    wait_compute_operation(client, project, &op)
        .await
        .context("failed to wait for the operation")?;

    writeln!(
        w,
        "Static address {} assigned to the instance {}",
        ip_address, instance_name
    )?;
    Ok(())
}

/// Drop the access config that carries `ip_address`
pub async fn unassign_static_address_from_existing_vm(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    instance_name: &str,
    ip_address: &str,
    network_interface_name: &str,
) -> Result<()> {
    let instance_url = client.compute_zonal_url(project, zone, &format!("instances/{}", instance_name));
    let instance = client
        .get(&instance_url)
        .await
        .context("failed to get instance")?;

    let nic = find_network_interface(&instance, network_interface_name).with_context(|| {
        format!(
            "no network interface named '{}' found on instance {}",
            network_interface_name, instance_name
        )
    })?;

    let access_config = nic
        .get("accessConfigs")
        .and_then(|v| v.as_array())
        .and_then(|configs| {
            configs
                .iter()
                .find(|c| str_field(c, "natIP") == ip_address)
        })
        .with_context(|| format!("no access config found for IP {}", ip_address))?;

    let url = with_query(
        &format!("{}/deleteAccessConfig", instance_url),
        &[
            ("accessConfig", str_field(access_config, "name")),
            ("networkInterface", network_interface_name),
        ],
    );
    let op = client
        .post(&url, None)
        .await
        .context("failed to delete access config")?;
    wait_compute_operation(client, project, &op)
        .await
        .context("failed to wait for the operation")?;

    writeln!(
        w,
        "Static address {} unassigned from the instance {}",
        ip_address, instance_name
    )?;
    Ok(())
}

fn find_network_interface<'a>(instance: &'a Value, name: &str) -> Option<&'a Value> {
    instance
        .get("networkInterfaces")
        .and_then(|v| v.as_array())?
        .iter()
        .find(|nic| str_field(nic, "name") == name)
}

/// Collect the addresses of one kind from an instance resource
pub fn get_instance_ip_addresses(instance: &Value, ip_type: IpType) -> Vec<String> {
    let Some(interfaces) = instance.get("networkInterfaces").and_then(|v| v.as_array()) else {
        return Vec::new();
    };

    let mut ips = Vec::new();
    for nic in interfaces {
        match ip_type {
            IpType::Internal => {
                if let Some(ip) = nic.get("networkIP").and_then(|v| v.as_str()) {
                    ips.push(ip.to_string());
                }
            }
            IpType::External => {
                let configs = nic.get("accessConfigs").and_then(|v| v.as_array());
                for config in configs.into_iter().flatten() {
                    if let Some(ip) = config.get("natIP").and_then(|v| v.as_str()) {
                        ips.push(ip.to_string());
                    }
                }
            }
            IpType::Ipv6 => {
                let configs = nic.get("ipv6AccessConfigs").and_then(|v| v.as_array());
                for config in configs.into_iter().flatten() {
                    if let Some(ip) = config.get("externalIpv6").and_then(|v| v.as_str()) {
                        ips.push(ip.to_string());
                    }
                }
                if let Some(ip) = nic.get("ipv6Address").and_then(|v| v.as_str()) {
                    ips.push(ip.to_string());
                }
            }
        }
    }
    ips
}

/// Fetch an instance and print its addresses of one kind
pub async fn print_instance_ip_addresses(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    instance_name: &str,
    ip_type: IpType,
) -> Result<Vec<String>> {
    let url = client.compute_zonal_url(project, zone, &format!("instances/{}", instance_name));
    let instance = client.get(&url).await.context("failed to get instance")?;

    let ips = get_instance_ip_addresses(&instance, ip_type);
    let label = match ip_type {
        IpType::External => "External",
        IpType::Internal => "Internal",
        IpType::Ipv6 => "IPv6",
    };
    writeln!(w, "{} IP addresses of {}: {:?}", label, instance_name, ips)?;
    Ok(ips)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_instance() -> Value {
        json!({
            "name": "vm-1",
            "networkInterfaces": [
                {
                    "name": "nic0",
                    "networkIP": "10.128.0.2",
                    "accessConfigs": [{"name": "External NAT", "natIP": "34.1.2.3"}],
                    "ipv6AccessConfigs": [{"externalIpv6": "2600:1900::1"}]
                },
                {
                    "name": "nic1",
                    "networkIP": "10.129.0.2",
                    "ipv6Address": "fd20::2"
                }
            ]
        })
    }

    #[test]
    fn test_get_instance_ip_addresses() {
        let instance = sample_instance();
        assert_eq!(
            get_instance_ip_addresses(&instance, IpType::Internal),
            vec!["10.128.0.2", "10.129.0.2"]
        );
        assert_eq!(
            get_instance_ip_addresses(&instance, IpType::External),
            vec!["34.1.2.3"]
        );
        assert_eq!(
            get_instance_ip_addresses(&instance, IpType::Ipv6),
            vec!["2600:1900::1", "fd20::2"]
        );
    }

    #[test]
    fn test_get_instance_ip_addresses_without_interfaces() {
        assert!(get_instance_ip_addresses(&json!({"name": "bare"}), IpType::External).is_empty());
    }

    #[test]
    fn test_find_network_interface() {
        let instance = sample_instance();
        assert!(find_network_interface(&instance, "nic1").is_some());
        assert!(find_network_interface(&instance, "nic9").is_none());
    }
}
