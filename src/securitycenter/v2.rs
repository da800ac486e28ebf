use super::{
    rfc3339, write_finding, write_source_properties, SAMPLE_FINDING_ID, SAMPLE_RESOURCE_NAME,
};
use crate::gcp::client::{str_field, GcpClient};
use crate::gcp::http::with_query;
use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::{json, Value};
use std::io::Write;

const LOCATION: &str = "global";

fn url(client: &GcpClient, name: &str) -> String {
    format!("{}/{}", client.securitycenter_root("v2"), name)
}

/// Finding under `{source_name}/locations/global`
pub async fn create_finding(
    w: &mut impl Write,
    client: &GcpClient,
    source_name: &str,
) -> Result<Value> {
    let parent = format!("{}/locations/{}", source_name, LOCATION);
    let body = json!({
        "state": "ACTIVE",
        "resourceName": SAMPLE_RESOURCE_NAME,
        "category": "MEDIUM_RISK_ONE",
        "eventTime": rfc3339(Utc::now()),
        "findingClass": "MISCONFIGURATION",
    });
    let finding = client
        .post(
            &with_query(
                &url(client, &format!("{}/findings", parent)),
                &[("findingId", SAMPLE_FINDING_ID)],
            ),
            Some(&body),
        )
        .await
        .context("CreateFinding")?;

    writeln!(w, "New finding created: {}", str_field(&finding, "name"))?;
    writeln!(w, "Event time (Epoch Seconds): {}", super::event_time_secs(&finding))?;
    Ok(finding)
}

pub async fn update_finding_source_properties(
    w: &mut impl Write,
    client: &GcpClient,
    finding_name: &str,
) -> Result<Value> {
    let body = json!({
        "name": finding_name,
        "eventTime": rfc3339(Utc::now()),
        "sourceProperties": { "s_value": "new_string" },
    });
    let finding = client
        .patch(
            &with_query(
                &url(client, finding_name),
                &[("updateMask", "source_properties.s_value,event_time")],
            ),
            &body,
        )
        .await
        .context("UpdateFinding")?;

    write_finding(w, "updated", &finding)?;
    write_source_properties(w, &finding)?;
    Ok(finding)
}

pub async fn set_finding_state(
    w: &mut impl Write,
    client: &GcpClient,
    finding_name: &str,
) -> Result<Value> {
    let finding = client
        .post(
            &format!("{}:setState", url(client, finding_name)),
            Some(&json!({ "state": "INACTIVE" })),
        )
        .await
        .context("SetFindingState")?;

    write_finding(w, "updated", &finding)?;
    Ok(finding)
}
