use super::{
    rfc3339, write_finding, write_source_properties, SAMPLE_FINDING_ID,
    SAMPLE_FINDING_WITH_PROPERTIES_ID, SAMPLE_RESOURCE_NAME,
};
use crate::gcp::client::{str_field, GcpClient};
use crate::gcp::http::with_query;
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::io::Write;
use tracing::debug;

const FINDINGS_EDITOR_ROLE: &str = "roles/securitycenter.findingsEditor";

fn url(client: &GcpClient, name: &str) -> String {
    format!("{}/{}", client.securitycenter_root("v1"), name)
}

/// New source under `organizations/{org_id}`
pub async fn create_source(w: &mut impl Write, client: &GcpClient, org_id: &str) -> Result<Value> {
    let body = json!({
        "displayName": "Customized Display Name",
        "description": "A new custom source that does X",
    });
    let source = client
        .post(&url(client, &format!("organizations/{}/sources", org_id)), Some(&body))
        .await
        .context("CreateSource")?;

    writeln!(w, "New source created: {}", str_field(&source, "name"))?;
    writeln!(w, "Display Name: {}", str_field(&source, "displayName"))?;
    Ok(source)
}

pub async fn get_source(
    w: &mut impl Write,
    client: &GcpClient,
    source_name: &str,
) -> Result<Value> {
    let source = client
        .get(&url(client, source_name))
        .await
        .context("GetSource")?;

    writeln!(w, "Source: {}", str_field(&source, "name"))?;
    writeln!(w, "Display Name: {}", str_field(&source, "displayName"))?;
    writeln!(w, "Description: {}", str_field(&source, "description"))?;
    Ok(source)
}

fn write_source_line(w: &mut impl Write, source: &Value) -> Result<()> {
    write!(w, "Source Name: {}, ", str_field(source, "name"))?;
    write!(w, "Display name: {}, ", str_field(source, "displayName"))?;
    writeln!(w, "Description: {}", str_field(source, "description"))?;
    Ok(())
}

pub async fn list_sources(
    w: &mut impl Write,
    client: &GcpClient,
    org_id: &str,
) -> Result<Vec<Value>> {
    let sources = client
        .list_all(&url(client, &format!("organizations/{}/sources", org_id)), "sources")
        .await
        .context("ListSources")?;

    for source in &sources {
        write_source_line(w, source)?;
    }
    Ok(sources)
}

/// Rename a source; the description is left as is
pub async fn update_source(
    w: &mut impl Write,
    client: &GcpClient,
    source_name: &str,
) -> Result<Value> {
    let source = client
        .patch(
            &with_query(&url(client, source_name), &[("updateMask", "display_name")]),
            &json!({ "name": source_name, "displayName": "New Display Name" }),
        )
        .await
        .context("UpdateSource")?;

    write_source_line(w, &source)?;
    Ok(source)
}

async fn create(
    client: &GcpClient,
    source_name: &str,
    finding_id: &str,
    finding: &Value,
) -> Result<Value> {
    client
        .post(
            &with_query(
                &url(client, &format!("{}/findings", source_name)),
                &[("findingId", finding_id)],
            ),
            Some(finding),
        )
        .await
        .context("CreateFinding")
}

pub async fn create_finding(
    w: &mut impl Write,
    client: &GcpClient,
    source_name: &str,
) -> Result<Value> {
    let body = json!({
        "state": "ACTIVE",
        "resourceName": SAMPLE_RESOURCE_NAME,
        "category": "MEDIUM_RISK_ONE",
        "eventTime": rfc3339(Utc::now()),
    });
    let finding = create(client, source_name, SAMPLE_FINDING_ID, &body).await?;

    writeln!(w, "New finding created: {}", str_field(&finding, "name"))?;
    writeln!(w, "Event time (Epoch Seconds): {}", super::event_time_secs(&finding))?;
    Ok(finding)
}

/// Finding carrying a string and a number source property
pub async fn create_finding_with_properties(
    w: &mut impl Write,
    client: &GcpClient,
    source_name: &str,
) -> Result<Value> {
    let body = json!({
        "state": "ACTIVE",
        "resourceName": SAMPLE_RESOURCE_NAME,
        "category": "MEDIUM_RISK_ONE",
        "eventTime": rfc3339(Utc::now()),
        "sourceProperties": {
            "s_value": "string_value",
            "n_value": 1234.0,
        },
    });
    let finding = create(client, source_name, SAMPLE_FINDING_WITH_PROPERTIES_ID, &body).await?;

    writeln!(w, "New finding created: {}", str_field(&finding, "name"))?;
    writeln!(w, "Event time (Epoch Seconds): {}", super::event_time_secs(&finding))?;
    write_source_properties(w, &finding)?;
    Ok(finding)
}

/// Overwrite `s_value` and bump the event time
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
    let body = json!({
        "name": finding_name,
        "state": "INACTIVE",
        "startTime": rfc3339(Utc::now()),
    });
    let finding = client
        .post(&format!("{}:setState", url(client, finding_name)), Some(&body))
        .await
        .context("SetFindingState")?;

    write_finding(w, "updated", &finding)?;
    Ok(finding)
}

async fn has_permission(client: &GcpClient, source_name: &str, permission: &str) -> Result<bool> {
    let response = client
        .post(
            &format!("{}:testIamPermissions", url(client, source_name)),
            Some(&json!({ "permissions": [permission] })),
        )
        .await
        .context("TestIamPermissions")?;

    Ok(response
        .get("permissions")
        .and_then(|v| v.as_array())
        .map(|granted| granted.iter().any(|p| p.as_str() == Some(permission)))
        .unwrap_or(false))
}

/// Whether the caller may edit findings and their state on this source
pub async fn test_iam(
    w: &mut impl Write,
    client: &GcpClient,
    source_name: &str,
) -> Result<(bool, bool)> {
    let can_update = has_permission(client, source_name, "securitycenter.findings.update").await?;
    writeln!(w, "Permision to create/update findings? {}", can_update)?;

    let can_set_state = has_permission(client, source_name, "securitycenter.findings.setState").await?;
    writeln!(w, "Permision to update state? {}", can_set_state)?;

    Ok((can_update, can_set_state))
}

/// Page through `listFindingsResults` and print each finding
async fn list(
    w: &mut impl Write,
    client: &GcpClient,
    source_name: &str,
    params: &[(&str, &str)],
) -> Result<Vec<Value>> {
    let list_url = with_query(&url(client, &format!("{}/findings", source_name)), params);
    debug!("Listing findings: {}", list_url);

    let results = client
        .list_all(&list_url, "listFindingsResults")
        .await
        .context("ListFindings")?;

    let findings: Vec<Value> = results
        .into_iter()
        .filter_map(|result| result.get("finding").cloned())
        .collect();

    for finding in &findings {
        write!(w, "Finding Name: {}, ", str_field(finding, "name"))?;
        write!(w, "Resource Name {}, ", str_field(finding, "resourceName"))?;
        writeln!(w, "Category: {}", str_field(finding, "category"))?;
    }
    Ok(findings)
}

/// Every finding across all sources of the organization
pub async fn list_findings(
    w: &mut impl Write,
    client: &GcpClient,
    org_id: &str,
) -> Result<Vec<Value>> {
    list(w, client, &format!("organizations/{}/sources/-", org_id), &[]).await
}

pub async fn list_filtered_findings(
    w: &mut impl Write,
    client: &GcpClient,
    source_name: &str,
) -> Result<Vec<Value>> {
    list(
        w,
        client,
        source_name,
        &[("filter", r#"source_properties.s_value = "s_value""#)],
    )
    .await
}

/// Findings as they were five days ago
pub async fn list_findings_at_time(
    w: &mut impl Write,
    client: &GcpClient,
    source_name: &str,
) -> Result<Vec<Value>> {
    let read_time = rfc3339(Utc::now() - Duration::days(5));
    list(w, client, source_name, &[("readTime", read_time.as_str())]).await
}

pub async fn add_security_marks(
    w: &mut impl Write,
    client: &GcpClient,
    finding_name: &str,
) -> Result<Value> {
    let marks_name = format!("{}/securityMarks", finding_name);
    let body = json!({
        "name": marks_name,
        "marks": { "key_a": "value_a", "key_b": "value_b" },
    });
    let marks = client
        .patch(
            &with_query(&url(client, &marks_name), &[("updateMask", "marks.key_a,marks.key_b")]),
            &body,
        )
        .await
        .context("UpdateSecurityMarks")?;

    writeln!(w, "Updated marks: {}", str_field(&marks, "name"))?;
    if let Some(entries) = marks.get("marks").and_then(|v| v.as_object()) {
        for (key, value) in entries {
            writeln!(w, "{} = {}", key, value.as_str().unwrap_or_default())?;
        }
    }
    Ok(marks)
}

/// Findings that do not carry the `key_a = value_a` mark
pub async fn list_findings_with_marks(
    w: &mut impl Write,
    client: &GcpClient,
    source_name: &str,
) -> Result<Vec<Value>> {
    list(
        w,
        client,
        source_name,
        &[("filter", r#"NOT security_marks.marks.key_a="value_a""#)],
    )
    .await
}

async fn fetch_iam_policy(client: &GcpClient, source_name: &str) -> Result<Value> {
    client
        .post(&format!("{}:getIamPolicy", url(client, source_name)), Some(&json!({})))
        .await
        .context("GetIamPolicy")
}

pub async fn get_source_iam_policy(
    w: &mut impl Write,
    client: &GcpClient,
    source_name: &str,
) -> Result<Value> {
    let policy = fetch_iam_policy(client, source_name).await?;
    writeln!(w, "Policy: {}", policy)?;
    Ok(policy)
}

/// Grant `user` the findings editor role, keeping the policy etag
pub async fn set_source_iam_policy(
    w: &mut impl Write,
    client: &GcpClient,
    source_name: &str,
    user: &str,
) -> Result<Value> {
    let current = fetch_iam_policy(client, source_name).await?;

    let mut policy = json!({
        "bindings": [{
            "role": FINDINGS_EDITOR_ROLE,
            "members": [format!("user:{}", user)],
        }],
    });
    if let Some(etag) = current.get("etag") {
        policy["etag"] = etag.clone();
    }

    let updated = client
        .post(
            &format!("{}:setIamPolicy", url(client, source_name)),
            Some(&json!({ "policy": policy })),
        )
        .await
        .context("SetIamPolicy")?;

    writeln!(w, "Bindings:")?;
    if let Some(bindings) = updated.get("bindings").and_then(|v| v.as_array()) {
        for binding in bindings {
            let role = str_field(binding, "role");
            for member in binding
                .get("members")
                .and_then(|v| v.as_array())
                .into_iter()
                .flatten()
                .filter_map(|m| m.as_str())
            {
                writeln!(w, "Principal: {} Role: {}", member, role)?;
            }
        }
    }
    Ok(updated)
}
