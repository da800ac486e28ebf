//! Security Command Center snippets
//!
//! `v1` covers organization sources, findings, security marks and source IAM.
//! `v2` covers the location-scoped finding calls.

pub mod v1;
pub mod v2;

use crate::gcp::client::str_field;
use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::io::Write;

pub const SAMPLE_FINDING_ID: &str = "samplefindingid";
pub const SAMPLE_FINDING_WITH_PROPERTIES_ID: &str = "samplefindingprops";

/// Resource the sample findings point at
pub const SAMPLE_RESOURCE_NAME: &str = "//cloudresourcemanager.googleapis.com/organizations/11232";

pub fn rfc3339(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Seconds since the epoch of a finding's `eventTime`, 0 when absent
pub fn event_time_secs(finding: &Value) -> i64 {
    DateTime::parse_from_rfc3339(str_field(finding, "eventTime"))
        .map(|t| t.timestamp())
        .unwrap_or(0)
}

/// Render a protobuf `Value` the way the samples print properties
fn property_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Print `Source Properties:` followed by one `key = value` line each
pub(crate) fn write_source_properties(w: &mut impl Write, finding: &Value) -> Result<()> {
    writeln!(w, "Source Properties:")?;
    if let Some(props) = finding.get("sourceProperties").and_then(|v| v.as_object()) {
        for (key, value) in props {
            writeln!(w, "{} = {}", key, property_text(value))?;
        }
    }
    Ok(())
}

/// Common summary lines after a finding mutation
pub(crate) fn write_finding(w: &mut impl Write, verb: &str, finding: &Value) -> Result<()> {
    writeln!(w, "Finding {}: {}", verb, str_field(finding, "name"))?;
    writeln!(w, "Finding state: {}", str_field(finding, "state"))?;
    writeln!(w, "Event time (Epoch Seconds): {}", event_time_secs(finding))?;
    Ok(())
}
