//! Parameter Manager snippets
//!
//! Every snippet works against either the global endpoint or a regional
//! `parametermanager.{location}.rep.googleapis.com` endpoint, chosen by
//! [`ParameterLocation`].

pub mod params;
pub mod versions;

use crate::gcp::client::GcpClient;
use std::fmt;

/// Where parameters live, which also picks the API host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterLocation {
    Global,
    Regional(String),
}

impl ParameterLocation {
    pub fn location_id(&self) -> &str {
        match self {
            ParameterLocation::Global => "global",
            ParameterLocation::Regional(location) => location.as_str(),
        }
    }

    /// Noun used in output, `parameter` or `regional parameter`
    pub fn kind(&self) -> &'static str {
        match self {
            ParameterLocation::Global => "parameter",
            ParameterLocation::Regional(_) => "regional parameter",
        }
    }

    /// `{host}/v1` for this location
    pub fn api_root(&self, client: &GcpClient) -> String {
        let host = match self {
            ParameterLocation::Global => client.endpoints.parametermanager.clone(),
            ParameterLocation::Regional(location) => {
                client.endpoints.parametermanager_regional_host(location)
            }
        };
        format!("{}/v1", host)
    }

    pub fn parent(&self, project: &str) -> String {
        format!("projects/{}/locations/{}", project, self.location_id())
    }

    pub fn parameter_name(&self, project: &str, parameter_id: &str) -> String {
        format!("{}/parameters/{}", self.parent(project), parameter_id)
    }

    pub fn version_name(&self, project: &str, parameter_id: &str, version_id: &str) -> String {
        format!(
            "{}/versions/{}",
            self.parameter_name(project, parameter_id),
            version_id
        )
    }
}

/// Payload format a parameter enforces on its versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ParameterFormat {
    Unformatted,
    Yaml,
    Json,
}

impl ParameterFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterFormat::Unformatted => "UNFORMATTED",
            ParameterFormat::Yaml => "YAML",
            ParameterFormat::Json => "JSON",
        }
    }
}

impl fmt::Display for ParameterFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ParameterFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UNFORMATTED" => Ok(ParameterFormat::Unformatted),
            "YAML" => Ok(ParameterFormat::Yaml),
            "JSON" => Ok(ParameterFormat::Json),
            other => anyhow::bail!("unknown parameter format: {}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcp::auth::GcpCredentials;

    #[test]
    fn test_location_names_and_hosts() {
        let client = GcpClient::with_credentials(GcpCredentials::from_static_token("t")).unwrap();

        let global = ParameterLocation::Global;
        assert_eq!(global.kind(), "parameter");
        assert_eq!(global.api_root(&client), "https://parametermanager.googleapis.com/v1");
        assert_eq!(
            global.version_name("p", "param", "v1"),
            "projects/p/locations/global/parameters/param/versions/v1"
        );

        let regional = ParameterLocation::Regional("us-central1".to_string());
        assert_eq!(regional.kind(), "regional parameter");
        assert_eq!(
            regional.api_root(&client),
            "https://parametermanager.us-central1.rep.googleapis.com/v1"
        );
        assert_eq!(
            regional.parameter_name("p", "param"),
            "projects/p/locations/us-central1/parameters/param"
        );
    }

    #[test]
    fn test_parameter_format_parsing() {
        assert_eq!("json".parse::<ParameterFormat>().unwrap(), ParameterFormat::Json);
        assert_eq!(ParameterFormat::Yaml.to_string(), "YAML");
        assert!("xml".parse::<ParameterFormat>().is_err());
    }
}
