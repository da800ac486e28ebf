//! Google Cloud API snippets
//!
//! Each service module holds small, independent functions that perform one
//! task against a Google Cloud REST API and write a confirmation to an output
//! sink. They all share the transport in [`gcp`].

pub mod compute;
pub mod config;
pub mod credentials;
pub mod gaming;
pub mod gcp;
pub mod genai;
pub mod parametermanager;
pub mod privateca;
pub mod securitycenter;
pub mod spanner;

/// Version injected at compile time via GCP_SNIPPETS_VERSION, or "dev"
pub const VERSION: &str = match option_env!("GCP_SNIPPETS_VERSION") {
    Some(v) => v,
    None => "dev",
};
