//! GCP API interaction module
//!
//! This module provides the shared transport every snippet is built on:
//! authentication, the HTTP client, endpoint resolution and long-running
//! operation handling.
//!
//! # Module Structure
//!
//! - [`auth`] - GCP authentication using Application Default Credentials
//! - [`client`] - Main GCP client and per-service URL builders
//! - [`http`] - HTTP utilities for REST API calls
//! - [`operation`] - Waiting on Compute and `google.longrunning` operations
//!
//! # Example
//!
//! ```ignore
//! use gcp_snippets::gcp::client::GcpClient;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = GcpClient::new().await?;
//!     let url = client.compute_zonal_url("my-project", "us-central1-a", "instances");
//!     let instances = client.get(&url).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
pub mod operation;

pub use client::{Endpoints, GcpClient};
