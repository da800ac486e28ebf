//! Compute Engine snippets
//!
//! - [`address`] - reserving, promoting and assigning external IP addresses
//! - [`instances`] - VM lifecycle, templates and bulk creation
//! - [`machine_type`] - custom machine type validation

pub mod address;
pub mod instances;
pub mod machine_type;

pub use address::IpType;
pub use machine_type::{CpuSeries, CustomMachineType, TypeLimit};
