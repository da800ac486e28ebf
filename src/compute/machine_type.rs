//! Custom machine types
//!
//! Builds and validates the `zones/{zone}/machineTypes/...` strings accepted by
//! Compute Engine for custom machine shapes.
//! See <https://cloud.google.com/compute/docs/general-purpose-machines#custom_machine_types>

use anyhow::Result;
use std::fmt;

/// CPU series that support custom shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum CpuSeries {
    N1,
    N2,
    #[value(name = "n2d")]
    N2D,
    E2,
    E2Micro,
    E2Small,
    E2Medium,
}

impl CpuSeries {
    pub const ALL: [CpuSeries; 7] = [
        CpuSeries::N1,
        CpuSeries::N2,
        CpuSeries::N2D,
        CpuSeries::E2,
        CpuSeries::E2Micro,
        CpuSeries::E2Small,
        CpuSeries::E2Medium,
    ];

    /// Machine type prefix used by the Compute Engine API
    pub fn prefix(&self) -> &'static str {
        match self {
            CpuSeries::N1 => "custom",
            CpuSeries::N2 => "n2-custom",
            CpuSeries::N2D => "n2d-custom",
            CpuSeries::E2 => "e2-custom",
            CpuSeries::E2Micro => "e2-custom-micro",
            CpuSeries::E2Small => "e2-custom-small",
            CpuSeries::E2Medium => "e2-custom-medium",
        }
    }

    /// Parse a machine type prefix
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.prefix() == prefix)
    }

    /// Shared-core E2 shapes always run on 2 vCPUs
    pub fn is_shared_core(&self) -> bool {
        matches!(
            self,
            CpuSeries::E2Micro | CpuSeries::E2Small | CpuSeries::E2Medium
        )
    }

    pub fn limit(&self) -> TypeLimit {
        match self {
            CpuSeries::E2 => TypeLimit {
                allowed_cores: make_range(2, 33, 2),
                min_mem_per_core: 512,
                max_mem_per_core: 8192,
                allow_extra_memory: false,
                extra_memory_limit: 0,
            },
            CpuSeries::E2Micro => TypeLimit::shared_core(1024, 2048),
            CpuSeries::E2Small => TypeLimit::shared_core(2048, 4096),
            CpuSeries::E2Medium => TypeLimit::shared_core(4096, 8192),
            CpuSeries::N2 => {
                let mut allowed_cores = make_range(2, 33, 2);
                allowed_cores.extend(make_range(36, 129, 4));
                TypeLimit {
                    allowed_cores,
                    min_mem_per_core: 512,
                    max_mem_per_core: 8192,
                    allow_extra_memory: true,
                    extra_memory_limit: 624 << 10,
                }
            }
            CpuSeries::N2D => TypeLimit {
                allowed_cores: vec![2, 4, 8, 16, 32, 48, 64, 80, 96],
                min_mem_per_core: 512,
                max_mem_per_core: 8192,
                allow_extra_memory: true,
                extra_memory_limit: 768 << 10,
            },
            CpuSeries::N1 => {
                let mut allowed_cores = vec![1];
                allowed_cores.extend(make_range(2, 97, 2));
                TypeLimit {
                    allowed_cores,
                    min_mem_per_core: 922,
                    max_mem_per_core: 6656,
                    allow_extra_memory: true,
                    extra_memory_limit: 624 << 10,
                }
            }
        }
    }
}

impl fmt::Display for CpuSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Limits for one CPU series. Memory values are in MB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeLimit {
    /// Empty means any core count is accepted
    pub allowed_cores: Vec<u32>,
    pub min_mem_per_core: u32,
    pub max_mem_per_core: u32,
    pub allow_extra_memory: bool,
    pub extra_memory_limit: u32,
}

impl TypeLimit {
    fn shared_core(min_mem_per_core: u32, max_mem_per_core: u32) -> Self {
        Self {
            allowed_cores: Vec::new(),
            min_mem_per_core,
            max_mem_per_core,
            allow_extra_memory: false,
            extra_memory_limit: 0,
        }
    }
}

/// `start..end` stepping by `step`, end exclusive
fn make_range(start: u32, end: u32, step: usize) -> Vec<u32> {
    (start..end).step_by(step).collect()
}

/// Render a core list the way the API error messages show it: `[2 4 6]`
fn format_cores(cores: &[u32]) -> String {
    let joined = cores
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    format!("[{}]", joined)
}

/// A validated custom machine type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomMachineType {
    pub zone: String,
    pub series: CpuSeries,
    pub memory_mb: u32,
    pub core_count: u32,
    limit: TypeLimit,
}

impl CustomMachineType {
    /// Validate a custom shape. Shared-core series ignore `core_count`.
    pub fn new(
        zone: impl Into<String>,
        series: CpuSeries,
        memory_mb: u32,
        core_count: u32,
    ) -> Result<Self> {
        let core_count = if series.is_shared_core() { 2 } else { core_count };
        let machine_type = Self {
            zone: zone.into(),
            series,
            memory_mb,
            core_count,
            limit: series.limit(),
        };
        machine_type.validate()?;
        Ok(machine_type)
    }

    fn validate(&self) -> Result<()> {
        let limit = &self.limit;

        if !limit.allowed_cores.is_empty() && !limit.allowed_cores.contains(&self.core_count) {
            anyhow::bail!(
                "invalid number of cores requested. Allowed number of cores for {} is: {}",
                self.series,
                format_cores(&limit.allowed_cores)
            );
        }

        if self.memory_mb % 256 != 0 {
            anyhow::bail!("requested memory must be a multiple of 256 MB");
        }

        if u64::from(self.memory_mb) < self.cores_times(limit.min_mem_per_core) {
            anyhow::bail!(
                "requested memory is too low. Minimal memory for {} is {} MB per core",
                self.series,
                limit.min_mem_per_core
            );
        }

        if limit.allow_extra_memory {
            if self.memory_mb > limit.extra_memory_limit {
                anyhow::bail!(
                    "requested memory is too large. Maximum memory allowed for {} is {} MB",
                    self.series,
                    limit.extra_memory_limit
                );
            }
        } else if self.is_extra_memory_used() {
            anyhow::bail!(
                "requested memory is too large. Maximum memory allowed for {} is {} MB per core",
                self.series,
                limit.max_mem_per_core
            );
        }

        Ok(())
    }

    fn cores_times(&self, per_core: u32) -> u64 {
        u64::from(self.core_count) * u64::from(per_core)
    }

    /// Memory above the per-core maximum, which needs the `-ext` suffix
    pub fn is_extra_memory_used(&self) -> bool {
        u64::from(self.memory_mb) > self.cores_times(self.limit.max_mem_per_core)
    }

    pub fn limit(&self) -> &TypeLimit {
        &self.limit
    }

    /// Machine type without the zone, e.g. `n2-custom-8-10240`.
    /// This is the form instance templates expect.
    pub fn short_name(&self) -> String {
        let full = self.to_string();
        full.rsplit('/').next().unwrap_or_default().to_string()
    }
}

impl fmt::Display for CustomMachineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.series.is_shared_core() {
            return write!(
                f,
                "zones/{}/machineTypes/{}-{}",
                self.zone, self.series, self.memory_mb
            );
        }

        write!(
            f,
            "zones/{}/machineTypes/{}-{}-{}",
            self.zone, self.series, self.core_count, self.memory_mb
        )?;
        if self.is_extra_memory_used() {
            f.write_str("-ext")?;
        }
        Ok(())
    }
}
