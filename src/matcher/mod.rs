//! Instance-type matching and ranking.
//!
//! Given a GPU requirement and the provider's instance catalog, [`filter`]
//! keeps the instance types able to host the service and orders them so the
//! operator sees the same list regardless of catalog order.
//!
//! Near matches, such as the right memory on a different GPU family, are
//! excluded without comment. Surfacing them with a warning would be a
//! relaxation of the current policy.

use std::cmp::Ordering;

use thiserror::Error;

use crate::gpu::{self, MIB_PER_GIB};

/// GPU group attached to an instance type.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GpuSpec {
    /// Number of GPUs in the group.
    pub count: u32,
    /// Model name reported by the provider (for example `T4`).
    pub family: String,
    /// Memory per GPU in MiB.
    pub memory_mib: u64,
}

/// One entry of the provider's instance catalog.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceTypeDescriptor {
    /// Provider name such as `g4dn.xlarge`.
    pub type_name: String,
    /// Default vCPU count.
    pub vcpu_count: u32,
    /// System memory in MiB.
    pub memory_mib: u64,
    /// First GPU group, when the type has GPUs.
    pub gpu: Option<GpuSpec>,
}

impl InstanceTypeDescriptor {
    /// Family prefix: the part of the type name before the first `.`.
    #[must_use]
    pub fn family(&self) -> &str {
        self.type_name
            .split('.')
            .next()
            .unwrap_or(self.type_name.as_str())
    }

    /// GPU count, zero for CPU-only types.
    #[must_use]
    pub fn gpu_count(&self) -> u32 {
        self.gpu.as_ref().map_or(0, |gpu| gpu.count)
    }

    fn sort_key(&self) -> (&str, u32, u32, u64, &str) {
        (
            self.family(),
            self.gpu_count(),
            self.vcpu_count,
            self.memory_mib,
            self.type_name.as_str(),
        )
    }
}

/// Resources a service asks for.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ResourceRequirement {
    /// Number of GPUs; zero means CPU-only.
    pub gpu_count: u32,
    /// Memory per GPU in MiB, when stated explicitly.
    pub gpu_memory_mib: Option<u64>,
    /// GPU family, used to look up memory when it is not stated.
    pub gpu_family: Option<String>,
}

impl ResourceRequirement {
    /// Resolves memory per GPU in MiB: explicit memory first, then the GPU
    /// family table.
    #[must_use]
    pub fn resolved_gpu_memory_mib(&self) -> Option<u64> {
        self.gpu_memory_mib.or_else(|| {
            self.gpu_family
                .as_deref()
                .and_then(gpu::memory_gib)
                .and_then(|gib| gib.checked_mul(MIB_PER_GIB))
        })
    }
}

/// Strictness applied when comparing GPUs.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum MatchLevel {
    /// GPU count and memory must equal the requirement.
    #[default]
    Exact,
    /// GPU count and memory must each meet or exceed the requirement.
    Usable,
}

/// Errors raised while matching instance types.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum MatchError {
    /// Raised when GPUs are required but their memory cannot be determined.
    #[error("GPU memory is unknown: set gpu_memory or a known gpu_type (got {})", .family.as_deref().unwrap_or("none"))]
    MissingGpuSpec {
        /// Family that failed to resolve, if one was given.
        family: Option<String>,
    },
    /// Raised when no instance type satisfies the requirement.
    #[error("no instance type satisfies {gpu_count} GPU(s) at the {level:?} level")]
    NoEligibleInstance {
        /// Requested GPU count.
        gpu_count: u32,
        /// Level used for the comparison.
        level: MatchLevel,
    },
}

/// Returns the eligible instance types in display order.
///
/// # Errors
///
/// Returns [`MatchError::MissingGpuSpec`] when GPUs are required and their
/// memory cannot be resolved, and [`MatchError::NoEligibleInstance`] when
/// nothing in the catalog qualifies.
pub fn filter(
    catalog: &[InstanceTypeDescriptor],
    requirement: &ResourceRequirement,
    level: MatchLevel,
) -> Result<Vec<InstanceTypeDescriptor>, MatchError> {
    let required_memory_mib = if requirement.gpu_count == 0 {
        0
    } else {
        requirement
            .resolved_gpu_memory_mib()
            .ok_or_else(|| MatchError::MissingGpuSpec {
                family: requirement.gpu_family.clone(),
            })?
    };

    let mut eligible: Vec<InstanceTypeDescriptor> = catalog
        .iter()
        .filter(|descriptor| {
            is_eligible(descriptor, requirement.gpu_count, required_memory_mib, level)
        })
        .cloned()
        .collect();

    if eligible.is_empty() {
        return Err(MatchError::NoEligibleInstance {
            gpu_count: requirement.gpu_count,
            level,
        });
    }

    eligible.sort_by(compare);
    Ok(eligible)
}

fn is_eligible(
    descriptor: &InstanceTypeDescriptor,
    gpu_count: u32,
    memory_mib: u64,
    level: MatchLevel,
) -> bool {
    if gpu_count == 0 {
        return descriptor.gpu.is_none();
    }

    let Some(gpu) = descriptor.gpu.as_ref().filter(|gpu| gpu.count > 0) else {
        return false;
    };

    if gpu.count == gpu_count && gpu.memory_mib == memory_mib {
        return true;
    }
    let covers = gpu.count >= gpu_count && gpu.memory_mib >= memory_mib;
    covers && level == MatchLevel::Usable
}

fn compare(lhs: &InstanceTypeDescriptor, rhs: &InstanceTypeDescriptor) -> Ordering {
    lhs.sort_key().cmp(&rhs.sort_key())
}

/// Operator-facing label for an instance type.
#[must_use]
pub fn instance_card(descriptor: &InstanceTypeDescriptor) -> String {
    let gpu = descriptor.gpu.as_ref().map_or_else(
        || String::from("none"),
        |gpu| format!("{} x {}", gpu.family, gpu.count),
    );
    format!(
        "{} (cpus: {}, mem: {}, gpu: {gpu})",
        descriptor.type_name, descriptor.vcpu_count, descriptor.memory_mib
    )
}
