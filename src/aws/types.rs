//! Response documents returned by `aws ec2 ... --output json`.

use serde::Deserialize;

use crate::matcher::{GpuSpec, InstanceTypeDescriptor};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub(super) struct InstanceTypesPage {
    #[serde(default)]
    pub(super) instance_types: Vec<InstanceTypeEntry>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub(super) struct InstanceTypeEntry {
    pub(super) instance_type: String,
    #[serde(default, rename = "VCpuInfo")]
    pub(super) vcpu_info: Option<VcpuInfo>,
    #[serde(default)]
    pub(super) memory_info: Option<MemoryInfo>,
    #[serde(default)]
    pub(super) gpu_info: Option<GpuInfo>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub(super) struct VcpuInfo {
    #[serde(default)]
    pub(super) default_v_cpus: u32,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub(super) struct MemoryInfo {
    #[serde(default, rename = "SizeInMiB")]
    pub(super) size_in_mib: u64,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub(super) struct GpuInfo {
    #[serde(default)]
    pub(super) gpus: Vec<GpuEntry>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub(super) struct GpuEntry {
    pub(super) name: String,
    #[serde(default)]
    pub(super) count: u32,
    #[serde(default)]
    pub(super) memory_info: Option<MemoryInfo>,
}

impl From<InstanceTypeEntry> for InstanceTypeDescriptor {
    fn from(entry: InstanceTypeEntry) -> Self {
        let gpu = entry
            .gpu_info
            .and_then(|info| info.gpus.into_iter().next())
            .map(|first| GpuSpec {
                count: first.count,
                family: first.name,
                memory_mib: first.memory_info.map_or(0, |memory| memory.size_in_mib),
            });
        Self {
            type_name: entry.instance_type,
            vcpu_count: entry.vcpu_info.map_or(0, |vcpu| vcpu.default_v_cpus),
            memory_mib: entry.memory_info.map_or(0, |memory| memory.size_in_mib),
            gpu,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub(super) struct SecurityGroupsPage {
    #[serde(default)]
    pub(super) security_groups: Vec<SecurityGroupEntry>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub(super) struct SecurityGroupEntry {
    pub(super) group_id: String,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub(super) struct Reservation {
    #[serde(default)]
    pub(super) reservation_id: Option<String>,
    #[serde(default)]
    pub(super) instances: Vec<InstanceEntry>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub(super) struct InstanceEntry {
    pub(super) instance_id: String,
}
