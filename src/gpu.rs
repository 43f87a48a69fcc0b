//! Static GPU family → memory lookup.
//!
//! Service definitions may name a GPU family instead of stating memory. Keys
//! cover both the BentoML accelerator names (`nvidia-tesla-t4`) and the
//! short names EC2 reports (`T4`); lookups ignore ASCII case.

/// MiB in one GiB.
pub const MIB_PER_GIB: u64 = 1024;

/// Known GPU families with their on-board memory in GiB.
pub const GPU_MEMORY_GIB: &[(&str, u64)] = &[
    ("nvidia-tesla-k80", 12),
    ("nvidia-tesla-m60", 8),
    ("nvidia-tesla-p4", 8),
    ("nvidia-tesla-p100", 16),
    ("nvidia-tesla-v100", 16),
    ("nvidia-tesla-t4", 16),
    ("nvidia-l4", 24),
    ("nvidia-a10g", 24),
    ("nvidia-tesla-a100", 40),
    ("nvidia-a100-80gb", 80),
    ("nvidia-h100-80gb", 80),
    ("k80", 12),
    ("m60", 8),
    ("v100", 16),
    ("t4", 16),
    ("t4g", 16),
    ("l4", 24),
    ("a10g", 24),
    ("l40s", 48),
    ("a100", 40),
    ("h100", 80),
];

/// Returns the memory in GiB for `family`, if it is known.
#[must_use]
pub fn memory_gib(family: &str) -> Option<u64> {
    let needle = family.trim();
    GPU_MEMORY_GIB
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(needle))
        .map(|(_, gib)| *gib)
}
