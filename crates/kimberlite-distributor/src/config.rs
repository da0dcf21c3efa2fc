//! Coordinator configuration (SPEC_FULL.md "Ambient stack" → Configuration).
//!
//! Plain struct plus `Deserialize`, following `kimberlite-config`'s
//! convention of keeping config types free of parsing logic themselves —
//! loading from a file or environment is somebody else's job.

use serde::Deserialize;

/// Tunables for [`crate::two_phase_update::TwoPhaseUpdateOperation`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct DistributorConfig {
    /// Whether the safe path may skip straight to a metadata-only Get
    /// round when every replica is already known to be in sync on
    /// timestamps (spec.md §4.5 / original `enable_metadata_only_fetch_...`
    /// cluster feature flag).
    pub enable_metadata_only_fetch_phase_for_inconsistent_updates: bool,
    /// Whether a safe-path update is allowed to restart in the fast path
    /// after its metadata Get observes consistent replica timestamps
    /// (spec.md §4.5).
    pub update_fast_path_restart_enabled: bool,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            enable_metadata_only_fetch_phase_for_inconsistent_updates: true,
            update_fast_path_restart_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_enables_both_optimizations() {
        let config = DistributorConfig::default();
        assert!(config.enable_metadata_only_fetch_phase_for_inconsistent_updates);
        assert!(config.update_fast_path_restart_enabled);
    }

    #[test]
    fn deserializes_partial_toml_with_defaults() {
        let config: DistributorConfig =
            toml::from_str("update_fast_path_restart_enabled = false").unwrap();
        assert!(!config.update_fast_path_restart_enabled);
        assert!(config.enable_metadata_only_fetch_phase_for_inconsistent_updates);
    }
}
