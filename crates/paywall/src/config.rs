use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PaywallError, Result};
use crate::tier::{OperationKind, SubscriptionTier};

const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 30;
const DEFAULT_COMMAND_BUFFER: usize = 64;

/// Knobs for the operation coordinator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Seconds to wait for the store to answer a purchase.
    pub purchase_timeout_secs: u64,
    /// Seconds to wait for the store to answer a restore.
    pub restore_timeout_secs: u64,
    /// Capacity of the coordinator's command channel.
    pub command_buffer: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            purchase_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
            restore_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }
}

impl CoordinatorConfig {
    pub fn timeout_for(&self, kind: OperationKind) -> Duration {
        match kind {
            OperationKind::Purchase(_) => Duration::from_secs(self.purchase_timeout_secs),
            OperationKind::Restore => Duration::from_secs(self.restore_timeout_secs),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.purchase_timeout_secs == 0 || self.restore_timeout_secs == 0 {
            return Err(PaywallError::Config(
                "operation timeouts must be at least one second".into(),
            ));
        }
        if self.command_buffer == 0 {
            return Err(PaywallError::Config(
                "command buffer must hold at least one command".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for a paywall screen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PaywallConfig {
    pub available_tiers: Vec<SubscriptionTier>,
    pub default_tier: SubscriptionTier,
    pub free_trial_available: bool,
    pub coordinator: CoordinatorConfig,
}

impl Default for PaywallConfig {
    fn default() -> Self {
        Self {
            available_tiers: vec![SubscriptionTier::Yearly, SubscriptionTier::Monthly],
            default_tier: SubscriptionTier::Yearly,
            free_trial_available: true,
            coordinator: CoordinatorConfig::default(),
        }
    }
}

impl PaywallConfig {
    /// Load a JSON configuration file; absent fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|err| PaywallError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        let config: PaywallConfig = serde_json::from_str(&raw).map_err(|err| {
            PaywallError::Config(format!("{}: {err}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.available_tiers.is_empty() {
            return Err(PaywallError::Config(
                "at least one subscription tier must be offered".into(),
            ));
        }
        if !self.available_tiers.contains(&self.default_tier) {
            return Err(PaywallError::Config(format!(
                "default tier {} is not offered",
                self.default_tier
            )));
        }
        self.coordinator.validate()
    }
}
