use std::path::PathBuf;

use crate::tier::SubscriptionTier;

/// Convenient result alias for paywall operations.
pub type Result<T> = std::result::Result<T, PaywallError>;

/// Errors produced while coordinating a purchase or restore.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PaywallError {
    /// The store gave no answer before the operation deadline.
    #[error("store did not respond before the deadline")]
    TimeoutExpired,
    /// The store reported a failure.
    #[error("store operation failed: {0}")]
    ExternalFailure(String),
    /// The user dismissed the store prompt.
    #[error("user cancelled the store prompt")]
    UserCancelled,
    /// Receipt validation after a successful operation failed.
    #[error("receipt validation failed: {0}")]
    SecondaryValidationFailed(String),
    /// The store does not offer a product for the requested tier.
    #[error("no store product for the {0} tier")]
    ProductUnavailable(SubscriptionTier),
    /// The coordinator runtime stopped receiving commands.
    #[error("failed to send command to the operation coordinator")]
    ChannelClosed,
    /// The coordinator runtime has shut down.
    #[error("operation coordinator is offline")]
    Offline,
    /// Configuration could not be used.
    #[error("invalid paywall configuration: {0}")]
    Config(String),
    /// Reading the configuration file failed.
    #[error("failed to read {}: {message}", path.display())]
    Io { path: PathBuf, message: String },
}

impl PaywallError {
    /// Whether this error is shown to the user as a failure alert.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            PaywallError::TimeoutExpired
                | PaywallError::ExternalFailure(_)
                | PaywallError::ProductUnavailable(_)
        )
    }
}
