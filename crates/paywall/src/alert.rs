use serde::Serialize;
use tracing::warn;

use crate::error::PaywallError;
use crate::tier::OperationKind;

pub const PURCHASE_FAILED_TITLE_KEY: &str = "vpnErrorPurchaseFailedTitle";
pub const PURCHASE_FAILED_BODY_KEY: &str = "vpnErrorPurchaseFailedBody";

/// Failure the user has to be told about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureAlert {
    pub generation: u64,
    pub operation: OperationKind,
    pub title_key: &'static str,
    pub body_key: &'static str,
    pub reason: String,
    #[serde(skip)]
    pub error: PaywallError,
}

impl FailureAlert {
    pub fn new(generation: u64, operation: OperationKind, error: PaywallError) -> Self {
        Self {
            generation,
            operation,
            title_key: PURCHASE_FAILED_TITLE_KEY,
            body_key: PURCHASE_FAILED_BODY_KEY,
            reason: error.to_string(),
            error,
        }
    }
}

/// Shows failure alerts on behalf of the coordinator.
///
/// Invoked exactly once per failed operation that the user should see;
/// voluntary cancellation never reaches the presenter.
pub trait AlertPresenter: Send + Sync {
    fn present_failure(&self, alert: &FailureAlert);
}

/// Presenter that only writes the alert to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertPresenter;

impl AlertPresenter for LogAlertPresenter {
    fn present_failure(&self, alert: &FailureAlert) {
        warn!(
            target: "paywall",
            generation = alert.generation,
            operation = %alert.operation,
            reason = %alert.reason,
            "{}",
            alert.title_key
        );
    }
}
