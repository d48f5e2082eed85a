use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PaywallError;
use crate::tier::SubscriptionTier;

/// Proof of a completed purchase or restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub transaction_id: String,
    /// The store asks the client to validate the receipt with the backend.
    #[serde(default)]
    pub validation_required: bool,
}

impl Receipt {
    pub fn new(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            validation_required: false,
        }
    }

    pub fn requiring_validation(mut self) -> Self {
        self.validation_required = true;
        self
    }
}

/// Negative answer from the store.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "failure", content = "reason", rename_all = "snake_case")]
pub enum StoreFailure {
    /// The user dismissed the store's payment sheet.
    #[error("payment cancelled by user")]
    Cancelled,
    #[error("{0}")]
    Failed(String),
}

impl From<StoreFailure> for PaywallError {
    fn from(failure: StoreFailure) -> Self {
        match failure {
            StoreFailure::Cancelled => PaywallError::UserCancelled,
            StoreFailure::Failed(reason) => PaywallError::ExternalFailure(reason),
        }
    }
}

/// Outcome of a single store call.
pub type StoreOutcome = std::result::Result<Receipt, StoreFailure>;

/// In-app purchase backend used by the paywall.
///
/// Calls may never resolve; the coordinator bounds them with its own
/// deadline and drops any answer that arrives after it gave up.
#[async_trait]
pub trait SubscriptionService: Send + Sync {
    /// Whether the store has a product loaded for `tier`.
    fn has_product(&self, tier: SubscriptionTier) -> bool;

    async fn purchase(&self, tier: SubscriptionTier) -> StoreOutcome;

    async fn restore(&self) -> StoreOutcome;

    /// Validate the latest receipt with the subscription backend.
    async fn validate_receipt(&self) -> std::result::Result<(), String>;
}

/// How a [`SimulatedStore`] answers one kind of call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBehaviour {
    /// Resolve with `outcome` after `after` has elapsed.
    Respond {
        after: Duration,
        outcome: StoreOutcome,
    },
    /// Never resolve.
    Silent,
}

impl StoreBehaviour {
    pub fn succeed_after(after: Duration) -> Self {
        StoreBehaviour::Respond {
            after,
            outcome: Ok(Receipt::new("simulated")),
        }
    }

    pub fn fail_after(after: Duration, reason: impl Into<String>) -> Self {
        StoreBehaviour::Respond {
            after,
            outcome: Err(StoreFailure::Failed(reason.into())),
        }
    }

    pub fn cancel_after(after: Duration) -> Self {
        StoreBehaviour::Respond {
            after,
            outcome: Err(StoreFailure::Cancelled),
        }
    }

    async fn play(&self) -> StoreOutcome {
        match self {
            StoreBehaviour::Respond { after, outcome } => {
                tokio::time::sleep(*after).await;
                outcome.clone()
            }
            StoreBehaviour::Silent => std::future::pending().await,
        }
    }
}

/// Scripted store used by the `flows` driver and by tests.
#[derive(Debug)]
pub struct SimulatedStore {
    products: HashSet<SubscriptionTier>,
    purchase: StoreBehaviour,
    restore: StoreBehaviour,
    validation: std::result::Result<(), String>,
    purchases: AtomicUsize,
    restores: AtomicUsize,
    validations: AtomicUsize,
}

impl SimulatedStore {
    pub fn new(purchase: StoreBehaviour, restore: StoreBehaviour) -> Self {
        Self {
            products: [SubscriptionTier::Yearly, SubscriptionTier::Monthly]
                .into_iter()
                .collect(),
            purchase,
            restore,
            validation: Ok(()),
            purchases: AtomicUsize::new(0),
            restores: AtomicUsize::new(0),
            validations: AtomicUsize::new(0),
        }
    }

    /// Restrict the products the store has loaded.
    pub fn with_products(mut self, tiers: impl IntoIterator<Item = SubscriptionTier>) -> Self {
        self.products = tiers.into_iter().collect();
        self
    }

    pub fn with_validation(mut self, validation: std::result::Result<(), String>) -> Self {
        self.validation = validation;
        self
    }

    pub fn purchase_calls(&self) -> usize {
        self.purchases.load(Ordering::SeqCst)
    }

    pub fn restore_calls(&self) -> usize {
        self.restores.load(Ordering::SeqCst)
    }

    pub fn validation_calls(&self) -> usize {
        self.validations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubscriptionService for SimulatedStore {
    fn has_product(&self, tier: SubscriptionTier) -> bool {
        self.products.contains(&tier)
    }

    async fn purchase(&self, tier: SubscriptionTier) -> StoreOutcome {
        self.purchases.fetch_add(1, Ordering::SeqCst);
        debug!(target: "paywall", %tier, behaviour = ?self.purchase, "simulated purchase");
        self.purchase.play().await
    }

    async fn restore(&self) -> StoreOutcome {
        self.restores.fetch_add(1, Ordering::SeqCst);
        debug!(target: "paywall", behaviour = ?self.restore, "simulated restore");
        self.restore.play().await
    }

    async fn validate_receipt(&self) -> std::result::Result<(), String> {
        self.validations.fetch_add(1, Ordering::SeqCst);
        self.validation.clone()
    }
}
