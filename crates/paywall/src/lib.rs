//! Purchase and restore coordination for the VPN paywall.
//!
//! The paywall talks to an in-app purchase store that may answer late or
//! never. [`OperationCoordinator`] runs every status transition on a single
//! runtime task: store calls and deadlines are spawned alongside it and
//! report back tagged with the generation of the operation they belong to,
//! so whichever arrives first decides the outcome and anything later is
//! dropped.
//!
//! ```ignore
//! use std::sync::Arc;
//! use paywall::{LogAlertPresenter, PaywallConfig, PaywallScreen};
//!
//! # async fn demo(store: Arc<dyn paywall::SubscriptionService>, host: Arc<dyn paywall::PaywallHost>) -> paywall::Result<()> {
//! let screen = PaywallScreen::present(
//!     &PaywallConfig::default(),
//!     store,
//!     Arc::new(LogAlertPresenter),
//!     host,
//! )?;
//! screen.purchase().await?;
//! let outcome = screen.handle().settled().await?;
//! println!("paywall finished with {:?}", outcome.status);
//! screen.teardown().await?;
//! # Ok(())
//! # }
//! ```

mod alert;
mod config;
mod coordinator;
mod error;
mod screen;
mod service;
mod tier;

pub use alert::{
    AlertPresenter, FailureAlert, LogAlertPresenter, PURCHASE_FAILED_BODY_KEY,
    PURCHASE_FAILED_TITLE_KEY,
};
pub use config::{CoordinatorConfig, PaywallConfig};
pub use coordinator::{CoordinatorHandle, CoordinatorSnapshot, OperationCoordinator, OperationStatus};
pub use error::{PaywallError, Result};
pub use screen::{
    PaywallHost, PaywallScreen, PaywallSheet, ACTIVATE_SUBSCRIPTION_ACTION_KEY,
    FREE_TRIAL_ACTION_KEY,
};
pub use service::{
    Receipt, SimulatedStore, StoreBehaviour, StoreFailure, StoreOutcome, SubscriptionService,
};
pub use tier::{OperationKind, SubscriptionTier};
