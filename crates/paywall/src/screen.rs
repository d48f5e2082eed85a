use std::sync::Arc;

use dialog_flow::{DialogFlow, DialogKind};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::alert::AlertPresenter;
use crate::config::PaywallConfig;
use crate::coordinator::{
    CoordinatorHandle, CoordinatorSnapshot, OperationCoordinator, OperationStatus,
};
use crate::error::{PaywallError, Result};
use crate::service::SubscriptionService;
use crate::tier::{OperationKind, SubscriptionTier};

pub const FREE_TRIAL_ACTION_KEY: &str = "freeTrialPeriodAction";
pub const ACTIVATE_SUBSCRIPTION_ACTION_KEY: &str = "activateSubscriptionAction";

/// Sheets presented by the VPN paywall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaywallSheet {
    None,
    Paywall,
    CodeRedemption,
}

impl DialogKind for PaywallSheet {
    const NONE: Self = PaywallSheet::None;

    fn back_target(self) -> Option<Self> {
        match self {
            PaywallSheet::CodeRedemption => Some(PaywallSheet::Paywall),
            PaywallSheet::None | PaywallSheet::Paywall => None,
        }
    }
}

/// Side effects the paywall asks of the embedding browser.
pub trait PaywallHost: Send + Sync {
    /// Install the VPN configuration once a subscription is active.
    fn install_vpn_profile(&self);
    /// Open the VPN account page so the user can refresh credentials.
    fn open_vpn_authentication(&self);
    /// Present the store's promo-code redemption UI.
    fn present_code_redemption(&self);
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// View model of the VPN paywall screen.
pub struct PaywallScreen {
    sheet: Arc<DialogFlow<PaywallSheet>>,
    coordinator: OperationCoordinator,
    handle: CoordinatorHandle,
    host: Arc<dyn PaywallHost>,
    available_tiers: Vec<SubscriptionTier>,
    selected_tier: SubscriptionTier,
    free_trial_available: bool,
    _watcher: AbortOnDrop,
}

impl PaywallScreen {
    /// Launch the coordinator and show the paywall sheet.
    pub fn present(
        config: &PaywallConfig,
        service: Arc<dyn SubscriptionService>,
        alerts: Arc<dyn AlertPresenter>,
        host: Arc<dyn PaywallHost>,
    ) -> Result<Self> {
        config.validate()?;

        let coordinator = OperationCoordinator::launch(service, alerts, config.coordinator.clone())?;
        let handle = coordinator.handle();

        let sheet = Arc::new(DialogFlow::new());
        sheet.open(PaywallSheet::Paywall);

        let watcher = tokio::spawn(watch_outcomes(
            handle.subscribe(),
            Arc::clone(&sheet),
            Arc::clone(&host),
        ));

        Ok(Self {
            sheet,
            coordinator,
            handle,
            host,
            available_tiers: config.available_tiers.clone(),
            selected_tier: config.default_tier,
            free_trial_available: config.free_trial_available,
            _watcher: AbortOnDrop(watcher),
        })
    }

    pub fn sheet(&self) -> PaywallSheet {
        self.sheet.current()
    }

    pub fn subscribe_sheet(&self) -> watch::Receiver<PaywallSheet> {
        self.sheet.subscribe()
    }

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        self.handle.snapshot()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<CoordinatorSnapshot> {
        self.handle.subscribe()
    }

    pub fn handle(&self) -> CoordinatorHandle {
        self.handle.clone()
    }

    pub fn available_tiers(&self) -> &[SubscriptionTier] {
        &self.available_tiers
    }

    pub fn selected_tier(&self) -> SubscriptionTier {
        self.selected_tier
    }

    pub fn select_tier(&mut self, tier: SubscriptionTier) -> Result<()> {
        if !self.available_tiers.contains(&tier) {
            return Err(PaywallError::ProductUnavailable(tier));
        }
        self.selected_tier = tier;
        Ok(())
    }

    /// Purchase and restore buttons are disabled while this is true.
    pub fn is_busy(&self) -> bool {
        self.handle.status() == OperationStatus::Ongoing
    }

    /// Localisation key for the primary action button.
    pub fn action_label(&self) -> &'static str {
        if self.free_trial_available {
            FREE_TRIAL_ACTION_KEY
        } else {
            ACTIVATE_SUBSCRIPTION_ACTION_KEY
        }
    }

    /// Buy the selected tier. Returns `None` when an operation is already
    /// running and the press was ignored.
    pub async fn purchase(&self) -> Result<Option<u64>> {
        self.run(OperationKind::Purchase(self.selected_tier)).await
    }

    /// Restore previous purchases. Same busy rule as [`Self::purchase`].
    pub async fn restore(&self) -> Result<Option<u64>> {
        self.run(OperationKind::Restore).await
    }

    /// Close the paywall and send the user to the VPN account page.
    pub fn refresh_credentials(&self) {
        self.sheet.close();
        self.host.open_vpn_authentication();
    }

    pub fn redeem_promo_code(&self) {
        self.sheet.open(PaywallSheet::CodeRedemption);
        self.host.present_code_redemption();
    }

    /// The store's redemption UI was dismissed.
    pub fn code_redemption_finished(&self) {
        self.sheet.back();
    }

    pub fn dismiss(&self) {
        self.sheet.close();
    }

    /// Close the screen and stop the coordinator; a pending deadline will
    /// not fire afterwards.
    pub async fn teardown(self) -> Result<()> {
        self.sheet.close();
        self.coordinator.shutdown().await
    }

    async fn run(&self, kind: OperationKind) -> Result<Option<u64>> {
        if self.is_busy() {
            debug!(target: "paywall", operation = %kind, "ignoring press while busy");
            return Ok(None);
        }
        self.handle.start(kind).await.map(Some)
    }
}

/// Install the VPN profile and close the sheet once per successful operation.
async fn watch_outcomes(
    mut status_rx: watch::Receiver<CoordinatorSnapshot>,
    sheet: Arc<DialogFlow<PaywallSheet>>,
    host: Arc<dyn PaywallHost>,
) {
    let mut handled_generation = 0;
    while status_rx.changed().await.is_ok() {
        let snapshot = status_rx.borrow_and_update().clone();
        if snapshot.status != OperationStatus::Success
            || snapshot.generation == handled_generation
        {
            continue;
        }
        handled_generation = snapshot.generation;

        info!(
            target: "paywall",
            generation = snapshot.generation,
            "subscription active; installing VPN profile"
        );
        host.install_vpn_profile();
        sheet.close();
    }
}
