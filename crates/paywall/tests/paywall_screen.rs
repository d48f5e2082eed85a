use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use paywall::{
    AlertPresenter, CoordinatorConfig, FailureAlert, OperationCoordinator, OperationKind,
    OperationStatus, PaywallConfig, PaywallError, PaywallHost, PaywallScreen, PaywallSheet,
    Receipt, SimulatedStore, StoreBehaviour, SubscriptionTier, ACTIVATE_SUBSCRIPTION_ACTION_KEY,
    FREE_TRIAL_ACTION_KEY,
};
use tokio::time::{sleep, Instant};

#[derive(Default)]
struct RecordingAlerts {
    alerts: Mutex<Vec<FailureAlert>>,
}

impl RecordingAlerts {
    fn count(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }
}

impl AlertPresenter for RecordingAlerts {
    fn present_failure(&self, alert: &FailureAlert) {
        self.alerts.lock().unwrap().push(alert.clone());
    }
}

#[derive(Default)]
struct RecordingHost {
    installs: AtomicUsize,
    authentications: AtomicUsize,
    redemptions: AtomicUsize,
}

impl PaywallHost for RecordingHost {
    fn install_vpn_profile(&self) {
        self.installs.fetch_add(1, Ordering::SeqCst);
    }

    fn open_vpn_authentication(&self) {
        self.authentications.fetch_add(1, Ordering::SeqCst);
    }

    fn present_code_redemption(&self) {
        self.redemptions.fetch_add(1, Ordering::SeqCst);
    }
}

struct Fixture {
    screen: PaywallScreen,
    store: Arc<SimulatedStore>,
    alerts: Arc<RecordingAlerts>,
    host: Arc<RecordingHost>,
}

fn present(store: SimulatedStore, config: PaywallConfig) -> Fixture {
    let store = Arc::new(store);
    let alerts = Arc::new(RecordingAlerts::default());
    let host = Arc::new(RecordingHost::default());
    let screen = PaywallScreen::present(&config, store.clone(), alerts.clone(), host.clone())
        .expect("paywall presents");
    Fixture {
        screen,
        store,
        alerts,
        host,
    }
}

/// Purchase against a silent store fails at the deadline with one alert.
#[tokio::test(start_paused = true)]
async fn silent_purchase_times_out() {
    let store = Arc::new(SimulatedStore::new(
        StoreBehaviour::Silent,
        StoreBehaviour::Silent,
    ));
    let alerts = Arc::new(RecordingAlerts::default());
    let coordinator =
        OperationCoordinator::launch(store.clone(), alerts.clone(), CoordinatorConfig::default())
            .unwrap();
    let handle = coordinator.handle();
    let started = Instant::now();

    handle
        .start(OperationKind::Purchase(SubscriptionTier::Yearly))
        .await
        .unwrap();
    let snapshot = handle.settled().await.unwrap();

    assert_eq!(snapshot.status, OperationStatus::Failure);
    assert!(started.elapsed() >= Duration::from_secs(30));
    assert_eq!(store.purchase_calls(), 1);
    assert_eq!(alerts.count(), 1);
    assert_eq!(
        alerts.alerts.lock().unwrap()[0].error,
        PaywallError::TimeoutExpired
    );

    sleep(Duration::from_secs(90)).await;
    assert_eq!(alerts.count(), 1);
}

/// Restore answered at t=5 succeeds, installs the profile and closes the sheet.
#[tokio::test(start_paused = true)]
async fn restore_success_closes_paywall() {
    let fixture = present(
        SimulatedStore::new(
            StoreBehaviour::Silent,
            StoreBehaviour::succeed_after(Duration::from_secs(5)),
        ),
        PaywallConfig::default(),
    );
    let mut sheet_rx = fixture.screen.subscribe_sheet();
    assert_eq!(fixture.screen.sheet(), PaywallSheet::Paywall);

    let started = Instant::now();
    fixture.screen.restore().await.unwrap();
    let snapshot = fixture.screen.handle().settled().await.unwrap();
    assert_eq!(snapshot.status, OperationStatus::Success);
    assert!(started.elapsed() < Duration::from_secs(30));

    sheet_rx
        .wait_for(|sheet| *sheet == PaywallSheet::None)
        .await
        .unwrap();
    assert_eq!(fixture.host.installs.load(Ordering::SeqCst), 1);

    sleep(Duration::from_secs(60)).await;
    assert_eq!(fixture.screen.snapshot().status, OperationStatus::Success);
    assert_eq!(fixture.alerts.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn presses_are_ignored_while_busy() {
    let fixture = present(
        SimulatedStore::new(
            StoreBehaviour::succeed_after(Duration::from_secs(10)),
            StoreBehaviour::Silent,
        ),
        PaywallConfig::default(),
    );

    let first = fixture.screen.purchase().await.unwrap();
    assert!(first.is_some());
    assert!(fixture.screen.is_busy());

    assert_eq!(fixture.screen.purchase().await.unwrap(), None);
    assert_eq!(fixture.screen.restore().await.unwrap(), None);

    fixture.screen.handle().settled().await.unwrap();
    assert!(!fixture.screen.is_busy());
    assert_eq!(fixture.store.purchase_calls(), 1);
    assert_eq!(fixture.store.restore_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancelled_payment_stays_on_paywall_without_alert() {
    let fixture = present(
        SimulatedStore::new(
            StoreBehaviour::cancel_after(Duration::from_secs(2)),
            StoreBehaviour::Silent,
        ),
        PaywallConfig::default(),
    );

    fixture.screen.purchase().await.unwrap();
    let snapshot = fixture.screen.handle().settled().await.unwrap();
    assert_eq!(snapshot.status, OperationStatus::Idle);

    sleep(Duration::from_secs(60)).await;
    assert_eq!(fixture.alerts.count(), 0);
    assert_eq!(fixture.screen.sheet(), PaywallSheet::Paywall);
    assert_eq!(fixture.host.installs.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn declined_payment_alerts_then_retry_succeeds() {
    let fixture = present(
        SimulatedStore::new(
            StoreBehaviour::fail_after(Duration::from_secs(3), "card declined"),
            StoreBehaviour::succeed_after(Duration::from_secs(1)),
        ),
        PaywallConfig::default(),
    );

    fixture.screen.purchase().await.unwrap();
    let snapshot = fixture.screen.handle().settled().await.unwrap();
    assert_eq!(snapshot.status, OperationStatus::Failure);
    assert_eq!(fixture.alerts.count(), 1);
    assert_eq!(
        fixture.alerts.alerts.lock().unwrap()[0].error,
        PaywallError::ExternalFailure("card declined".into())
    );

    fixture.screen.restore().await.unwrap();
    let snapshot = fixture.screen.handle().settled().await.unwrap();
    assert_eq!(snapshot.status, OperationStatus::Success);
    assert_eq!(fixture.alerts.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_receipt_validation_is_not_a_failure() {
    let fixture = present(
        SimulatedStore::new(
            StoreBehaviour::Respond {
                after: Duration::from_secs(1),
                outcome: Ok(Receipt::new("tx-validate").requiring_validation()),
            },
            StoreBehaviour::Silent,
        )
        .with_validation(Err("receipt endpoint unavailable".into())),
        PaywallConfig::default(),
    );

    fixture.screen.purchase().await.unwrap();
    fixture.screen.handle().settled().await.unwrap();
    sleep(Duration::from_millis(50)).await;

    assert_eq!(fixture.store.validation_calls(), 1);
    assert_eq!(fixture.screen.snapshot().status, OperationStatus::Success);
    assert_eq!(fixture.alerts.count(), 0);
    assert_eq!(fixture.host.installs.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn unavailable_product_fails_immediately() {
    let fixture = present(
        SimulatedStore::new(StoreBehaviour::Silent, StoreBehaviour::Silent)
            .with_products([SubscriptionTier::Yearly]),
        PaywallConfig::default(),
    );

    let mut screen = fixture.screen;
    screen.select_tier(SubscriptionTier::Monthly).unwrap();
    screen.purchase().await.unwrap();

    assert_eq!(screen.snapshot().status, OperationStatus::Failure);
    assert_eq!(fixture.store.purchase_calls(), 0);
    assert_eq!(fixture.alerts.count(), 1);
}

#[tokio::test]
async fn tier_selection_respects_offer() {
    let config = PaywallConfig {
        available_tiers: vec![SubscriptionTier::Yearly],
        free_trial_available: false,
        ..PaywallConfig::default()
    };
    let mut fixture = present(
        SimulatedStore::new(StoreBehaviour::Silent, StoreBehaviour::Silent),
        config,
    );

    assert_eq!(fixture.screen.selected_tier(), SubscriptionTier::Yearly);
    assert_eq!(
        fixture.screen.select_tier(SubscriptionTier::Monthly),
        Err(PaywallError::ProductUnavailable(SubscriptionTier::Monthly))
    );
    assert_eq!(fixture.screen.selected_tier(), SubscriptionTier::Yearly);
    assert_eq!(
        fixture.screen.action_label(),
        ACTIVATE_SUBSCRIPTION_ACTION_KEY
    );
}

#[tokio::test]
async fn secondary_actions_drive_sheet_and_host() {
    let fixture = present(
        SimulatedStore::new(StoreBehaviour::Silent, StoreBehaviour::Silent),
        PaywallConfig::default(),
    );
    assert_eq!(fixture.screen.action_label(), FREE_TRIAL_ACTION_KEY);

    fixture.screen.redeem_promo_code();
    assert_eq!(fixture.screen.sheet(), PaywallSheet::CodeRedemption);
    assert_eq!(fixture.host.redemptions.load(Ordering::SeqCst), 1);

    fixture.screen.code_redemption_finished();
    assert_eq!(fixture.screen.sheet(), PaywallSheet::Paywall);

    fixture.screen.refresh_credentials();
    assert_eq!(fixture.screen.sheet(), PaywallSheet::None);
    assert_eq!(fixture.host.authentications.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn teardown_cancels_pending_deadline() {
    let fixture = present(
        SimulatedStore::new(StoreBehaviour::Silent, StoreBehaviour::Silent),
        PaywallConfig::default(),
    );
    let handle = fixture.screen.handle();

    fixture.screen.restore().await.unwrap();
    fixture.screen.teardown().await.unwrap();

    sleep(Duration::from_secs(60)).await;
    assert_eq!(fixture.alerts.count(), 0);
    assert_eq!(handle.status(), OperationStatus::Ongoing);
    assert_eq!(
        handle.start(OperationKind::Restore).await,
        Err(PaywallError::ChannelClosed)
    );
}
