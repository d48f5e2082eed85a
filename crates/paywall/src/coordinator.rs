use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::alert::{AlertPresenter, FailureAlert};
use crate::config::CoordinatorConfig;
use crate::error::{PaywallError, Result};
use crate::service::{StoreFailure, StoreOutcome, SubscriptionService};
use crate::tier::OperationKind;

/// Lifecycle of the store operation the paywall is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Idle,
    Ongoing,
    Success,
    Failure,
}

/// State published to the renderer after every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorSnapshot {
    pub status: OperationStatus,
    /// Generation of the most recently started operation (0 before any).
    pub generation: u64,
    pub operation: Option<OperationKind>,
    pub last_error: Option<String>,
}

impl Default for CoordinatorSnapshot {
    fn default() -> Self {
        Self {
            status: OperationStatus::Idle,
            generation: 0,
            operation: None,
            last_error: None,
        }
    }
}

#[derive(Debug)]
enum Command {
    Start {
        kind: OperationKind,
        reply: oneshot::Sender<u64>,
    },
    /// `generation: None` targets whichever operation is current.
    Outcome {
        generation: Option<u64>,
        outcome: StoreOutcome,
        reply: Option<oneshot::Sender<()>>,
    },
    TimeoutElapsed {
        generation: u64,
    },
    CancelOngoing(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable mutation surface of a running coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    cmd_tx: mpsc::Sender<Command>,
    status_rx: watch::Receiver<CoordinatorSnapshot>,
}

impl CoordinatorHandle {
    /// Begin a purchase or restore and return its generation.
    ///
    /// Any operation still in flight is superseded: its deadline is cancelled
    /// and its late answer will be ignored.
    pub async fn start(&self, kind: OperationKind) -> Result<u64> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Start { kind, reply }).await?;
        rx.await.map_err(|_| PaywallError::Offline)
    }

    /// Deliver the store's answer for the current operation.
    pub async fn on_external_result(&self, outcome: StoreOutcome) -> Result<()> {
        self.deliver(None, outcome).await
    }

    /// Deliver the store's answer for a specific operation. Answers for a
    /// superseded generation are dropped.
    pub async fn report_result(&self, generation: u64, outcome: StoreOutcome) -> Result<()> {
        self.deliver(Some(generation), outcome).await
    }

    /// Stop waiting for the current operation without reporting a failure.
    pub async fn cancel_ongoing(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::CancelOngoing(reply)).await?;
        rx.await.map_err(|_| PaywallError::Offline)
    }

    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Shutdown(reply)).await?;
        rx.await.map_err(|_| PaywallError::Offline)
    }

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        self.status_rx.borrow().clone()
    }

    pub fn status(&self) -> OperationStatus {
        self.status_rx.borrow().status
    }

    pub fn subscribe(&self) -> watch::Receiver<CoordinatorSnapshot> {
        self.status_rx.clone()
    }

    /// Wait until no operation is ongoing.
    pub async fn settled(&self) -> Result<CoordinatorSnapshot> {
        let mut rx = self.status_rx.clone();
        let snapshot = rx
            .wait_for(|snapshot| snapshot.status != OperationStatus::Ongoing)
            .await
            .map_err(|_| PaywallError::Offline)?
            .clone();
        Ok(snapshot)
    }

    async fn deliver(&self, generation: Option<u64>, outcome: StoreOutcome) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Outcome {
            generation,
            outcome,
            reply: Some(reply),
        })
        .await?;
        rx.await.map_err(|_| PaywallError::Offline)
    }

    async fn send(&self, cmd: Command) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| PaywallError::ChannelClosed)
    }
}

/// Owns the runtime task that serialises every status transition.
///
/// Dropping the coordinator aborts the runtime together with any pending
/// deadline, so no callback can touch state after the view is gone.
pub struct OperationCoordinator {
    handle: CoordinatorHandle,
    task: Option<JoinHandle<()>>,
}

impl OperationCoordinator {
    /// Spawn the coordinator runtime. Must be called inside a tokio runtime.
    pub fn launch(
        service: Arc<dyn SubscriptionService>,
        alerts: Arc<dyn AlertPresenter>,
        config: CoordinatorConfig,
    ) -> Result<Self> {
        config.validate()?;

        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
        let (status_tx, status_rx) = watch::channel(CoordinatorSnapshot::default());

        let runtime = CoordinatorRuntime {
            service,
            alerts,
            config,
            status_tx,
            cmd_tx: cmd_tx.downgrade(),
            snapshot: CoordinatorSnapshot::default(),
            inflight: None,
        };
        let task = tokio::spawn(runtime.run(cmd_rx));

        Ok(Self {
            handle: CoordinatorHandle { cmd_tx, status_rx },
            task: Some(task),
        })
    }

    pub fn handle(&self) -> CoordinatorHandle {
        self.handle.clone()
    }

    /// Cancel any pending deadline and stop the runtime.
    pub async fn shutdown(mut self) -> Result<()> {
        self.handle.shutdown().await?;
        if let Some(task) = self.task.take() {
            task.await.map_err(|_| PaywallError::Offline)?;
        }
        Ok(())
    }
}

impl Drop for OperationCoordinator {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// The operation currently awaited, with the tasks racing to finish it.
struct Inflight {
    generation: u64,
    kind: OperationKind,
    /// Status to fall back to when the operation is abandoned silently.
    prior_status: OperationStatus,
    deadline: Option<JoinHandle<()>>,
    call: Option<JoinHandle<()>>,
}

impl Inflight {
    fn cancel_deadline(&mut self) {
        if let Some(deadline) = self.deadline.take() {
            deadline.abort();
        }
    }

    fn abandon(&mut self) {
        self.cancel_deadline();
        if let Some(call) = self.call.take() {
            call.abort();
        }
    }
}

impl Drop for Inflight {
    fn drop(&mut self) {
        self.abandon();
    }
}

struct CoordinatorRuntime {
    service: Arc<dyn SubscriptionService>,
    alerts: Arc<dyn AlertPresenter>,
    config: CoordinatorConfig,
    status_tx: watch::Sender<CoordinatorSnapshot>,
    cmd_tx: mpsc::WeakSender<Command>,
    snapshot: CoordinatorSnapshot,
    inflight: Option<Inflight>,
}

impl CoordinatorRuntime {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<Command>) {
        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                Command::Shutdown(reply) => {
                    info!(target: "paywall", "shutdown requested");
                    self.inflight = None;
                    let _ = reply.send(());
                    break;
                }
                cmd => self.handle_command(cmd),
            }
        }

        self.inflight = None;
        info!(target: "paywall", "coordinator loop exited");
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Start { kind, reply } => {
                let generation = self.start(kind);
                let _ = reply.send(generation);
            }
            Command::Outcome {
                generation,
                outcome,
                reply,
            } => {
                self.complete(generation, outcome);
                if let Some(reply) = reply {
                    let _ = reply.send(());
                }
            }
            Command::TimeoutElapsed { generation } => self.expire(generation),
            Command::CancelOngoing(reply) => {
                self.cancel();
                let _ = reply.send(());
            }
            // Handled by the run loop.
            Command::Shutdown(_) => {}
        }
    }

    fn start(&mut self, kind: OperationKind) -> u64 {
        let prior_status = match self.inflight.take() {
            Some(previous) => {
                info!(
                    target: "paywall",
                    generation = previous.generation,
                    operation = %previous.kind,
                    "superseding ongoing operation"
                );
                previous.prior_status
            }
            None => self.snapshot.status,
        };

        self.snapshot.generation += 1;
        let generation = self.snapshot.generation;
        self.snapshot.operation = Some(kind);
        self.snapshot.last_error = None;

        if let OperationKind::Purchase(tier) = kind {
            if !self.service.has_product(tier) {
                error!(target: "paywall", %tier, "failed to retrieve subscription product");
                self.fail(generation, kind, PaywallError::ProductUnavailable(tier));
                return generation;
            }
        }

        let Some(cmd_tx) = self.cmd_tx.upgrade() else {
            warn!(target: "paywall", generation, "no handles left; operation not issued");
            return generation;
        };

        let call = {
            let service = Arc::clone(&self.service);
            let cmd_tx = cmd_tx.clone();
            tokio::spawn(async move {
                let outcome = match kind {
                    OperationKind::Purchase(tier) => service.purchase(tier).await,
                    OperationKind::Restore => service.restore().await,
                };
                let _ = cmd_tx
                    .send(Command::Outcome {
                        generation: Some(generation),
                        outcome,
                        reply: None,
                    })
                    .await;
            })
        };

        let timeout = self.config.timeout_for(kind);
        let deadline = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = cmd_tx.send(Command::TimeoutElapsed { generation }).await;
        });

        info!(
            target: "paywall",
            generation,
            operation = %kind,
            timeout_secs = timeout.as_secs(),
            "operation started"
        );

        self.inflight = Some(Inflight {
            generation,
            kind,
            prior_status,
            deadline: Some(deadline),
            call: Some(call),
        });
        self.snapshot.status = OperationStatus::Ongoing;
        self.publish();
        generation
    }

    /// Take the in-flight operation if `generation` still refers to it.
    fn take_current(&mut self, generation: Option<u64>) -> Option<Inflight> {
        let current = self.inflight.as_ref()?.generation;
        match generation {
            Some(generation) if generation != current => None,
            _ => self.inflight.take(),
        }
    }

    fn complete(&mut self, generation: Option<u64>, outcome: StoreOutcome) {
        let Some(mut inflight) = self.take_current(generation) else {
            debug!(target: "paywall", ?generation, "ignoring stale store result");
            return;
        };
        inflight.cancel_deadline();

        match outcome {
            Ok(receipt) => {
                info!(
                    target: "paywall",
                    generation = inflight.generation,
                    operation = %inflight.kind,
                    transaction = %receipt.transaction_id,
                    "operation succeeded"
                );
                if receipt.validation_required {
                    self.spawn_validation(inflight.generation);
                }
                self.snapshot.status = OperationStatus::Success;
                self.publish();
            }
            Err(StoreFailure::Cancelled) => {
                info!(
                    target: "paywall",
                    generation = inflight.generation,
                    operation = %inflight.kind,
                    "store prompt cancelled by user"
                );
                self.snapshot.status = inflight.prior_status;
                self.publish();
            }
            Err(failure) => {
                self.fail(inflight.generation, inflight.kind, failure.into());
            }
        }
    }

    fn expire(&mut self, generation: u64) {
        let Some(inflight) = self.take_current(Some(generation)) else {
            debug!(target: "paywall", generation, "ignoring stale deadline");
            return;
        };
        self.fail(inflight.generation, inflight.kind, PaywallError::TimeoutExpired);
    }

    fn cancel(&mut self) {
        match self.inflight.take() {
            Some(inflight) => {
                info!(
                    target: "paywall",
                    generation = inflight.generation,
                    operation = %inflight.kind,
                    "operation cancelled"
                );
                self.snapshot.status = inflight.prior_status;
                self.publish();
            }
            None => debug!(target: "paywall", "nothing to cancel"),
        }
    }

    fn fail(&mut self, generation: u64, kind: OperationKind, err: PaywallError) {
        warn!(
            target: "paywall",
            generation,
            operation = %kind,
            error = %err,
            "operation failed"
        );
        self.snapshot.status = OperationStatus::Failure;
        self.snapshot.last_error = Some(err.to_string());
        self.publish();

        if err.is_user_visible() {
            self.alerts
                .present_failure(&FailureAlert::new(generation, kind, err));
        }
    }

    fn spawn_validation(&self, generation: u64) {
        let service = Arc::clone(&self.service);
        tokio::spawn(async move {
            if let Err(reason) = service.validate_receipt().await {
                let err = PaywallError::SecondaryValidationFailed(reason);
                error!(target: "paywall", generation, error = %err, "error validating receipt");
            }
        });
    }

    fn publish(&self) {
        if self.status_tx.send(self.snapshot.clone()).is_err() {
            warn!(target: "paywall", "failed to publish status update (no listeners)");
        }
    }
}
