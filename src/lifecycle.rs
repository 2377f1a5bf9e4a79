use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::sync::watch;

use crate::api::{ApiError, NodeApi, WalletDetails};
use crate::config::AppConfig;
use crate::crypto::signer::WalletIdentity;
use crate::dashboard::RedrawHandle;

/// Where a wallet currently is in its node lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletState {
    Starting,
    CheckingStatus,
    Activating,
    Activated,
    Active,
    Restarting,
    Errored,
}

impl fmt::Display for WalletState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WalletState::Starting => "Starting",
            WalletState::CheckingStatus => "Checking Status",
            WalletState::Activating => "Activating",
            WalletState::Activated => "Activated",
            WalletState::Active => "Active",
            WalletState::Restarting => "Restarting",
            WalletState::Errored => "Error",
        };
        f.write_str(label)
    }
}

/// Live status for one wallet. Written only by that wallet's lifecycle
/// task; the renderer reads snapshots.
#[derive(Debug, Clone)]
pub struct WalletStatus {
    pub state: WalletState,
    pub last_ping: Option<DateTime<Utc>>,
    pub points: u64,
    pub daily_streak: u64,
    pub last_claimed: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl WalletStatus {
    pub fn starting() -> Self {
        Self {
            state: WalletState::Starting,
            last_ping: None,
            points: 0,
            daily_streak: 0,
            last_claimed: None,
            last_error: None,
        }
    }
}

pub type SharedStatus = Arc<RwLock<WalletStatus>>;

#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The activation call itself failed irrecoverably.
    #[error("node activation failed: {0}")]
    ActivationFailed(#[source] ApiError),

    /// The node never came online within the polling bound.
    #[error("node did not come online after {attempts} status checks")]
    ActivationTimeout { attempts: u32 },

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl LifecycleError {
    /// Activation failures during the first cycle abort the wallet's
    /// schedule; everything else is a per-tick error.
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(
            self,
            LifecycleError::ActivationFailed(_) | LifecycleError::ActivationTimeout { .. }
        )
    }
}

/// True when the daily reward can be claimed: never claimed before, or at
/// least 24 hours of wall-clock time since the server-side claim instant.
pub fn claim_due(last_claimed: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_claimed {
        None => true,
        Some(instant) => now.signed_duration_since(instant) >= chrono::Duration::hours(24),
    }
}

/// Per-wallet supervisory task: activation, recurring status refresh and
/// the daily claim branch. One instance runs per wallet; cycles never
/// overlap because the tick delay is armed only after a cycle completes.
pub struct WalletLifecycle<C: NodeApi> {
    identity: WalletIdentity,
    client: Arc<C>,
    cfg: Arc<AppConfig>,
    status: SharedStatus,
    redraw: RedrawHandle,
    shutdown: watch::Receiver<bool>,
}

impl<C: NodeApi> WalletLifecycle<C> {
    pub fn new(
        identity: WalletIdentity,
        client: Arc<C>,
        cfg: Arc<AppConfig>,
        status: SharedStatus,
        redraw: RedrawHandle,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            identity,
            client,
            cfg,
            status,
            redraw,
            shutdown,
        }
    }

    fn address(&self) -> &str {
        self.identity.address()
    }

    pub async fn run(mut self) {
        match self.startup().await {
            Ok(()) => {
                if let Err(err) = self.cycle().await {
                    self.record_cycle_error(&err);
                }
            }
            Err(err) if err.is_fatal_at_startup() => {
                error!("[{}] startup activation failed: {}", self.address(), err);
                self.record_cycle_error(&err);
                return;
            }
            Err(err) => self.record_cycle_error(&err),
        }

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.cfg.ping_interval) => {}
                res = self.shutdown.changed() => {
                    if res.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }
            if *self.shutdown.borrow() {
                break;
            }
            if let Err(err) = self.cycle().await {
                self.record_cycle_error(&err);
            }
        }
        debug!("[{}] lifecycle task stopped", self.address());
    }

    /// First-cycle entry: make sure the node session exists before the
    /// regular refresh cadence begins.
    async fn startup(&mut self) -> Result<(), LifecycleError> {
        self.set_state(WalletState::CheckingStatus);
        let running = self.client.node_status(self.address()).await?;
        if !running {
            self.set_state(WalletState::Activating);
            self.activate(self.cfg.activation_poll_attempts).await?;
            self.set_state(WalletState::Activated);
        }
        Ok(())
    }

    /// One full refresh + claim cycle.
    async fn cycle(&mut self) -> Result<(), LifecycleError> {
        let details = self.refresh().await?;
        self.claim_if_due(&details).await;
        Ok(())
    }

    /// Check the node, re-activate it if it stopped, then pull details and
    /// publish them.
    async fn refresh(&mut self) -> Result<WalletDetails, LifecycleError> {
        let running = self.client.node_status(self.address()).await?;
        if !running {
            info!("[{}] node not running, restarting", self.address());
            self.set_state(WalletState::Restarting);
            self.activate(self.cfg.restart_poll_attempts).await?;
            self.set_state(WalletState::Activated);
        }
        let details = self.client.wallet_details(self.address()).await?;
        self.apply_details(&details);
        Ok(details)
    }

    /// Sign and submit the activation request, then wait-then-check until
    /// the node reports running or the attempt bound is exhausted.
    async fn activate(&self, poll_attempts: u32) -> Result<(), LifecycleError> {
        let timestamp = Utc::now().timestamp_millis();
        let message = format!(
            "Node activation request for {} at {}",
            self.address(),
            timestamp
        );
        let signature = self.identity.sign(&message);
        self.client
            .activate_node(self.address(), &signature, timestamp)
            .await
            .map_err(LifecycleError::ActivationFailed)?;

        for _ in 0..poll_attempts {
            tokio::time::sleep(self.cfg.activation_poll_interval).await;
            // A failed probe counts as a not-running answer.
            if self
                .client
                .node_status(self.address())
                .await
                .unwrap_or(false)
            {
                info!("[{}] node activated", self.address());
                return Ok(());
            }
        }
        Err(LifecycleError::ActivationTimeout {
            attempts: poll_attempts,
        })
    }

    /// Claim branch, evaluated after every refresh. Failures here are
    /// recorded but never abort the cycle or the schedule.
    async fn claim_if_due(&mut self, details: &WalletDetails) {
        if !claim_due(details.last_claimed, Utc::now()) {
            return;
        }
        let timestamp = Utc::now().timestamp_millis();
        let message = format!(
            "I am claiming my daily node point for {} at {}",
            self.address(),
            timestamp
        );
        let signature = self.identity.sign(&message);
        match self
            .client
            .claim_daily_points(self.address(), &signature, timestamp)
            .await
        {
            Ok(true) => {
                info!("[{}] daily points claimed", self.address());
                // Pick up the new totals right away.
                match self.client.wallet_details(self.address()).await {
                    Ok(fresh) => self.apply_details(&fresh),
                    Err(err) => self.note_error(err.to_string()),
                }
            }
            Ok(false) => {}
            Err(err) => {
                warn!("[{}] claim failed: {}", self.address(), err);
                self.note_error(err.to_string());
            }
        }
    }

    fn apply_details(&self, details: &WalletDetails) {
        if let Ok(mut status) = self.status.write() {
            status.points = details.points;
            status.daily_streak = details.streak;
            status.last_claimed = details.last_claimed;
            status.last_ping = Some(Utc::now());
            status.state = WalletState::Active;
            status.last_error = None;
        }
        self.redraw.request();
    }

    fn set_state(&self, state: WalletState) {
        if let Ok(mut status) = self.status.write() {
            status.state = state;
        }
        self.redraw.request();
    }

    /// Record a non-fatal error without leaving the current state.
    fn note_error(&self, message: String) {
        if let Ok(mut status) = self.status.write() {
            status.last_error = Some(message);
        }
        self.redraw.request();
    }

    fn record_cycle_error(&self, err: &LifecycleError) {
        warn!("[{}] cycle failed: {}", self.address(), err);
        if let Ok(mut status) = self.status.write() {
            status.state = WalletState::Errored;
            status.last_error = Some(err.to_string());
        }
        self.redraw.request();
    }
}
