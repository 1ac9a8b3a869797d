//! Session lifetime: login flag and the frame loop thread

use crate::orchestrator::SessionSummary;
use crate::MonitorError;
use std::sync::Arc;
use std::thread::JoinHandle;
use storage::{AccountBook, KeyValueStore};
use tokio::sync::watch;
use tracing::{info, warn};

/// Cooperative cancellation flag, true while the driver is logged in
#[derive(Debug, Clone)]
pub struct SessionSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for SessionSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionSignal {
    /// A logged-in session
    pub fn new() -> Self {
        let (tx, _) = watch::channel(true);
        Self { tx: Arc::new(tx) }
    }

    pub fn logout(&self) {
        if self.tx.send_replace(false) {
            info!("Session logged out");
        }
    }

    pub fn is_active(&self) -> bool {
        *self.tx.borrow()
    }

    /// Receiver for async waiters
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

type SessionHandle = JoinHandle<Result<SessionSummary, MonitorError>>;

/// Runs at most one frame loop at a time on a dedicated thread
#[derive(Default)]
pub struct SessionSupervisor {
    current: Option<(SessionSignal, SessionHandle)>,
}

impl SessionSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session, first stopping and joining any active one
    pub fn start<F>(&mut self, run: F) -> Result<SessionSignal, MonitorError>
    where
        F: FnOnce(SessionSignal) -> Result<SessionSummary, MonitorError> + Send + 'static,
    {
        if let Some(previous) = self.stop() {
            match previous {
                Ok(summary) => info!("Previous session ended: {:?}", summary),
                Err(e) => warn!("Previous session failed: {}", e),
            }
        }

        let signal = SessionSignal::new();
        let loop_signal = signal.clone();
        let handle = std::thread::Builder::new()
            .name("frame-loop".to_string())
            .spawn(move || run(loop_signal))?;

        info!("Session started");
        self.current = Some((signal.clone(), handle));
        Ok(signal)
    }

    /// Check the driver's credentials, then start their session
    pub fn login<S, F>(
        &mut self,
        accounts: &AccountBook<S>,
        username: &str,
        password: &str,
        run: F,
    ) -> Result<SessionSignal, MonitorError>
    where
        S: KeyValueStore,
        F: FnOnce(SessionSignal) -> Result<SessionSummary, MonitorError> + Send + 'static,
    {
        accounts.login(username, password)?;
        self.start(run)
    }

    /// Signal the active session and wait for it
    pub fn stop(&mut self) -> Option<Result<SessionSummary, MonitorError>> {
        let (signal, handle) = self.current.take()?;
        signal.logout();
        Some(join(handle))
    }

    /// Wait for the active session to end on its own
    pub fn wait(&mut self) -> Option<Result<SessionSummary, MonitorError>> {
        let (_, handle) = self.current.take()?;
        Some(join(handle))
    }

    pub fn is_running(&self) -> bool {
        self.current
            .as_ref()
            .map_or(false, |(_, handle)| !handle.is_finished())
    }
}

fn join(handle: SessionHandle) -> Result<SessionSummary, MonitorError> {
    handle
        .join()
        .map_err(|_| MonitorError::Session("frame loop thread panicked".into()))?
}

impl Drop for SessionSupervisor {
    fn drop(&mut self) {
        if let Some(Err(e)) = self.stop() {
            warn!("Session ended with error during shutdown: {}", e);
        }
    }
}
