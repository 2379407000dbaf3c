//! Control state machine for crawl operations
//!
//! A `Controller` admits at most one crawl operation at a time and carries
//! the pause/stop requests a front-end sends to it. All state lives in a
//! `tokio::sync::watch` channel so waiters are woken by notification.

use std::fmt;
use std::future::Future;
use tokio::sync::watch;

/// Lifecycle status of a crawl session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlState {
    /// No operation is running; a new one may start
    Ready,

    /// An operation is running
    Running,

    /// The running operation is blocked at a wait point until unpaused
    Paused,

    /// A stop was honoured; nothing runs until `restart`
    Stopped,
}

impl ControlState {
    /// Returns true while an operation holds the session
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ControlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Signals {
    status: ControlState,
    stop_requested: bool,
    pause_requested: bool,
    /// Bumped each time a stop is honoured
    stops: u64,
}

/// Callback run once an interrupted operation has exited
pub type StoppedCallback = Box<dyn FnOnce() + Send>;

/// Shared run/pause/stop status of a crawl session
#[derive(Debug)]
pub struct Controller {
    signals: watch::Sender<Signals>,
}

/// Admission to run one operation; restores the status when dropped
#[derive(Debug)]
pub struct RunGuard<'a> {
    controller: &'a Controller,
    prior: ControlState,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.controller.finish(self.prior);
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller {
    pub fn new() -> Self {
        let (signals, _) = watch::channel(Signals {
            status: ControlState::Ready,
            stop_requested: false,
            pause_requested: false,
            stops: 0,
        });
        Self { signals }
    }

    pub fn status(&self) -> ControlState {
        self.signals.borrow().status
    }

    pub fn is_stop_requested(&self) -> bool {
        self.signals.borrow().stop_requested
    }

    /// Tries to enter `Running`
    ///
    /// Entry is refused when a stop is pending or another operation already
    /// holds the session. The check and the transition happen under the
    /// channel's write lock.
    pub fn begin(&self) -> Option<RunGuard<'_>> {
        let mut prior = None;
        self.signals.send_if_modified(|s| {
            if s.stop_requested || s.status != ControlState::Ready {
                return false;
            }
            prior = Some(s.status);
            s.status = ControlState::Running;
            true
        });

        match prior {
            Some(prior) => Some(RunGuard {
                controller: self,
                prior,
            }),
            None => {
                tracing::debug!("Operation not admitted (status: {})", self.status());
                None
            }
        }
    }

    fn finish(&self, prior: ControlState) {
        self.signals.send_modify(|s| {
            if s.stop_requested {
                s.status = ControlState::Stopped;
                s.stops += 1;
            } else {
                s.status = prior;
            }
        });
        tracing::debug!("Operation finished (status: {})", self.status());
    }

    /// Runs `operation` as the session's single active operation
    ///
    /// Returns `None` without polling `operation` when it was not admitted.
    pub async fn with_exclusive_run<F, T>(&self, operation: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        let _guard = self.begin()?;
        Some(operation.await)
    }

    /// Requests a pause; the running operation blocks at its next wait point
    pub fn pause(&self) {
        self.signals.send_if_modified(|s| {
            let changed = !s.pause_requested;
            s.pause_requested = true;
            changed
        });
    }

    pub fn unpause(&self) {
        self.signals.send_if_modified(|s| {
            let changed = s.pause_requested;
            s.pause_requested = false;
            changed
        });
    }

    /// Requests a stop without waiting for it to be honoured
    pub fn request_stop(&self) {
        self.raise_stop();
    }

    /// Sets the stop flag and returns the honoured-stop count seen with it
    fn raise_stop(&self) -> u64 {
        let mut stops = 0;
        self.signals.send_modify(|s| {
            s.stop_requested = true;
            if s.status == ControlState::Ready {
                s.status = ControlState::Stopped;
                s.stops += 1;
            }
            stops = s.stops;
        });
        stops
    }

    /// Stops the session and waits until no operation is running
    ///
    /// `on_stopped` runs after the running operation (if any) has exited.
    /// With `restart` the session is then returned to `Ready`.
    pub async fn interrupt(&self, on_stopped: Option<StoppedCallback>, restart: bool) {
        let mut rx = self.signals.subscribe();
        let seen = self.raise_stop();
        tracing::info!("Stop requested, waiting for the running operation to exit");

        // A later restart cannot undo a honoured stop, so concurrent
        // interrupts all return
        let _ = rx
            .wait_for(|s| s.stops != seen || !s.status.is_active())
            .await;

        if let Some(callback) = on_stopped {
            callback();
        }
        if restart {
            self.restart();
        }
    }

    /// Clears pending requests and forces `Ready`
    pub fn restart(&self) {
        self.signals.send_modify(|s| {
            s.stop_requested = false;
            s.pause_requested = false;
            s.status = ControlState::Ready;
        });
        tracing::debug!("Controller restarted");
    }

    /// Waits until the status equals `state`
    pub async fn wait_for_status(&self, state: ControlState) {
        let mut rx = self.signals.subscribe();
        let _ = rx.wait_for(|s| s.status == state).await;
    }

    /// Resolves once a stop has been requested
    pub async fn stopped(&self) {
        let mut rx = self.signals.subscribe();
        let _ = rx.wait_for(|s| s.stop_requested).await;
    }

    /// Blocks while a pause is requested and no stop is pending
    ///
    /// The status reads `Paused` for as long as the caller is blocked.
    pub async fn wait_while_paused(&self) {
        let mut rx = self.signals.subscribe();
        let blocked = {
            let s = rx.borrow_and_update();
            s.pause_requested && !s.stop_requested
        };
        if !blocked {
            return;
        }

        self.signals.send_if_modified(|s| {
            if s.status == ControlState::Running {
                s.status = ControlState::Paused;
                true
            } else {
                false
            }
        });
        tracing::info!("Paused");

        let _ = rx
            .wait_for(|s| !s.pause_requested || s.stop_requested)
            .await;

        self.signals.send_if_modified(|s| {
            if s.status == ControlState::Paused {
                s.status = ControlState::Running;
                true
            } else {
                false
            }
        });
        tracing::info!("Resumed");
    }
}
