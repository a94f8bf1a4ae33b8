//! Ctrl+C handling
//!
//! The first interrupt cancels the crawl token and lets the scheduler wind down
//! at its next safe point; the export still runs. A second interrupt exits the
//! process immediately with [`FORCED_EXIT_CODE`] and skips the export.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Exit status used when a second interrupt forces termination
pub const FORCED_EXIT_CODE: i32 = 130;

/// Where the process is in its shutdown sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    Running,
    StopRequested,
    Forced,
    GracefulExit,
}

impl ShutdownPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::StopRequested,
            2 => Self::Forced,
            _ => Self::GracefulExit,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Running => 0,
            Self::StopRequested => 1,
            Self::Forced => 2,
            Self::GracefulExit => 3,
        }
    }
}

/// What the signal listener should do about an interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    DrainGracefully,
    ForceExit,
}

/// Owns the crawl's cancellation token and the shutdown phase
pub struct ShutdownCoordinator {
    token: CancellationToken,
    phase: AtomicU8,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            phase: AtomicU8::new(ShutdownPhase::Running.as_u8()),
        }
    }

    /// A handle on the crawl's cancellation token
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn phase(&self) -> ShutdownPhase {
        ShutdownPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// Requests a graceful stop without a signal
    pub fn request_stop(&self) {
        let _ = self.phase.compare_exchange(
            ShutdownPhase::Running.as_u8(),
            ShutdownPhase::StopRequested.as_u8(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        self.token.cancel();
    }

    /// Advances the phase for one received interrupt
    pub fn on_signal(&self) -> SignalAction {
        match self.phase() {
            ShutdownPhase::Running => {
                self.request_stop();
                SignalAction::DrainGracefully
            }
            _ => {
                self.phase
                    .store(ShutdownPhase::Forced.as_u8(), Ordering::SeqCst);
                SignalAction::ForceExit
            }
        }
    }

    /// Records that the crawl stopped and exported normally
    pub fn mark_graceful_exit(&self) {
        self.phase
            .store(ShutdownPhase::GracefulExit.as_u8(), Ordering::SeqCst);
    }

    /// Spawns a task that reacts to Ctrl+C for the rest of the process
    pub fn listen_for_signals(self: &Arc<Self>) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for Ctrl+C: {}", e);
                    return;
                }

                match coordinator.on_signal() {
                    SignalAction::DrainGracefully => {
                        tracing::warn!(
                            "Stop requested, finishing the current page then exporting. Press Ctrl+C again to quit immediately"
                        );
                    }
                    SignalAction::ForceExit => {
                        tracing::error!("Forced exit, skipping export");
                        std::process::exit(FORCED_EXIT_CODE);
                    }
                }
            }
        })
    }
}
