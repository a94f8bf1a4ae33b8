/// Window state definitions for tracking crawl progress
///
/// Every window popped from the scheduler stack ends one visit in one of these
/// states. A backoff state puts the window back on the stack; the rest are final.
use std::fmt;

/// Represents where a single window is in its fetch lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowState {
    // ===== Backoff States =====
    /// Page 0 returned HTTP 429; window goes back on the stack after a cooldown
    RateLimited,

    /// Page 0 returned HTTP 403; window goes back on the stack after a longer cooldown
    Banned,

    // ===== Terminal States =====
    /// Window was saturated and replaced by its two halves
    Split,

    /// Every page was fetched and inserted
    Drained,

    /// Page 0 succeeded but a later page failed; the remainder was abandoned
    Partial,

    /// Page 0 failed with a hard error; the window contributed nothing
    Dropped,
}

impl WindowState {
    /// Returns true if the window is waiting out a cooldown
    pub fn is_backoff(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Banned)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::Banned => "banned",
            Self::Split => "split",
            Self::Drained => "drained",
            Self::Partial => "partial",
            Self::Dropped => "dropped",
        }
    }
}

impl fmt::Display for WindowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
