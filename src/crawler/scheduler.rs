//! Adaptive window scheduler
//!
//! This module drives the crawl. It keeps a LIFO stack of time windows, reads
//! each one with its first page, bisects windows the API cannot fully paginate,
//! and drains the rest page by page into the record store.
//!
//! Stop conditions are checked at three safe points only: before popping a
//! window, before each later page, and while sleeping. A fetch that is already
//! in flight always completes and its records are stored.

use crate::config::Config;
use crate::crawler::fetcher::{FetchOutcome, PageQuery, PageResult, PageSource};
use crate::state::WindowState;
use crate::storage::{Record, RunTotals, SharedStore, StorageError};
use crate::window::{SaturationDetector, TimeWindow};
use crate::HarvestError;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Tunables for one scheduler run
#[derive(Debug, Clone)]
pub struct ScheduleSettings {
    pub per_page: u32,
    pub min_window: chrono::Duration,
    pub pacing_delay: Duration,
    pub rate_limit_cooldown: Duration,
    pub ban_cooldown: Duration,
    pub max_page_retries: u32,
}

impl ScheduleSettings {
    pub fn from_config(config: &Config) -> Result<Self, HarvestError> {
        Ok(Self {
            per_page: config.api.per_page,
            min_window: config.crawl.min_window()?,
            pacing_delay: config.crawl.pacing_delay(),
            rate_limit_cooldown: config.crawl.rate_limit_cooldown(),
            ban_cooldown: config.crawl.ban_cooldown(),
            max_page_retries: config.crawl.max_page_retries,
        })
    }
}

/// Why the scheduler loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    QueueExhausted,
    StopRequested,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TargetReached => "target reached",
            Self::QueueExhausted => "time range exhausted",
            Self::StopRequested => "stop requested",
        };
        write!(f, "{}", s)
    }
}

/// Tallies of a finished scheduler run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    pub drained: u64,
    pub partial: u64,
    pub split: u64,
    pub dropped: u64,
    /// Saturated windows that were already at the minimum width
    pub truncated: u64,
    pub rate_limited: u64,
    pub banned: u64,
    pub records_inserted: u64,
    pub store_size: u64,
    pub target: u64,
    pub stop_reason: StopReason,
    /// Windows still on the stack when the loop ended
    pub undrained_windows: usize,
}

impl CrawlReport {
    fn new(target: u64) -> Self {
        Self {
            drained: 0,
            partial: 0,
            split: 0,
            dropped: 0,
            truncated: 0,
            rate_limited: 0,
            banned: 0,
            records_inserted: 0,
            store_size: 0,
            target,
            stop_reason: StopReason::QueueExhausted,
            undrained_windows: 0,
        }
    }

    pub fn totals(&self) -> RunTotals {
        RunTotals {
            drained_windows: self.drained,
            partial_windows: self.partial,
            split_windows: self.split,
            dropped_windows: self.dropped,
            records_inserted: self.records_inserted,
        }
    }

    fn tally(&mut self, state: WindowState) {
        match state {
            WindowState::Drained => self.drained += 1,
            WindowState::Partial => self.partial += 1,
            WindowState::Split => self.split += 1,
            WindowState::Dropped => self.dropped += 1,
            WindowState::RateLimited => self.rate_limited += 1,
            WindowState::Banned => self.banned += 1,
        }
    }
}

/// Result of fetching one later page, after retries
enum PageAttempt {
    Fetched(PageResult),
    Abandoned,
    Stopped,
}

/// Depth-first window scheduler
///
/// Halves are pushed older first, so the newer half of a split window is
/// always processed first.
pub struct WindowScheduler<S> {
    source: S,
    store: SharedStore,
    detector: SaturationDetector,
    settings: ScheduleSettings,
    cancel: CancellationToken,
    stack: Vec<TimeWindow>,
    last_report: Option<CrawlReport>,
}

impl<S: PageSource> WindowScheduler<S> {
    pub fn new(
        source: S,
        store: SharedStore,
        detector: SaturationDetector,
        settings: ScheduleSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            store,
            detector,
            settings,
            cancel,
            stack: Vec::new(),
            last_report: None,
        }
    }

    /// Tallies of the most recent run, including one that failed part way
    pub fn last_report(&self) -> Option<&CrawlReport> {
        self.last_report.as_ref()
    }

    /// Crawls `full_range` until the store holds `target` records, the range
    /// is exhausted, or the cancellation token fires
    ///
    /// Only store failures abort the run. Every fetch failure is absorbed into
    /// a window state. The tallies gathered before a failure stay available
    /// through [`last_report`](Self::last_report).
    pub async fn run(
        &mut self,
        full_range: TimeWindow,
        target: u64,
    ) -> Result<CrawlReport, HarvestError> {
        let mut report = CrawlReport::new(target);
        let outcome = self.drive(full_range, &mut report).await;
        report.undrained_windows = self.stack.len();

        match outcome.and_then(|()| self.store_size()) {
            Ok(size) => report.store_size = size,
            Err(e) => {
                if let Ok(size) = self.store_size() {
                    report.store_size = size;
                }
                self.last_report = Some(report);
                return Err(e);
            }
        }
        self.last_report = Some(report.clone());

        if report.undrained_windows > 0 {
            tracing::info!(
                "Leaving {} window(s) undrained ({})",
                report.undrained_windows,
                report.stop_reason
            );
        }

        Ok(report)
    }

    async fn drive(
        &mut self,
        full_range: TimeWindow,
        report: &mut CrawlReport,
    ) -> Result<(), HarvestError> {
        let target = report.target;
        self.stack.clear();
        self.stack.push(full_range);

        tracing::info!(
            "Scanning {} for up to {} records (store holds {})",
            full_range,
            target,
            self.store_size()?
        );

        loop {
            if self.cancel.is_cancelled() {
                report.stop_reason = StopReason::StopRequested;
                break;
            }
            if self.store_size()? >= target {
                report.stop_reason = StopReason::TargetReached;
                break;
            }
            let window = match self.stack.pop() {
                Some(window) => window,
                None => {
                    report.stop_reason = StopReason::QueueExhausted;
                    break;
                }
            };

            let before = report.records_inserted;
            let state = self.process_window(window, target, report).await?;
            report.tally(state);

            if state.is_backoff() {
                tracing::info!(
                    "{} {}: requeued, {} window(s) pending",
                    state,
                    window,
                    self.stack.len()
                );
                continue;
            }
            tracing::info!(
                "{} {}: +{} new, store {}/{}, {} window(s) pending",
                state,
                window,
                report.records_inserted - before,
                self.store_size()?,
                target,
                self.stack.len()
            );
        }

        Ok(())
    }

    async fn process_window(
        &mut self,
        window: TimeWindow,
        target: u64,
        report: &mut CrawlReport,
    ) -> Result<WindowState, HarvestError> {
        let first = match self
            .source
            .fetch_page(&PageQuery::new(window, 0, self.settings.per_page))
            .await
        {
            FetchOutcome::Success(page) => page,
            FetchOutcome::RateLimited => {
                tracing::warn!(
                    "Rate limited on {}, cooling down for {:?}",
                    window,
                    self.settings.rate_limit_cooldown
                );
                self.stack.push(window);
                self.pause(self.settings.rate_limit_cooldown).await;
                return Ok(WindowState::RateLimited);
            }
            FetchOutcome::TemporarilyBanned => {
                tracing::warn!(
                    "Temporarily banned on {}, cooling down for {:?}",
                    window,
                    self.settings.ban_cooldown
                );
                self.stack.push(window);
                self.pause(self.settings.ban_cooldown).await;
                return Ok(WindowState::Banned);
            }
            FetchOutcome::HardError(failure) => {
                tracing::warn!("Dropping {}: {}", window, failure);
                return Ok(WindowState::Dropped);
            }
        };

        if self.detector.is_saturated(&first) {
            let halves = if window.is_splittable(self.settings.min_window) {
                window.split()
            } else {
                None
            };
            if let Some((older, newer)) = halves {
                tracing::debug!(
                    "{} saturated (found {}, {} pages), splitting at {}",
                    window,
                    first.found,
                    first.pages,
                    newer.from()
                );
                self.stack.push(older);
                self.stack.push(newer);
                self.pause(self.settings.pacing_delay).await;
                return Ok(WindowState::Split);
            }

            tracing::warn!(
                "{} is saturated (found {}) but cannot be split further; results will be truncated",
                window,
                first.found
            );
            report.truncated += 1;
        }

        let pages = first.pages;
        self.store_page(first.items, report)?;
        self.pause(self.settings.pacing_delay).await;

        for page in 1..pages {
            if self.cancel.is_cancelled() || self.store_size()? >= target {
                return Ok(WindowState::Partial);
            }

            match self.fetch_later_page(window, page, report).await {
                PageAttempt::Fetched(result) => {
                    self.store_page(result.items, report)?;
                    self.pause(self.settings.pacing_delay).await;
                }
                PageAttempt::Abandoned | PageAttempt::Stopped => {
                    return Ok(WindowState::Partial);
                }
            }
        }

        Ok(WindowState::Drained)
    }

    async fn fetch_later_page(
        &self,
        window: TimeWindow,
        page: u32,
        report: &mut CrawlReport,
    ) -> PageAttempt {
        let query = PageQuery::new(window, page, self.settings.per_page);
        let mut retries = 0;

        loop {
            let cooldown = match self.source.fetch_page(&query).await {
                FetchOutcome::Success(result) => return PageAttempt::Fetched(result),
                FetchOutcome::RateLimited => {
                    report.rate_limited += 1;
                    self.settings.rate_limit_cooldown
                }
                FetchOutcome::TemporarilyBanned => {
                    report.banned += 1;
                    self.settings.ban_cooldown
                }
                FetchOutcome::HardError(failure) => {
                    tracing::warn!("Abandoning {} at page {}: {}", window, page, failure);
                    return PageAttempt::Abandoned;
                }
            };

            if retries >= self.settings.max_page_retries {
                tracing::warn!(
                    "Abandoning {} at page {} after {} throttled retries",
                    window,
                    page,
                    retries
                );
                return PageAttempt::Abandoned;
            }
            retries += 1;

            tracing::warn!(
                "Throttled on {} page {}, retry {}/{} in {:?}",
                window,
                page,
                retries,
                self.settings.max_page_retries,
                cooldown
            );
            if !self.pause(cooldown).await {
                return PageAttempt::Stopped;
            }
        }
    }

    fn store_page(&self, items: Vec<Record>, report: &mut CrawlReport) -> Result<(), HarvestError> {
        if items.is_empty() {
            return Ok(());
        }
        let mut store = self.store.lock().map_err(|_| StorageError::LockPoisoned)?;
        let inserted = store.insert_many(&items)?;
        report.records_inserted += inserted as u64;
        Ok(())
    }

    fn store_size(&self) -> Result<u64, HarvestError> {
        let store = self.store.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(store.size()?)
    }

    /// Sleeps for `duration`, waking early if a stop is requested
    ///
    /// Returns false if the sleep was cut short.
    async fn pause(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.cancel.is_cancelled();
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
