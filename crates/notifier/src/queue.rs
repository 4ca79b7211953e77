//! In-memory IndexNow dispatch queue.
//!
//! Entries are keyed by canonical URL, so a page queued twice before it is
//! flushed produces one submission. A flush partitions the pending set into
//! entries to drop (attempt ceiling reached), fresh entries (never tried) and
//! retries whose backoff window has elapsed. Fresh and retry entries go out
//! as two separate batches, one after the other.
//!
//! At most one flush runs at a time. A flush requested while another is in
//! flight is skipped; the next timer tick or `enqueue` picks the work up.
//! The pending map is never locked across an `.await`.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use beacon_common::config::IndexNowConfig;
use beacon_common::types::QueueStatus;

use crate::backoff;
use crate::normalize::TargetFilter;
use crate::submitter::{HttpSubmitter, SubmitError, Submitter};

/// One pending target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNotification {
    /// Canonical URL
    pub target: String,
    /// Last (re)scheduling time; refreshed after every failed attempt
    pub enqueued_at: Instant,
    /// Submission attempts made so far
    pub attempts: u32,
}

/// What a single flush did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Another flush was running, or the queue is disabled
    pub skipped: bool,
    /// Entries removed after reaching the attempt ceiling
    pub dropped: usize,
    /// Targets sent, across all batches
    pub submitted: usize,
    /// Targets in batches that succeeded
    pub delivered: usize,
    /// Targets in batches that failed
    pub failed: usize,
    /// Submission calls made
    pub batches: usize,
}

impl FlushReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum BatchKind {
    Fresh,
    Retry,
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchKind::Fresh => write!(f, "fresh"),
            BatchKind::Retry => write!(f, "retry"),
        }
    }
}

/// Clears the in-progress flag on drop, including on unwind or cancellation.
struct FlushGuard<'a>(&'a AtomicBool);

impl<'a> FlushGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Inner {
    enabled: bool,
    filter: TargetFilter,
    max_attempts: u32,
    base_delay: Duration,
    flush_interval: Duration,
    flush_on_enqueue: bool,
    submitter: Arc<dyn Submitter>,
    pending: Mutex<HashMap<String, PendingNotification>>,
    flushing: AtomicBool,
    last_flush_at: Mutex<Option<DateTime<Utc>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to the dispatch queue. Cloning shares the same queue.
#[derive(Clone)]
pub struct NotificationQueue {
    inner: Arc<Inner>,
}

impl NotificationQueue {
    /// Create a queue that submits through `submitter`.
    ///
    /// Without a key the queue is disabled: `enqueue` does nothing and no
    /// submission is ever attempted. The timer is not started here; see
    /// [`NotificationQueue::start`].
    pub fn new(config: &IndexNowConfig, submitter: Arc<dyn Submitter>) -> Self {
        let enabled = config.is_enabled();
        if !enabled {
            tracing::warn!("INDEXNOW_KEY not set, IndexNow submissions disabled");
        }

        Self {
            inner: Arc::new(Inner {
                enabled,
                filter: TargetFilter::from_config(config),
                max_attempts: config.max_attempts,
                base_delay: config.base_delay,
                flush_interval: config.flush_interval,
                flush_on_enqueue: config.flush_on_enqueue,
                submitter,
                pending: Mutex::new(HashMap::new()),
                flushing: AtomicBool::new(false),
                last_flush_at: Mutex::new(None),
                timer: Mutex::new(None),
            }),
        }
    }

    /// Create a queue backed by the IndexNow HTTP endpoint from `config`.
    pub fn from_config(config: &IndexNowConfig) -> Result<Self, SubmitError> {
        let submitter = HttpSubmitter::new(config)?;
        Ok(Self::new(config, Arc::new(submitter)))
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled
    }

    /// Canonical form of `raw` if it would be accepted by `enqueue`.
    pub fn accepts(&self, raw: &str) -> Option<String> {
        self.inner.filter.accept(raw)
    }

    /// Queue targets for submission. Never blocks and never fails.
    ///
    /// Invalid or foreign targets are dropped silently. Targets already
    /// pending keep their attempt count. When anything was accepted, a
    /// flush is started in the background (if running inside a Tokio
    /// runtime); the caller does not wait for it.
    pub fn enqueue<I, S>(&self, targets: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if !self.inner.enabled {
            return;
        }

        let now = Instant::now();
        let mut accepted = 0usize;
        let mut inserted = 0usize;

        {
            let mut pending = lock(&self.inner.pending);
            for raw in targets {
                let raw = raw.as_ref();
                let Some(target) = self.inner.filter.accept(raw) else {
                    tracing::debug!(url = raw, "Ignoring URL outside the site host");
                    continue;
                };
                accepted += 1;

                if let Entry::Vacant(slot) = pending.entry(target.clone()) {
                    slot.insert(PendingNotification {
                        target,
                        enqueued_at: now,
                        attempts: 0,
                    });
                    inserted += 1;
                }
            }
        }

        if accepted == 0 {
            return;
        }

        tracing::info!(accepted, inserted, "Queued URLs for IndexNow");

        if self.inner.flush_on_enqueue {
            self.spawn_flush();
        }
    }

    fn spawn_flush(&self) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let queue = self.clone();
                handle.spawn(async move {
                    queue.flush().await;
                });
            }
            Err(_) => {
                tracing::debug!("No async runtime, leaving flush to the timer");
            }
        }
    }

    /// Submit everything that is due.
    ///
    /// Returns immediately with a skipped report if the queue is disabled
    /// or another flush is in progress.
    pub async fn flush(&self) -> FlushReport {
        let inner = &self.inner;
        if !inner.enabled {
            return FlushReport::skipped();
        }

        let Some(_guard) = FlushGuard::acquire(&inner.flushing) else {
            tracing::debug!("Flush already in progress, skipping");
            return FlushReport::skipped();
        };

        let now = Instant::now();
        let mut fresh = Vec::new();
        let mut retry = Vec::new();
        let mut dropped = Vec::new();

        {
            let mut pending = lock(&inner.pending);
            for entry in pending.values() {
                if entry.attempts >= inner.max_attempts {
                    dropped.push(entry.target.clone());
                } else if entry.attempts == 0 {
                    fresh.push(entry.target.clone());
                } else if backoff::is_due(entry.enqueued_at, entry.attempts, inner.base_delay, now)
                {
                    retry.push(entry.target.clone());
                }
            }

            for target in &dropped {
                pending.remove(target);
                tracing::warn!(
                    url = %target,
                    max_attempts = inner.max_attempts,
                    "Removing URL after exhausting IndexNow attempts"
                );
            }
        }

        let mut report = FlushReport {
            dropped: dropped.len(),
            ..Default::default()
        };

        self.submit_batch(BatchKind::Fresh, fresh, &mut report).await;
        self.submit_batch(BatchKind::Retry, retry, &mut report).await;

        *lock(&inner.last_flush_at) = Some(Utc::now());

        if report.batches > 0 || report.dropped > 0 {
            tracing::debug!(
                batches = report.batches,
                delivered = report.delivered,
                failed = report.failed,
                dropped = report.dropped,
                "IndexNow flush finished"
            );
        }

        report
    }

    async fn submit_batch(&self, kind: BatchKind, targets: Vec<String>, report: &mut FlushReport) {
        if targets.is_empty() {
            return;
        }

        let inner = &self.inner;
        report.batches += 1;
        report.submitted += targets.len();

        let result = inner.submitter.submit(&targets).await;

        let mut pending = lock(&inner.pending);
        match result {
            Ok(()) => {
                for target in &targets {
                    pending.remove(target);
                }
                report.delivered += targets.len();
            }
            Err(e) => {
                let now = Instant::now();
                let mut exhausted = 0usize;
                for target in &targets {
                    let Some(entry) = pending.get_mut(target) else {
                        continue;
                    };
                    entry.attempts += 1;
                    entry.enqueued_at = now;
                    if entry.attempts >= inner.max_attempts {
                        pending.remove(target);
                        exhausted += 1;
                        tracing::warn!(
                            url = %target,
                            max_attempts = inner.max_attempts,
                            "Removing URL after exhausting IndexNow attempts"
                        );
                    }
                }
                report.failed += targets.len();
                report.dropped += exhausted;

                tracing::warn!(
                    error = %e,
                    batch = %kind,
                    count = targets.len(),
                    exhausted,
                    "IndexNow batch failed"
                );
            }
        }
    }

    /// Start the periodic flush timer. No-op when disabled or already running.
    ///
    /// The timer task only holds a weak reference; it exits once every
    /// queue handle is gone.
    pub fn start(&self) {
        if !self.inner.enabled {
            return;
        }

        let mut timer = lock(&self.inner.timer);
        if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("Cannot start IndexNow timer outside an async runtime");
            return;
        };

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let period = self.inner.flush_interval;

        *timer = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                NotificationQueue { inner }.flush().await;
            }
        }));

        tracing::info!(
            interval_ms = period.as_millis() as u64,
            "IndexNow flush timer started"
        );
    }

    /// Stop the periodic flush timer. Pending entries are kept.
    pub fn stop(&self) {
        if let Some(handle) = lock(&self.inner.timer).take() {
            handle.abort();
            tracing::info!("IndexNow flush timer stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.timer)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Current pending set, for diagnostics.
    pub fn status(&self) -> QueueStatus {
        let mut urls: Vec<String> = lock(&self.inner.pending).keys().cloned().collect();
        urls.sort();

        QueueStatus {
            size: urls.len(),
            urls,
            enabled: self.inner.enabled,
            last_flush_at: *lock(&self.inner.last_flush_at),
        }
    }

    /// Copies of all pending entries, sorted by target.
    pub fn pending(&self) -> Vec<PendingNotification> {
        let mut entries: Vec<PendingNotification> =
            lock(&self.inner.pending).values().cloned().collect();
        entries.sort_by(|a, b| a.target.cmp(&b.target));
        entries
    }
}
