// src/replay.rs
//
// In-memory platform collaborators. Used by the demo binary to replay a
// recorded drive, and by tests as fakes.

use crate::error::{ControlError, SinkError};
use crate::service::{LocationProvider, OutputSink, StatusSurface};
use crate::types::{LocationRequest, RawFix};
use anyhow::{Context, Result};
use std::fs;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Longest pause honoured between two replayed fixes
const MAX_REPLAY_GAP: Duration = Duration::from_secs(5);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// LOCATION
// ============================================================================

/// Location provider whose fixes are pushed by the caller.
pub struct ReplayLocationProvider {
    permission: AtomicBool,
    sender: Mutex<Option<mpsc::UnboundedSender<RawFix>>>,
    requests: Mutex<Vec<LocationRequest>>,
    removals: AtomicUsize,
}

impl ReplayLocationProvider {
    pub fn new(permission: bool) -> Self {
        Self {
            permission: AtomicBool::new(permission),
            sender: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            removals: AtomicUsize::new(0),
        }
    }

    pub fn set_permission(&self, granted: bool) {
        self.permission.store(granted, Ordering::SeqCst);
    }

    /// Deliver a fix to the active subscription. False when unsubscribed.
    pub fn push(&self, fix: RawFix) -> bool {
        match lock(&self.sender).as_ref() {
            Some(tx) => tx.send(fix).is_ok(),
            None => false,
        }
    }

    /// Clone of the live delivery channel, if subscribed.
    pub fn sender(&self) -> Option<mpsc::UnboundedSender<RawFix>> {
        lock(&self.sender).clone()
    }

    pub fn is_subscribed(&self) -> bool {
        lock(&self.sender).is_some()
    }

    pub fn subscription_count(&self) -> usize {
        lock(&self.requests).len()
    }

    pub fn last_request(&self) -> Option<LocationRequest> {
        lock(&self.requests).last().copied()
    }

    pub fn removal_count(&self) -> usize {
        self.removals.load(Ordering::SeqCst)
    }
}

impl LocationProvider for ReplayLocationProvider {
    fn has_permission(&self) -> bool {
        self.permission.load(Ordering::SeqCst)
    }

    fn request_updates(
        &self,
        request: LocationRequest,
    ) -> Result<mpsc::UnboundedReceiver<RawFix>, ControlError> {
        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.sender) = Some(tx);
        lock(&self.requests).push(request);
        debug!(
            "Location updates requested every {:?} (fastest {:?})",
            request.interval, request.fastest_interval
        );
        Ok(rx)
    }

    fn remove_updates(&self) {
        lock(&self.sender).take();
        self.removals.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// OUTPUT
// ============================================================================

/// Output sink that records every write.
pub struct MemorySink {
    max: u32,
    current: AtomicU32,
    writes: Mutex<Vec<u32>>,
    failures_pending: AtomicU32,
}

impl MemorySink {
    pub fn new(max: u32, current: u32) -> Self {
        Self {
            max,
            current: AtomicU32::new(current.min(max)),
            writes: Mutex::new(Vec::new()),
            failures_pending: AtomicU32::new(0),
        }
    }

    pub fn writes(&self) -> Vec<u32> {
        lock(&self.writes).clone()
    }

    /// Make the next `count` writes fail.
    pub fn fail_next_writes(&self, count: u32) {
        self.failures_pending.store(count, Ordering::SeqCst);
    }
}

impl OutputSink for MemorySink {
    fn max_volume(&self) -> u32 {
        self.max
    }

    fn current_volume(&self) -> u32 {
        self.current.load(Ordering::SeqCst)
    }

    fn set_volume(&self, volume: u32) -> Result<(), SinkError> {
        let pending = self.failures_pending.load(Ordering::SeqCst);
        if pending > 0 {
            self.failures_pending.store(pending - 1, Ordering::SeqCst);
            return Err(SinkError::Refused("volume warning dialog showing".to_string()));
        }
        let volume = volume.min(self.max);
        self.current.store(volume, Ordering::SeqCst);
        lock(&self.writes).push(volume);
        Ok(())
    }
}

/// Status surface that only counts calls.
#[derive(Default)]
pub struct RecordingSurface {
    acquired: AtomicUsize,
    released: AtomicUsize,
    permission_notices: AtomicUsize,
}

impl RecordingSurface {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn permission_notices(&self) -> usize {
        self.permission_notices.load(Ordering::SeqCst)
    }
}

impl StatusSurface for RecordingSurface {
    fn acquire(&self) {
        self.acquired.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }

    fn notify_permission_needed(&self) {
        self.permission_notices.fetch_add(1, Ordering::SeqCst);
        warn!("Location permission is needed to track speed");
    }
}

// ============================================================================
// TRACES
// ============================================================================

/// Parse a JSON-lines trace of raw fixes. Blank lines are skipped.
pub fn parse_trace(contents: &str) -> Result<Vec<RawFix>> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str::<RawFix>(line).with_context(|| format!("trace line {}", idx + 1))
        })
        .collect()
}

pub fn load_trace(path: &str) -> Result<Vec<RawFix>> {
    let contents = fs::read_to_string(path).with_context(|| format!("reading trace {}", path))?;
    parse_trace(&contents)
}

/// Push fixes to the provider, spaced by their recorded timestamps divided
/// by `speedup`. Returns how many were delivered.
pub async fn replay_fixes(provider: &ReplayLocationProvider, fixes: &[RawFix], speedup: f64) -> usize {
    let speedup = if speedup > 0.0 { speedup } else { 1.0 };
    let mut previous_time: Option<i64> = None;
    let mut delivered = 0;

    for fix in fixes {
        if let (Some(prev), Some(now)) = (previous_time, fix.time_ms) {
            let gap = Duration::from_millis((now - prev).max(0) as u64).min(MAX_REPLAY_GAP);
            tokio::time::sleep(gap.div_f64(speedup)).await;
        }
        if fix.time_ms.is_some() {
            previous_time = fix.time_ms;
        }

        if !provider.push(fix.clone()) {
            info!("Location feed closed, replay stopped after {} fixes", delivered);
            break;
        }
        delivered += 1;
    }
    delivered
}
