use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Admits at most one full sync at a time and remembers when the last one
/// succeeded.
#[derive(Debug, Default)]
pub struct SyncGate {
    in_flight: AtomicBool,
    last_success: Mutex<Option<DateTime<Utc>>>,
}

/// Holds the gate closed; dropping it reopens the gate whether the sync
/// succeeded or not.
#[derive(Debug)]
pub struct SyncGuard<'a> {
    gate: &'a SyncGate,
}

impl SyncGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gate that remembers a success from an earlier run.
    pub fn with_last_success(at: Option<DateTime<Utc>>) -> Self {
        Self {
            in_flight: AtomicBool::new(false),
            last_success: Mutex::new(at),
        }
    }

    /// Claims the gate, or returns `None` if a sync is already running.
    pub fn try_begin(&self) -> Option<SyncGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SyncGuard { gate: self })
    }

    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        *self
            .last_success
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl SyncGuard<'_> {
    pub fn mark_success(&self, at: DateTime<Utc>) {
        *self
            .gate
            .last_success
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(at);
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.gate.in_flight.store(false, Ordering::Release);
    }
}

/// Counts running network operations for the loading indicator, and every
/// operation started since construction.
#[derive(Debug, Default)]
pub(crate) struct LoadingCounter {
    active: AtomicUsize,
    started: AtomicU64,
}

pub(crate) struct LoadingGuard<'a> {
    counter: &'a LoadingCounter,
}

impl LoadingCounter {
    pub(crate) fn enter(&self) -> LoadingGuard<'_> {
        self.active.fetch_add(1, Ordering::AcqRel);
        self.started.fetch_add(1, Ordering::Relaxed);
        LoadingGuard { counter: self }
    }

    pub(crate) fn started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    pub(crate) fn is_loading(&self) -> bool {
        self.active.load(Ordering::Acquire) > 0
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.counter.active.fetch_sub(1, Ordering::AcqRel);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub notes: usize,
    pub categories: usize,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub is_syncing: bool,
    pub is_loading: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub auto_sync_enabled: bool,
    pub authenticated: bool,
    /// Network calls made by this client.
    pub api_calls: u64,
    pub cached_notes: usize,
    pub cached_categories: usize,
}
