//! Offline-first synchronization for the keep notes client.

mod auth;
mod client;
mod coordinator;
mod gateway;
mod notify;
pub mod reconcile;
mod scheduler;

pub use auth::{StaticToken, TokenProvider};
pub use client::NotesClient;
pub use coordinator::{SyncGate, SyncGuard, SyncReport, SyncStatus};
pub use gateway::NotesGateway;
pub use notify::{LogNotifier, Notifier};
pub use scheduler::{AutoSync, DEFAULT_SYNC_INTERVAL};
