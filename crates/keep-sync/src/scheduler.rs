use crate::auth::TokenProvider;
use crate::client::NotesClient;
use crate::gateway::NotesGateway;
use keep_core::{KeepError, KeepResult};
use keep_store::KeyValueStore;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(60);

struct TimerHandle {
    stop: Sender<()>,
    thread: JoinHandle<()>,
}

/// Runs `sync_all` on a fixed interval while auto-sync is enabled and a
/// session is present.
///
/// Stopping signals the timer thread without waiting for it, so a sync that
/// is already running finishes on its own.
pub struct AutoSync<G, S, A> {
    client: Arc<NotesClient<G, S, A>>,
    interval: Duration,
    timer: Mutex<Option<TimerHandle>>,
}

impl<G, S, A> AutoSync<G, S, A>
where
    G: NotesGateway + 'static,
    S: KeyValueStore + 'static,
    A: TokenProvider + 'static,
{
    pub fn new(client: Arc<NotesClient<G, S, A>>, interval: Duration) -> Self {
        Self {
            client,
            interval,
            timer: Mutex::new(None),
        }
    }

    pub fn client(&self) -> &Arc<NotesClient<G, S, A>> {
        &self.client
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Starts the timer if the stored preference and the session allow it.
    /// Returns whether a timer is running afterwards.
    pub fn start(&self) -> KeepResult<bool> {
        if !self.client.auto_sync_enabled() || !self.client.is_authenticated() {
            return Ok(false);
        }
        let mut timer = self.lock_timer();
        if timer.as_ref().is_some_and(|handle| !handle.thread.is_finished()) {
            return Ok(true);
        }
        *timer = Some(self.spawn_timer()?);
        Ok(true)
    }

    /// Persists the preference and rebuilds the timer. Enabling also runs one
    /// sync right away on the calling thread.
    pub fn set_auto_sync_enabled(&self, enabled: bool) -> KeepResult<()> {
        self.client.store_auto_sync_enabled(enabled)?;
        self.stop();
        tracing::info!(enabled, "auto-sync preference changed");

        if enabled && self.start()? {
            self.client.background_sync();
        }
        Ok(())
    }

    /// Call after sign-in or sign-out.
    pub fn session_changed(&self) -> KeepResult<bool> {
        if self.client.is_authenticated() {
            self.start()
        } else {
            self.stop();
            Ok(false)
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_timer()
            .as_ref()
            .is_some_and(|handle| !handle.thread.is_finished())
    }

    pub fn stop(&self) {
        if let Some(handle) = self.lock_timer().take() {
            let _ = handle.stop.send(());
            tracing::debug!("auto-sync timer stopped");
        }
    }

    fn spawn_timer(&self) -> KeepResult<TimerHandle> {
        let (stop, stopped) = mpsc::channel::<()>();
        let client = Arc::clone(&self.client);
        let interval = self.interval;

        let thread = thread::Builder::new()
            .name("keep-auto-sync".to_string())
            .spawn(move || {
                loop {
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    if !client.is_authenticated() {
                        tracing::debug!("session ended; auto-sync timer exiting");
                        break;
                    }
                    client.background_sync();
                }
            })
            .map_err(|err| KeepError::io(format!("failed to start auto-sync timer: {err}")))?;

        tracing::debug!(interval_secs = interval.as_secs_f64(), "auto-sync timer started");
        Ok(TimerHandle { stop, thread })
    }

    fn lock_timer(&self) -> MutexGuard<'_, Option<TimerHandle>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<G, S, A> Drop for AutoSync<G, S, A> {
    fn drop(&mut self) {
        if let Some(handle) = self
            .timer
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            let _ = handle.stop.send(());
        }
    }
}
