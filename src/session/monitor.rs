use std::sync::Arc;
use std::time::Duration as StdDuration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::activity::{ActivityStore, INACTIVITY_DEFAULT_MINUTES};

use super::provider::IdentityProvider;
use super::snapshot::SessionSnapshot;

/// Seconds between periodic session checks
pub const CHECK_INTERVAL_SECS: u64 = 60;

/// Buffer size for the event and command channels.
/// 32 is generous for a supervisor that emits a handful of events per tick.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Why the monitor terminated the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutReason {
    Inactivity,
    Expired,
    RefreshFailed,
}

/// Monitor outcome surfaced to the embedding UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    WarningShown {
        time_until_expiry: chrono::Duration,
    },
    WarningCleared,
    SessionRefreshed,
    SignedOut {
        reason: SignOutReason,
    },
}

enum MonitorCommand {
    Activity,
    Extend(oneshot::Sender<anyhow::Result<()>>),
    Shutdown,
}

/// Periodic supervisor for the active session.
///
/// Every check runs the same decision ladder: no session means no-op;
/// inactivity outranks everything and forces sign-out; a session close to
/// expiry surfaces a warning; closer still, the monitor auto-refreshes, and
/// a refresh failure is fatal; a session already past expiry is signed out
/// as the final safety net.
///
/// The monitor owns no persisted state. Session data is borrowed from the
/// identity provider on every tick, and activity state is read from the
/// store the UI layer feeds.
pub struct SessionMonitor<P: IdentityProvider> {
    provider: Arc<P>,
    activity: ActivityStore,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: Option<mpsc::Receiver<SessionEvent>>,
    warning_shown: bool,
    /// Guards against a periodic tick and a manual extension issuing two
    /// overlapping refresh calls.
    refresh_in_flight: bool,
}

impl<P: IdentityProvider + 'static> SessionMonitor<P> {
    pub fn new(provider: Arc<P>, activity: ActivityStore) -> Self {
        let (events_tx, events_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        Self {
            provider,
            activity,
            events_tx,
            events_rx: Some(events_rx),
            warning_shown: false,
            refresh_in_flight: false,
        }
    }

    /// Take the event stream. Yields `Some` only on the first call.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.events_rx.take()
    }

    /// Run one periodic check against the current session.
    pub async fn tick(&mut self) {
        let Some(session) = self.provider.current_session().await else {
            return; // nothing to supervise
        };

        let snapshot = SessionSnapshot::capture(&session, &self.activity);

        // Inactivity outranks every other condition.
        if snapshot.is_inactive {
            info!("Session idle past timeout, signing out");
            self.force_sign_out(SignOutReason::Inactivity).await;
            return;
        }

        if snapshot.should_show_warning() && !self.warning_shown {
            self.warning_shown = true;
            self.emit(SessionEvent::WarningShown {
                time_until_expiry: snapshot.time_until_expiry,
            })
            .await;
        }

        if snapshot.should_auto_refresh() {
            debug!(
                seconds_left = snapshot.time_until_expiry.num_seconds(),
                "Auto-refreshing session"
            );
            if let Err(e) = self.refresh_guarded().await {
                error!(error = %e, "Session refresh failed, signing out");
                self.force_sign_out(SignOutReason::RefreshFailed).await;
                return;
            }
            info!("Session refreshed");
            self.clear_warning().await;
            self.emit(SessionEvent::SessionRefreshed).await;
            return; // fresh expiry; this snapshot is no longer meaningful
        }

        // Final safety net, e.g. against provider clock skew.
        if snapshot.is_expired() {
            info!("Session expired, signing out");
            self.force_sign_out(SignOutReason::Expired).await;
        }
    }

    /// Manual "keep me signed in" from the timeout warning dialog. Success
    /// clears the warning and resets the activity clock regardless of how
    /// much time was left.
    pub async fn extend_session(&mut self) -> anyhow::Result<()> {
        if self.refresh_in_flight {
            debug!("Refresh already in flight, skipping manual extension");
            return Ok(());
        }

        if let Err(e) = self.refresh_guarded().await {
            error!(error = %e, "Manual session extension failed, signing out");
            self.force_sign_out(SignOutReason::RefreshFailed).await;
            return Err(e);
        }

        self.clear_warning().await;
        self.activity.update_last_activity();
        self.emit(SessionEvent::SessionRefreshed).await;
        Ok(())
    }

    async fn refresh_guarded(&mut self) -> anyhow::Result<()> {
        self.refresh_in_flight = true;
        let result = self.provider.refresh_session().await;
        self.refresh_in_flight = false;
        result.map(|_| ())
    }

    async fn force_sign_out(&mut self, reason: SignOutReason) {
        self.warning_shown = false;
        if let Err(e) = self.provider.sign_out().await {
            warn!(error = %e, "Sign-out call failed");
        }
        // Preferences are not cleared here: only an explicit user sign-out
        // wipes them, so the next login can still read the remember-me
        // choice.
        self.emit(SessionEvent::SignedOut { reason }).await;
    }

    async fn clear_warning(&mut self) {
        if self.warning_shown {
            self.warning_shown = false;
            self.emit(SessionEvent::WarningCleared).await;
        }
    }

    async fn emit(&self, event: SessionEvent) {
        if self.events_tx.send(event).await.is_err() {
            debug!("Session event dropped, receiver gone");
        }
    }

    fn idle_timeout(&self) -> StdDuration {
        self.activity
            .inactivity_timeout()
            .to_std()
            .unwrap_or(StdDuration::from_secs(60 * INACTIVITY_DEFAULT_MINUTES as u64))
    }

    /// Start supervising on a background task.
    ///
    /// Two timers run from here: the fixed-period expiry check and a
    /// one-shot inactivity sleep that is rescheduled on every activity
    /// signal, re-selecting the timeout so a remember-me change takes effect
    /// on the next interaction. Dropping the returned handle aborts the task
    /// and both timers with it.
    pub fn spawn(mut self) -> MonitorHandle {
        let (commands_tx, mut commands_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        let task = tokio::spawn(async move {
            let mut check = tokio::time::interval(StdDuration::from_secs(CHECK_INTERVAL_SECS));
            check.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            // Start-up counts as activity, matching the web app's mount
            // behavior. The first interval tick fires immediately and gives
            // the initial session check.
            self.activity.update_last_activity();
            let idle = tokio::time::sleep(self.idle_timeout());
            tokio::pin!(idle);

            loop {
                tokio::select! {
                    _ = check.tick() => {
                        self.tick().await;
                    }
                    () = &mut idle => {
                        // Without a session there is nothing to sign out of;
                        // the timer just rearms until one appears.
                        if self.provider.current_session().await.is_some() {
                            info!("Inactivity timer fired");
                            self.force_sign_out(SignOutReason::Inactivity).await;
                        }
                        idle.as_mut()
                            .reset(tokio::time::Instant::now() + self.idle_timeout());
                    }
                    command = commands_rx.recv() => match command {
                        Some(MonitorCommand::Activity) => {
                            self.activity.update_last_activity();
                            self.clear_warning().await;
                            idle.as_mut()
                                .reset(tokio::time::Instant::now() + self.idle_timeout());
                        }
                        Some(MonitorCommand::Extend(reply)) => {
                            let result = self.extend_session().await;
                            if result.is_ok() {
                                idle.as_mut()
                                    .reset(tokio::time::Instant::now() + self.idle_timeout());
                            }
                            let _ = reply.send(result);
                        }
                        Some(MonitorCommand::Shutdown) | None => break,
                    }
                }
            }
            debug!("Session monitor stopped");
        });

        MonitorHandle {
            commands: commands_tx,
            task: Some(task),
        }
    }
}

/// Control handle for a spawned monitor, scoped to the screen that owns the
/// session UI. Dropping it aborts the supervision task so a leaked interval
/// cannot force sign-outs after teardown.
pub struct MonitorHandle {
    commands: mpsc::Sender<MonitorCommand>,
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Record a qualifying user interaction (pointer, keyboard, scroll,
    /// touch). Non-blocking so UI event handlers can call it directly.
    pub fn record_activity(&self) {
        if let Err(e) = self.commands.try_send(MonitorCommand::Activity) {
            debug!(error = %e, "Activity signal dropped");
        }
    }

    /// Manually extend the session from the warning dialog.
    pub async fn extend_session(&self) -> anyhow::Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(MonitorCommand::Extend(reply_tx))
            .await
            .map_err(|_| anyhow::anyhow!("session monitor is not running"))?;
        reply_rx
            .await
            .map_err(|_| anyhow::anyhow!("session monitor dropped the extension request"))?
    }

    /// Stop the monitor and wait for it to wind down.
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(MonitorCommand::Shutdown).await;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
