use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, Instrument};

use crate::models::{
    ActivityKind, ExpiryReason, GuardEffect, SessionEvent, SessionGuardError,
    SessionGuardSettings, SessionNotice, SessionSnapshot, SessionState,
};
use crate::services::collaborators::{SessionAuth, SessionNotifier};
use crate::services::machine::SessionMachine;
use crate::services::timers::TimerSet;

type Reply<T> = oneshot::Sender<Result<T, SessionGuardError>>;

enum Command {
    Dispatch {
        event: SessionEvent,
        reply: Reply<SessionState>,
    },
    Status {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Shutdown,
}

/// Handle to a running inactivity guard.
///
/// Every transition is serialized through one event-loop task that owns the
/// [`SessionMachine`] and its [`TimerSet`]. Handles are cheap to clone; the
/// loop stops once every handle is dropped or [`SessionGuard::shutdown`] is
/// called.
#[derive(Clone)]
pub struct SessionGuard {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<SessionSnapshot>,
}

impl SessionGuard {
    /// Spawns the guard loop on the current tokio runtime.
    pub fn spawn(
        settings: SessionGuardSettings,
        auth: Arc<dyn SessionAuth>,
        notifier: Arc<dyn SessionNotifier>,
    ) -> Self {
        let machine = SessionMachine::new(settings);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(machine.snapshot());

        let guard_loop = GuardLoop {
            machine,
            timers: TimerSet::new(),
            timer_tx,
            snapshot_tx,
            auth,
            notifier,
            teardown: None,
        };
        tokio::spawn(guard_loop.run(commands_rx, timer_rx));

        Self {
            commands: commands_tx,
            snapshot: snapshot_rx,
        }
    }

    pub async fn authenticate(&self) -> Result<SessionState, SessionGuardError> {
        self.dispatch(SessionEvent::Authenticated).await
    }

    pub async fn deauthenticate(&self) -> Result<SessionState, SessionGuardError> {
        self.dispatch(SessionEvent::Unauthenticated).await
    }

    pub async fn record_activity(&self, kind: ActivityKind) -> Result<SessionState, SessionGuardError> {
        self.dispatch(SessionEvent::Activity(kind)).await
    }

    pub async fn extend(&self) -> Result<SessionState, SessionGuardError> {
        self.dispatch(SessionEvent::Extend).await
    }

    pub async fn sign_out(&self) -> Result<SessionState, SessionGuardError> {
        self.dispatch(SessionEvent::SignOut).await
    }

    /// Snapshot ordered after every command and timer event queued so far.
    pub async fn status(&self) -> Result<SessionSnapshot, SessionGuardError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Status { reply })
            .map_err(|_| SessionGuardError::GuardStopped)?;
        rx.await.map_err(|_| SessionGuardError::GuardStopped)
    }

    /// Last published snapshot, without a round trip through the loop.
    pub fn snapshot(&self) -> SessionSnapshot {
        *self.snapshot.borrow()
    }

    pub fn state(&self) -> SessionState {
        self.snapshot.borrow().state
    }

    /// Time left before the hard timeout; zero once unauthenticated.
    pub fn remaining_time(&self) -> Duration {
        self.snapshot.borrow().remaining_time(Instant::now())
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    async fn dispatch(&self, event: SessionEvent) -> Result<SessionState, SessionGuardError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Dispatch { event, reply })
            .map_err(|_| SessionGuardError::GuardStopped)?;
        rx.await.map_err(|_| SessionGuardError::GuardStopped)?
    }
}

struct GuardLoop {
    machine: SessionMachine,
    timers: TimerSet,
    timer_tx: mpsc::UnboundedSender<SessionEvent>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    auth: Arc<dyn SessionAuth>,
    notifier: Arc<dyn SessionNotifier>,
    // Sign-out started by the last handled event, if any.
    teardown: Option<JoinHandle<()>>,
}

impl GuardLoop {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut timer_events: mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        debug!("Session guard loop started");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Dispatch { event, reply }) => {
                        let result = self.handle(event).await;
                        match self.teardown.take() {
                            // The caller hears back once the sign-out has finished;
                            // the loop keeps serving other commands meanwhile.
                            Some(pending) => {
                                tokio::spawn(async move {
                                    let _ = pending.await;
                                    let _ = reply.send(result);
                                });
                            }
                            None => {
                                let _ = reply.send(result);
                            }
                        }
                    }
                    Some(Command::Status { reply }) => {
                        let _ = reply.send(self.machine.snapshot());
                    }
                    Some(Command::Shutdown) | None => break,
                },
                Some(event) = timer_events.recv() => {
                    if let Err(e) = self.handle(event).await {
                        error!("Timer event {:?} rejected: {}", event, e);
                    }
                    // Timer-driven sign-out runs detached.
                    self.teardown = None;
                }
            }
        }

        self.timers.cancel_all();
        debug!("Session guard loop stopped");
    }

    async fn handle(&mut self, event: SessionEvent) -> Result<SessionState, SessionGuardError> {
        let effects = self.machine.transition(event, Instant::now())?;
        for effect in effects {
            self.apply(effect);
        }

        self.snapshot_tx.send_replace(self.machine.snapshot());
        Ok(self.machine.state())
    }

    fn apply(&mut self, effect: GuardEffect) {
        match effect {
            GuardEffect::CancelAll => self.timers.cancel_all(),
            GuardEffect::ArmDeadlines { epoch, warning_in, timeout_in } => {
                self.timers.arm_deadlines(epoch, warning_in, timeout_in, &self.timer_tx);
            }
            GuardEffect::StartCountdown { epoch } => {
                self.timers.start_countdown(epoch, &self.timer_tx);
            }
            GuardEffect::Notify(notice) => self.notifier.notify(notice),
            GuardEffect::Expire(reason) => self.teardown(reason),
        }
    }

    #[instrument(skip(self))]
    fn teardown(&mut self, reason: ExpiryReason) {
        info!("Ending session");

        self.timers.cancel_all();
        self.notifier.clear_cached_state();

        let auth = self.auth.clone();
        let notifier = self.notifier.clone();
        let sign_out = async move {
            // Redirect happens even when the backend refuses the sign out.
            if let Err(e) = auth.sign_out().await {
                error!("Error during logout: {}", e);
            }

            notifier.redirect_to_login();
            notifier.notify(SessionNotice::Expired {
                reason,
                message: reason.message().to_string(),
            });
        };

        self.teardown = Some(tokio::spawn(sign_out.in_current_span()));
    }
}
