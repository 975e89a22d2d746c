use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant};
use tracing::debug;

use crate::models::{SessionEvent, COUNTDOWN_TICK};

/// The three timers a guard may own: warning deadline, hard timeout and the
/// one-second countdown. Fired timers only send events; the guard decides
/// what they mean.
#[derive(Debug, Default)]
pub struct TimerSet {
    warning: Option<JoinHandle<()>>,
    hard_timeout: Option<JoinHandle<()>>,
    countdown: Option<JoinHandle<()>>,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm_deadlines(
        &mut self,
        epoch: u64,
        warning_in: Duration,
        timeout_in: Duration,
        events: &UnboundedSender<SessionEvent>,
    ) {
        debug!("Arming timers: warning in {:?}, timeout in {:?}", warning_in, timeout_in);

        replace(
            &mut self.warning,
            fire_after(warning_in, SessionEvent::WarningDeadline { epoch }, events.clone()),
        );
        replace(
            &mut self.hard_timeout,
            fire_after(timeout_in, SessionEvent::HardTimeout { epoch }, events.clone()),
        );
    }

    pub fn start_countdown(&mut self, epoch: u64, events: &UnboundedSender<SessionEvent>) {
        let events = events.clone();
        let handle = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + COUNTDOWN_TICK, COUNTDOWN_TICK);
            loop {
                ticks.tick().await;
                if events.send(SessionEvent::CountdownTick { epoch }).is_err() {
                    break;
                }
            }
        });

        replace(&mut self.countdown, handle);
    }

    /// Aborts every outstanding timer. Must run before any re-arm.
    pub fn cancel_all(&mut self) {
        for handle in [
            self.warning.take(),
            self.hard_timeout.take(),
            self.countdown.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
    }

    /// Number of timers that have not fired or been cancelled yet.
    pub fn outstanding(&self) -> usize {
        [&self.warning, &self.hard_timeout, &self.countdown]
            .into_iter()
            .flatten()
            .filter(|handle| !handle.is_finished())
            .count()
    }
}

impl Drop for TimerSet {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

fn replace(slot: &mut Option<JoinHandle<()>>, handle: JoinHandle<()>) {
    if let Some(previous) = slot.replace(handle) {
        previous.abort();
    }
}

fn fire_after(
    delay: Duration,
    event: SessionEvent,
    events: UnboundedSender<SessionEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        sleep(delay).await;
        let _ = events.send(event);
    })
}
