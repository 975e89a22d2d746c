use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::models::{
    remaining_time, ExpiryReason, GuardEffect, SessionEvent, SessionGuardError,
    SessionGuardSettings, SessionNotice, SessionSnapshot, SessionState, COUNTDOWN_TICK,
};

/// Pure inactivity state machine. All legal transitions go through
/// [`SessionMachine::transition`]; timers are represented by the effects it
/// returns and by the epoch stamped on timer events.
#[derive(Debug, Clone)]
pub struct SessionMachine {
    settings: SessionGuardSettings,
    state: SessionState,
    last_activity_at: Option<Instant>,
    countdown: Duration,
    epoch: u64,
}

impl SessionMachine {
    pub fn new(settings: SessionGuardSettings) -> Self {
        if !settings.is_consistent() {
            warn!(
                "Session warning lead {:?} is not below timeout {:?}; warning will fire immediately",
                settings.warning_lead, settings.timeout
            );
        }

        Self {
            settings,
            state: SessionState::SignedOut,
            last_activity_at: None,
            countdown: Duration::ZERO,
            epoch: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn settings(&self) -> SessionGuardSettings {
        self.settings
    }

    pub fn last_activity_at(&self) -> Option<Instant> {
        self.last_activity_at
    }

    pub fn countdown_seconds(&self) -> u64 {
        self.countdown.as_secs()
    }

    pub fn remaining_time(&self, now: Instant) -> Duration {
        remaining_time(self.state, self.last_activity_at, self.settings.timeout, now)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            last_activity_at: self.last_activity_at,
            countdown_seconds: self.countdown_seconds(),
            settings: self.settings,
        }
    }

    pub fn transition(
        &mut self,
        event: SessionEvent,
        now: Instant,
    ) -> Result<Vec<GuardEffect>, SessionGuardError> {
        use SessionEvent as E;
        use SessionState as S;

        let effects = match (self.state, event) {
            (S::SignedOut | S::Expired, E::Authenticated) => {
                info!("Session authenticated, arming inactivity timers");
                self.rearm(now)
            }
            (S::Active | S::Warning, E::Authenticated) => Vec::new(),

            (_, E::Unauthenticated) => self.sign_out_locally(),

            (S::Active, E::Activity(kind)) => {
                debug!("Activity {:?} resets inactivity timer", kind);
                self.rearm(now)
            }
            (S::Warning, E::Activity(kind)) => {
                debug!("Ignoring {:?} while the expiry warning is showing", kind);
                Vec::new()
            }
            (S::SignedOut | S::Expired, E::Activity(_)) => Vec::new(),

            (S::Active | S::Warning, E::Extend) => {
                info!("Session extended");
                let mut effects = self.rearm(now);
                effects.push(GuardEffect::Notify(SessionNotice::Extended));
                effects
            }
            (S::Active | S::Warning, E::SignOut) => self.expire(ExpiryReason::SignedOut),
            (S::SignedOut | S::Expired, E::Extend | E::SignOut) => {
                return Err(SessionGuardError::NotAuthenticated);
            }

            (S::Active, E::WarningDeadline { epoch }) if epoch == self.epoch => {
                self.state = S::Warning;
                self.countdown = self.settings.warning_lead;
                info!("Showing session expiry warning ({}s left)", self.countdown_seconds());
                vec![
                    GuardEffect::StartCountdown { epoch },
                    GuardEffect::Notify(SessionNotice::WarningShown {
                        seconds_left: self.countdown_seconds(),
                    }),
                ]
            }
            (S::Warning, E::CountdownTick { epoch }) if epoch == self.epoch => {
                self.countdown = self.countdown.saturating_sub(COUNTDOWN_TICK);
                if self.countdown.is_zero() {
                    self.expire(ExpiryReason::CountdownElapsed)
                } else {
                    vec![GuardEffect::Notify(SessionNotice::Countdown {
                        seconds_left: self.countdown_seconds(),
                    })]
                }
            }
            (S::Active | S::Warning, E::HardTimeout { epoch }) if epoch == self.epoch => {
                info!("Auto logout triggered");
                self.expire(ExpiryReason::HardTimeout)
            }
            (state, timer_event) => {
                debug!(
                    "Dropping stale timer event {:?} in state {:?} (epoch {})",
                    timer_event, state, self.epoch
                );
                Vec::new()
            }
        };

        Ok(effects)
    }

    fn rearm(&mut self, now: Instant) -> Vec<GuardEffect> {
        self.state = SessionState::Active;
        self.last_activity_at = Some(now);
        self.countdown = Duration::ZERO;
        self.epoch += 1;

        vec![
            GuardEffect::CancelAll,
            GuardEffect::ArmDeadlines {
                epoch: self.epoch,
                warning_in: self.settings.warning_after(),
                timeout_in: self.settings.timeout,
            },
        ]
    }

    fn expire(&mut self, reason: ExpiryReason) -> Vec<GuardEffect> {
        self.state = SessionState::Expired;
        self.countdown = Duration::ZERO;
        self.epoch += 1;

        vec![GuardEffect::CancelAll, GuardEffect::Expire(reason)]
    }

    fn sign_out_locally(&mut self) -> Vec<GuardEffect> {
        if self.state == SessionState::SignedOut {
            return Vec::new();
        }

        self.state = SessionState::SignedOut;
        self.last_activity_at = None;
        self.countdown = Duration::ZERO;
        self.epoch += 1;

        vec![GuardEffect::CancelAll]
    }
}
