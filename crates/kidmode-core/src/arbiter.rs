//! Request arbiter

use chrono::{DateTime, Local};
use kidmode_api::{
    Notification, PendingView, Session, SessionView, SubmitOutcome, TransitionKind,
};
use kidmode_config::Settings;
use kidmode_host_api::{NotificationSink, Scheduler, TimerToken};
use kidmode_store::{AuditEvent, AuditEventType, Store};
use kidmode_util::{ChallengeId, KidModeError, MonotonicInstant, Result, Secret};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::{CountdownEngine, CredentialGate, GateVerdict, SessionState, TickOutcome, TICK_PERIOD};

/// The one open challenge
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub challenge_id: ChallengeId,
    pub kind: TransitionKind,

    /// Wall-clock open time (for display/audit)
    pub created_at: DateTime<Local>,

    /// Monotonic open time (for timeout enforcement)
    pub created_at_mono: MonotonicInstant,
}

impl PendingRequest {
    fn new(kind: TransitionKind, now: DateTime<Local>, now_mono: MonotonicInstant) -> Self {
        Self {
            challenge_id: ChallengeId::new(),
            kind,
            created_at: now,
            created_at_mono: now_mono,
        }
    }

    pub fn to_view(&self, attempts_left: u32) -> PendingView {
        PendingView {
            challenge_id: self.challenge_id,
            kind: self.kind.tag(),
            timer_minutes: self.kind.timer_minutes(),
            opened_at: self.created_at,
            attempts_left,
        }
    }
}

/// Mediates every change to the session
///
/// A transition is requested, which opens a challenge; the challenge is
/// answered with the guardian secret, which applies the transition. At most
/// one challenge is open at a time. The countdown is the only thing that
/// changes the session without a challenge.
pub struct RequestArbiter {
    settings: Settings,
    store: Arc<dyn Store>,
    scheduler: Arc<dyn Scheduler>,
    sink: Arc<dyn NotificationSink>,
    gate: CredentialGate,
    session: SessionState,
    countdown: CountdownEngine,
    pending: Option<PendingRequest>,
    secret_configured: bool,
}

impl RequestArbiter {
    /// Create a new arbiter
    pub fn new(
        settings: Settings,
        store: Arc<dyn Store>,
        scheduler: Arc<dyn Scheduler>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        let gate = CredentialGate::new(store.clone());
        let secret_configured = gate.is_configured()?;

        info!(
            secret_configured,
            challenge_timeout_secs = settings.challenge_timeout.map(|t| t.as_secs()),
            notifications = settings.notifications_enabled,
            "Request arbiter initialized"
        );

        Ok(Self {
            settings,
            store,
            scheduler,
            sink,
            gate,
            session: SessionState::new(),
            countdown: CountdownEngine::new(),
            pending: None,
            secret_configured,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Current session
    pub fn session(&self) -> Session {
        self.session.snapshot()
    }

    pub fn pending(&self) -> Option<&PendingRequest> {
        self.pending.as_ref()
    }

    pub fn secret_configured(&self) -> bool {
        self.secret_configured
    }

    /// Session plus the open challenge, as shown to clients
    pub fn view(&self) -> SessionView {
        SessionView {
            session: self.session.snapshot(),
            pending: self
                .pending
                .as_ref()
                .map(|p| p.to_view(self.gate.attempts_left())),
            secret_configured: self.secret_configured,
        }
    }

    pub fn timer_presets(&self) -> &[u32] {
        &self.settings.timer.presets_minutes
    }

    /// Token of the running countdown, if any
    pub fn active_timer(&self) -> Option<TimerToken> {
        self.countdown.current_token()
    }

    /// First-run secret creation
    pub fn setup_secret(&mut self, secret: Secret, confirmation: Secret) -> Result<()> {
        if self.secret_configured {
            return Err(KidModeError::SecretAlreadyConfigured);
        }

        validate_new_secret(&secret, &confirmation, self.settings.secret.min_length_setup)?;

        self.gate.set_secret(&secret)?;
        self.secret_configured = true;
        self.audit(AuditEventType::SecretConfigured);
        info!("Guardian secret configured");

        Ok(())
    }

    /// Open a challenge for `kind`
    pub fn request_transition(&mut self, kind: TransitionKind) -> Result<PendingView> {
        self.request_transition_at(kind, kidmode_util::now(), MonotonicInstant::now())
    }

    pub fn request_transition_at(
        &mut self,
        kind: TransitionKind,
        now: DateTime<Local>,
        now_mono: MonotonicInstant,
    ) -> Result<PendingView> {
        self.check_can_open(&kind)?;

        match &kind {
            TransitionKind::EnableWithTimer { minutes } => {
                timer_seconds(*minutes)?;
            }
            TransitionKind::ChangeSecret { .. } => {
                return Err(KidModeError::invalid_secret(
                    "a secret change needs a confirmation",
                ));
            }
            TransitionKind::Enable | TransitionKind::Disable => {}
        }

        Ok(self.open_challenge(kind, now, now_mono))
    }

    /// Open a challenge that replaces the secret once approved
    pub fn request_secret_change(
        &mut self,
        new_secret: Secret,
        confirmation: Secret,
    ) -> Result<PendingView> {
        if self.pending.is_some() {
            return Err(KidModeError::AlreadyPending);
        }
        validate_new_secret(
            &new_secret,
            &confirmation,
            self.settings.secret.min_length_change,
        )?;

        let kind = TransitionKind::ChangeSecret { new_secret };
        self.check_can_open(&kind)?;
        Ok(self.open_challenge(kind, kidmode_util::now(), MonotonicInstant::now()))
    }

    fn check_can_open(&self, kind: &TransitionKind) -> Result<()> {
        if self.pending.is_some() {
            debug!(requested = %kind.tag(), "Challenge already open");
            return Err(KidModeError::AlreadyPending);
        }
        if !self.secret_configured {
            return Err(KidModeError::SecretNotConfigured);
        }
        Ok(())
    }

    fn open_challenge(
        &mut self,
        kind: TransitionKind,
        now: DateTime<Local>,
        now_mono: MonotonicInstant,
    ) -> PendingView {
        let pending = PendingRequest::new(kind, now, now_mono);
        let view = pending.to_view(self.gate.attempts_left());

        self.audit(AuditEventType::ChallengeOpened {
            challenge_id: pending.challenge_id,
            kind: view.kind,
        });
        info!(
            challenge_id = %pending.challenge_id,
            kind = %view.kind,
            timer_minutes = view.timer_minutes,
            "Challenge opened"
        );

        self.pending = Some(pending);
        view
    }

    /// Answer the open challenge
    pub fn submit_credential(&mut self, candidate: &str) -> Result<SubmitOutcome> {
        let challenge_id = match &self.pending {
            Some(pending) => pending.challenge_id,
            None => return Err(KidModeError::NoPendingChallenge),
        };

        match self.gate.check(candidate)? {
            GateVerdict::Approved => {
                let Some(pending) = self.pending.take() else {
                    return Err(KidModeError::NoPendingChallenge);
                };
                let kind = pending.kind.tag();
                debug!(%challenge_id, %kind, "Challenge approved");

                let applied = self.apply(pending)?;
                Ok(SubmitOutcome::Approved { kind, applied })
            }
            GateVerdict::Denied { attempts_left } => {
                self.audit(AuditEventType::CredentialDenied {
                    challenge_id,
                    attempts_left,
                });
                info!(%challenge_id, attempts_left, "Credential denied");
                self.notify(Notification::Denied { attempts_left });
                Ok(SubmitOutcome::Denied { attempts_left })
            }
            GateVerdict::LockedOut => {
                self.pending = None;
                self.audit(AuditEventType::LockedOut { challenge_id });
                warn!(%challenge_id, "Too many wrong attempts, challenge closed");
                self.notify(Notification::LockedOut);
                Ok(SubmitOutcome::LockedOut)
            }
        }
    }

    /// Dismiss the open challenge. Returns whether one was open.
    pub fn cancel(&mut self) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };

        self.gate.reset();
        self.audit(AuditEventType::ChallengeCancelled {
            challenge_id: pending.challenge_id,
        });
        info!(challenge_id = %pending.challenge_id, "Challenge cancelled");
        true
    }

    /// Feed a fired timer token to the countdown
    pub fn on_tick(&mut self, token: TimerToken) -> TickOutcome {
        let outcome = self.countdown.tick(token, &mut self.session);

        match outcome {
            TickOutcome::Ticked { remaining } => {
                trace!(%token, remaining, "Countdown tick");
            }
            TickOutcome::Expired => {
                self.cancel_timer(token);
                self.audit(AuditEventType::TimerExpired);
                info!("Kid mode timer expired");
                self.notify(Notification::Expired);
            }
            TickOutcome::Stale => {
                debug!(%token, "Ignoring stale tick");
                if self.countdown.current_token() != Some(token) {
                    self.cancel_timer(token);
                }
            }
        }

        outcome
    }

    /// Close the open challenge if it has outlived the configured timeout.
    /// Returns whether a challenge was closed.
    pub fn expire_stale_challenge(&mut self, now: MonotonicInstant) -> bool {
        let Some(timeout) = self.settings.challenge_timeout else {
            return false;
        };

        let expired = self
            .pending
            .as_ref()
            .is_some_and(|p| now.duration_since(p.created_at_mono) >= timeout);
        if !expired {
            return false;
        }

        let Some(pending) = self.pending.take() else {
            return false;
        };
        self.gate.reset();
        self.audit(AuditEventType::ChallengeTimedOut {
            challenge_id: pending.challenge_id,
        });
        info!(
            challenge_id = %pending.challenge_id,
            timeout_secs = timeout.as_secs(),
            "Challenge timed out"
        );
        self.notify(Notification::ChallengeTimedOut);
        true
    }

    /// Stop the countdown timer ahead of service shutdown
    pub fn shutdown(&mut self) {
        if let Some(token) = self.countdown.stop() {
            self.cancel_timer(token);
        }
    }

    fn apply(&mut self, pending: PendingRequest) -> Result<bool> {
        self.gate.reset();

        let applied = match &pending.kind {
            TransitionKind::Enable => {
                let applied = self.session.enable();
                if applied {
                    self.audit(AuditEventType::KidModeEnabled { timer_seconds: None });
                    info!("Kid mode enabled");
                    self.notify(Notification::Enabled { timer_seconds: None });
                }
                applied
            }
            TransitionKind::Disable => {
                let applied = self.session.disable();
                if applied {
                    if let Some(token) = self.countdown.stop() {
                        self.cancel_timer(token);
                    }
                    self.audit(AuditEventType::KidModeDisabled);
                    info!("Kid mode disabled");
                    self.notify(Notification::Disabled);
                }
                applied
            }
            TransitionKind::EnableWithTimer { minutes } => {
                let seconds = timer_seconds(*minutes)?;
                if self.session.is_restricted() {
                    false
                } else {
                    self.start_countdown()?;
                    self.session.enable_with_timer(seconds);
                    self.audit(AuditEventType::KidModeEnabled {
                        timer_seconds: Some(seconds),
                    });
                    info!(timer_seconds = seconds, "Kid mode enabled with timer");
                    self.notify(Notification::Enabled {
                        timer_seconds: Some(seconds),
                    });
                    true
                }
            }
            TransitionKind::ChangeSecret { new_secret } => {
                self.gate.set_secret(new_secret)?;
                self.audit(AuditEventType::SecretChanged);
                info!("Guardian secret changed");
                self.notify(Notification::SecretChanged);
                true
            }
        };

        if !applied {
            let kind = pending.kind.tag();
            self.audit(AuditEventType::TransitionSkipped {
                challenge_id: pending.challenge_id,
                kind,
            });
            info!(challenge_id = %pending.challenge_id, %kind, "Approved transition no longer applies");
        }

        Ok(applied)
    }

    fn start_countdown(&mut self) -> Result<()> {
        let (token, previous) = self.countdown.start();
        if let Some(previous) = previous {
            self.cancel_timer(previous);
        }

        if let Err(e) = self.scheduler.schedule(token, TICK_PERIOD) {
            self.countdown.stop();
            return Err(KidModeError::internal(format!(
                "Failed to schedule countdown: {}",
                e
            )));
        }

        debug!(%token, "Countdown started");
        Ok(())
    }

    fn cancel_timer(&self, token: TimerToken) {
        if let Err(e) = self.scheduler.cancel(token) {
            warn!(%token, error = %e, "Failed to cancel timer");
        }
    }

    fn notify(&self, notification: Notification) {
        if !self.settings.notifications_enabled && notification.is_guardian_alert() {
            debug!(?notification, "Guardian alert muted");
            return;
        }
        self.sink.notify(notification);
    }

    fn audit(&self, event: AuditEventType) {
        if let Err(e) = self.store.append_audit(AuditEvent::new(event)) {
            warn!(error = %e, "Failed to append audit event");
        }
    }
}

/// Convert a timer request to seconds, rejecting non-positive and
/// overflowing values
fn timer_seconds(minutes: i64) -> Result<u64> {
    if minutes <= 0 {
        return Err(KidModeError::InvalidTimer(minutes));
    }
    (minutes as u64)
        .checked_mul(60)
        .ok_or(KidModeError::InvalidTimer(minutes))
}

fn check_secret_length(secret: &Secret, min_length: usize) -> Result<()> {
    if secret.char_len() < min_length {
        return Err(KidModeError::invalid_secret(format!(
            "must be at least {} characters",
            min_length
        )));
    }
    Ok(())
}

fn validate_new_secret(secret: &Secret, confirmation: &Secret, min_length: usize) -> Result<()> {
    check_secret_length(secret, min_length)?;
    if secret != confirmation {
        return Err(KidModeError::invalid_secret("confirmation does not match"));
    }
    Ok(())
}
