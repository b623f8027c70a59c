//! Authentication sessions.
//!
//! A session drives one attempt through
//! `Idle → PolicyBuilt → Submitted → {Succeeded | Cancelled | Errored}`. Oracle events
//! arrive on a channel and are applied to the state machine only when the caller polls
//! [`AuthenticationSession::next_event`], so every transition happens on the caller's
//! execution context. Cancellation may come from any thread.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_channel::{Receiver, Sender};
use futures::{FutureExt, Stream, pin_mut, select_biased, stream};

use crate::authenticator::AuthenticatorSet;
use crate::observer::{AuthEvent, AuthObserver};
use crate::oracle::{AttemptEvents, AuthenticatorOracle};
use crate::policy::{AuthenticationPolicy, BoundOperationToken};
use crate::result::{AuthenticationResult, codes};

/// Identifies a session within one manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session #{}", self.0)
    }
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Nothing configured yet.
    Idle,
    /// A validated policy is attached.
    PolicyBuilt,
    /// The attempt is with the oracle.
    Submitted,
    /// The attempt succeeded.
    Succeeded,
    /// The attempt was cancelled.
    Cancelled,
    /// The attempt failed with a hard error.
    Errored,
}

impl SessionState {
    /// Whether no further event can be delivered.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Cancelled | Self::Errored)
    }
}

/// The pure session state machine.
///
/// Events the machine accepts are queued in order and handed out by
/// [`next_event`](Self::next_event). Once a terminal event is accepted nothing else is.
#[derive(Debug)]
pub struct SessionMachine {
    state: SessionState,
    allowed: AuthenticatorSet,
    bound_operation_token: Option<BoundOperationToken>,
    outbox: VecDeque<AuthenticationResult>,
    terminal: Option<AuthenticationResult>,
    recoverable_failures: u32,
}

impl SessionMachine {
    /// A machine in [`SessionState::Idle`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SessionState::Idle,
            allowed: AuthenticatorSet::EMPTY,
            bound_operation_token: None,
            outbox: VecDeque::new(),
            terminal: None,
            recoverable_failures: 0,
        }
    }

    /// The current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// How many recoverable failures were accepted.
    #[must_use]
    pub const fn recoverable_failures(&self) -> u32 {
        self.recoverable_failures
    }

    /// The terminal event, once one was accepted.
    #[must_use]
    pub const fn terminal(&self) -> Option<&AuthenticationResult> {
        self.terminal.as_ref()
    }

    /// `Idle → PolicyBuilt`. Returns `false` in any other state.
    pub fn attach_policy(&mut self, policy: &AuthenticationPolicy) -> bool {
        if !matches!(self.state, SessionState::Idle) {
            return false;
        }
        self.allowed = policy.allowed();
        self.bound_operation_token = policy.bound_operation_token();
        self.state = SessionState::PolicyBuilt;
        true
    }

    /// `PolicyBuilt → Submitted`. Returns `false` in any other state.
    pub const fn submit(&mut self) -> bool {
        if !matches!(self.state, SessionState::PolicyBuilt) {
            return false;
        }
        self.state = SessionState::Submitted;
        true
    }

    /// Applies an oracle event.
    ///
    /// Returns `false`, leaving the machine untouched, unless the machine is
    /// [`SessionState::Submitted`]. A success through a class the policy did not allow, or
    /// one that does not attest the policy's bound operation, is turned into an error so that
    /// success never leaks past the policy.
    pub fn apply(&mut self, event: AuthenticationResult) -> bool {
        if !matches!(self.state, SessionState::Submitted) {
            return false;
        }

        let event = match event {
            AuthenticationResult::RecoverableFailure => {
                self.recoverable_failures = self.recoverable_failures.saturating_add(1);
                self.outbox.push_back(AuthenticationResult::RecoverableFailure);
                return true;
            }
            AuthenticationResult::Success {
                authenticated_via,
                bound_operation_token,
            } => {
                if !self.allowed.contains(authenticated_via) {
                    AuthenticationResult::orchestrator_error(
                        codes::AUTHENTICATOR_NOT_ALLOWED,
                        "authenticated through a class the policy does not allow",
                    )
                } else if self.bound_operation_token.is_some()
                    && bound_operation_token != self.bound_operation_token
                {
                    AuthenticationResult::orchestrator_error(
                        codes::UNATTESTED_BINDING,
                        "success did not attest the bound operation",
                    )
                } else {
                    AuthenticationResult::Success {
                        authenticated_via,
                        bound_operation_token: self.bound_operation_token,
                    }
                }
            }
            other => other,
        };

        self.finish(event);
        true
    }

    /// Moves any non-terminal machine to [`SessionState::Cancelled`].
    ///
    /// Returns `false`, and does nothing, if the machine already finished.
    pub fn cancel(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.finish(AuthenticationResult::UserCancelled);
        true
    }

    /// Takes the oldest accepted event not yet handed out.
    pub fn next_event(&mut self) -> Option<AuthenticationResult> {
        self.outbox.pop_front()
    }

    fn finish(&mut self, event: AuthenticationResult) {
        self.state = match event {
            AuthenticationResult::Success { .. } => SessionState::Succeeded,
            AuthenticationResult::UserCancelled => SessionState::Cancelled,
            AuthenticationResult::Error { .. } | AuthenticationResult::RecoverableFailure => {
                SessionState::Errored
            }
        };
        self.terminal = Some(event.clone());
        self.outbox.push_back(event);
    }
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// The single-session slot of a manager.
#[derive(Debug, Clone, Default)]
pub(crate) struct ActiveSlot(Arc<Mutex<Option<SessionId>>>);

impl ActiveSlot {
    fn lock(&self) -> MutexGuard<'_, Option<SessionId>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims the slot for `id` if it is free.
    pub(crate) fn try_acquire(&self, id: SessionId) -> bool {
        let mut slot = self.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(id);
        true
    }

    /// Frees the slot if `id` holds it.
    pub(crate) fn release(&self, id: SessionId) {
        let mut slot = self.lock();
        if *slot == Some(id) {
            *slot = None;
        }
    }

    pub(crate) fn current(&self) -> Option<SessionId> {
        *self.lock()
    }
}

#[derive(Debug)]
struct SessionShared {
    id: SessionId,
    machine: Mutex<SessionMachine>,
    events: Receiver<AuthenticationResult>,
    cancel_signal: Sender<()>,
    oracle: Arc<dyn AuthenticatorOracle>,
    slot: ActiveSlot,
}

impl SessionShared {
    fn lock(&self) -> MutexGuard<'_, SessionMachine> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel(&self) -> bool {
        let cancelled = self.lock().cancel();
        if cancelled {
            self.cancel_signal.close();
            self.events.close();
            // cancel_attempt is not tied to an attempt; hold the slot until it returns.
            self.oracle.cancel_attempt();
            self.slot.release(self.id);
        }
        cancelled
    }
}

/// A cloneable handle for observing and cancelling a session from anywhere.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    shared: Arc<SessionShared>,
}

impl SessionHandle {
    /// The session id.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.shared.lock().state()
    }

    /// Cancels the session.
    ///
    /// Resolves a live session to [`SessionState::Cancelled`] and returns `true`. Cancelling
    /// a session that already finished, including one cancelled before, does nothing and
    /// returns `false`.
    pub fn cancel(&self) -> bool {
        self.shared.cancel()
    }
}

/// One authentication attempt.
///
/// Oracle events are applied when the session is polled, so the session keeps the manager's
/// slot until its terminal event has been read through [`next_event`](Self::next_event),
/// [`wait`](Self::wait) or the stream, or until it is cancelled. Dropping a session that
/// has not finished cancels it.
#[derive(Debug)]
pub struct AuthenticationSession {
    shared: Arc<SessionShared>,
    cancelled: Receiver<()>,
    observer: Arc<dyn AuthObserver>,
}

impl AuthenticationSession {
    /// Builds the machine for `policy` and hands the attempt to `oracle`.
    pub(crate) fn submit(
        id: SessionId,
        policy: &AuthenticationPolicy,
        oracle: Arc<dyn AuthenticatorOracle>,
        slot: ActiveSlot,
        observer: Arc<dyn AuthObserver>,
    ) -> Self {
        let (sender, events) = async_channel::unbounded();
        let (cancel_signal, cancelled) = async_channel::bounded(1);

        let mut machine = SessionMachine::new();
        let ready = machine.attach_policy(policy) && machine.submit();
        debug_assert!(ready, "fresh machine must accept a policy");

        let shared = Arc::new(SessionShared {
            id,
            machine: Mutex::new(machine),
            events,
            cancel_signal,
            oracle: oracle.clone(),
            slot,
        });

        observer.on_event(&AuthEvent::SessionSubmitted { session: id });
        oracle.submit_attempt(policy, AttemptEvents::new(sender));

        Self {
            shared,
            cancelled,
            observer,
        }
    }

    /// The session id.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    /// A handle for cancelling from elsewhere.
    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shared: self.shared.clone(),
        }
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.shared.lock().state()
    }

    /// How many recoverable failures were delivered so far.
    #[must_use]
    pub fn recoverable_failures(&self) -> u32 {
        self.shared.lock().recoverable_failures()
    }

    /// Cancels the session; see [`SessionHandle::cancel`].
    pub fn cancel(&self) -> bool {
        self.shared.cancel()
    }

    /// Waits for the next event.
    ///
    /// Yields any number of [`AuthenticationResult::RecoverableFailure`]s, then exactly one
    /// terminal result, then `None` forever.
    pub async fn next_event(&mut self) -> Option<AuthenticationResult> {
        loop {
            let (queued, finished) = {
                let mut machine = self.shared.lock();
                (machine.next_event(), machine.state().is_terminal())
            };
            if let Some(result) = queued {
                self.observer.on_event(&AuthEvent::SessionEvent {
                    session: self.shared.id,
                    result: result.clone(),
                });
                return Some(result);
            }
            if finished {
                return None;
            }

            let received = {
                let recv = self.shared.events.recv().fuse();
                let cancelled = self.cancelled.recv().fuse();
                pin_mut!(recv, cancelled);
                select_biased! {
                    _ = cancelled => None,
                    result = recv => Some(result),
                }
            };

            match received {
                Some(Ok(result)) => self.accept(result),
                Some(Err(_)) => self.accept(AuthenticationResult::orchestrator_error(
                    codes::ORACLE_DISCONNECTED,
                    "authenticator released the attempt without a result",
                )),
                None => {}
            }
        }
    }

    /// Drives the session to its terminal result.
    pub async fn wait(mut self) -> AuthenticationResult {
        while let Some(result) = self.next_event().await {
            if result.is_terminal() {
                return result;
            }
        }
        self.shared
            .lock()
            .terminal()
            .cloned()
            .unwrap_or(AuthenticationResult::UserCancelled)
    }

    /// The session as a stream of events.
    pub fn into_events(self) -> impl Stream<Item = AuthenticationResult> {
        stream::unfold(self, |mut session| async move {
            session.next_event().await.map(|result| (result, session))
        })
    }

    fn accept(&self, result: AuthenticationResult) {
        let (accepted, finished) = {
            let mut machine = self.shared.lock();
            let accepted = machine.apply(result);
            (accepted, machine.state().is_terminal())
        };

        if !accepted {
            self.observer.on_event(&AuthEvent::LateEventDiscarded {
                session: self.shared.id,
            });
        }
        if finished {
            self.shared.events.close();
            self.shared.slot.release(self.shared.id);
        }
    }
}

impl Drop for AuthenticationSession {
    fn drop(&mut self) {
        self.shared.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authenticator::AuthenticatorClass::{BiometricStrong, DeviceCredential};

    fn submitted(policy: &AuthenticationPolicy) -> SessionMachine {
        let mut machine = SessionMachine::new();
        assert!(machine.attach_policy(policy));
        assert!(machine.submit());
        machine
    }

    fn drain(machine: &mut SessionMachine) -> Vec<AuthenticationResult> {
        std::iter::from_fn(|| machine.next_event()).collect()
    }

    fn success(via: crate::AuthenticatorClass) -> AuthenticationResult {
        AuthenticationResult::Success {
            authenticated_via: via,
            bound_operation_token: None,
        }
    }

    #[test]
    fn walks_the_happy_path() {
        let policy = AuthenticationPolicy::builder(BiometricStrong | DeviceCredential)
            .build()
            .unwrap();
        let mut machine = SessionMachine::new();
        assert_eq!(machine.state(), SessionState::Idle);
        assert!(!machine.submit());
        assert!(machine.attach_policy(&policy));
        assert_eq!(machine.state(), SessionState::PolicyBuilt);
        assert!(!machine.apply(AuthenticationResult::RecoverableFailure));
        assert!(machine.submit());

        assert!(machine.apply(AuthenticationResult::RecoverableFailure));
        assert_eq!(machine.state(), SessionState::Submitted);
        assert!(machine.apply(success(DeviceCredential)));
        assert_eq!(machine.state(), SessionState::Succeeded);
        assert_eq!(machine.recoverable_failures(), 1);
        assert_eq!(
            drain(&mut machine),
            vec![AuthenticationResult::RecoverableFailure, success(DeviceCredential)]
        );
    }

    #[test]
    fn nothing_is_accepted_after_a_terminal_event() {
        let policy = AuthenticationPolicy::builder(BiometricStrong | DeviceCredential)
            .build()
            .unwrap();
        let late = [
            success(BiometricStrong),
            AuthenticationResult::RecoverableFailure,
            AuthenticationResult::UserCancelled,
            AuthenticationResult::Error {
                code: codes::LOCKOUT,
                message: "locked".into(),
            },
        ];

        for first in late.clone() {
            let mut machine = submitted(&policy);
            let first_terminal = first.is_terminal();
            assert!(machine.apply(first));
            if !first_terminal {
                assert!(machine.cancel());
            }
            for event in late.clone() {
                assert!(!machine.apply(event));
            }
            assert!(!machine.cancel());

            let delivered = drain(&mut machine);
            assert_eq!(delivered.iter().filter(|event| event.is_terminal()).count(), 1);
            assert!(delivered.last().unwrap().is_terminal());
        }
    }

    #[test]
    fn success_outside_the_policy_is_an_error() {
        let policy = AuthenticationPolicy::builder(AuthenticatorSet::only(BiometricStrong))
            .allow_fallback_credential(false)
            .build()
            .unwrap();
        let mut machine = submitted(&policy);
        assert!(machine.apply(success(DeviceCredential)));
        assert_eq!(machine.state(), SessionState::Errored);
        assert!(matches!(
            machine.next_event(),
            Some(AuthenticationResult::Error {
                code: codes::AUTHENTICATOR_NOT_ALLOWED,
                ..
            })
        ));
    }

    #[test]
    fn bound_operation_must_be_attested() {
        let token = BoundOperationToken::new(77);
        let policy = AuthenticationPolicy::builder(BiometricStrong | DeviceCredential)
            .bind(token)
            .build()
            .unwrap();

        let mut missing = submitted(&policy);
        missing.apply(success(BiometricStrong));
        assert!(matches!(
            missing.next_event(),
            Some(AuthenticationResult::Error {
                code: codes::UNATTESTED_BINDING,
                ..
            })
        ));

        let mut attested = submitted(&policy);
        attested.apply(AuthenticationResult::Success {
            authenticated_via: BiometricStrong,
            bound_operation_token: Some(token),
        });
        assert_eq!(
            attested.next_event(),
            Some(AuthenticationResult::Success {
                authenticated_via: BiometricStrong,
                bound_operation_token: Some(token),
            })
        );
    }

    #[test]
    fn failure_count_saturates() {
        let policy = AuthenticationPolicy::builder(BiometricStrong | DeviceCredential)
            .build()
            .unwrap();
        let mut machine = submitted(&policy);
        machine.recoverable_failures = u32::MAX - 1;

        assert!(machine.apply(AuthenticationResult::RecoverableFailure));
        assert!(machine.apply(AuthenticationResult::RecoverableFailure));
        assert_eq!(machine.recoverable_failures(), u32::MAX);
        assert_eq!(machine.state(), SessionState::Submitted);
    }

    #[test]
    fn slot_holds_one_session() {
        let slot = ActiveSlot::default();
        assert!(slot.try_acquire(SessionId::new(1)));
        assert!(!slot.try_acquire(SessionId::new(2)));
        slot.release(SessionId::new(2));
        assert_eq!(slot.current(), Some(SessionId::new(1)));
        slot.release(SessionId::new(1));
        assert!(slot.try_acquire(SessionId::new(2)));
    }
}
