//! Scripted stand-ins for the platform authenticator and enrollment screen.
//!
//! Useful for exercising code that drives an [`AuthenticationManager`](crate::AuthenticationManager)
//! without a device.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::authenticator::AuthenticatorSet;
use crate::capability::RawCapability;
use crate::enrollment::{EnrollmentError, EnrollmentIntent, EnrollmentLauncher, EnrollmentOutcome};
use crate::oracle::{AttemptEvents, AuthenticatorOracle};
use crate::policy::AuthenticationPolicy;
use crate::result::AuthenticationResult;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An oracle answering from a script.
///
/// Events scripted with [`script`](Self::script) are delivered as soon as the next attempt
/// is submitted. The latest attempt stays open afterwards, so a test can keep feeding it
/// with [`deliver`](Self::deliver), including after it finished.
#[derive(Debug)]
pub struct ScriptedOracle {
    capability: Mutex<RawCapability>,
    scripts: Mutex<VecDeque<Vec<AuthenticationResult>>>,
    attempt: Mutex<Option<AttemptEvents>>,
    policies: Mutex<Vec<AuthenticationPolicy>>,
    queries: AtomicUsize,
    cancellations: AtomicUsize,
}

impl ScriptedOracle {
    /// An oracle answering capability queries with `capability`.
    #[must_use]
    pub const fn new(capability: RawCapability) -> Self {
        Self {
            capability: Mutex::new(capability),
            scripts: Mutex::new(VecDeque::new()),
            attempt: Mutex::new(None),
            policies: Mutex::new(Vec::new()),
            queries: AtomicUsize::new(0),
            cancellations: AtomicUsize::new(0),
        }
    }

    /// Changes the capability answer.
    pub fn set_capability(&self, capability: RawCapability) {
        *lock(&self.capability) = capability;
    }

    /// Queues events for the next submitted attempt.
    pub fn script(&self, events: impl IntoIterator<Item = AuthenticationResult>) {
        lock(&self.scripts).push_back(events.into_iter().collect());
    }

    /// Sends `event` to the latest attempt. Returns `false` if none was submitted.
    pub fn deliver(&self, event: AuthenticationResult) -> bool {
        match lock(&self.attempt).as_ref() {
            Some(events) => {
                events.emit(event);
                true
            }
            None => false,
        }
    }

    /// Forgets the latest attempt without sending a terminal event.
    pub fn release_attempt(&self) {
        lock(&self.attempt).take();
    }

    /// Whether the session behind the latest attempt still accepts events.
    pub fn attempt_open(&self) -> bool {
        lock(&self.attempt)
            .as_ref()
            .is_some_and(|events| !events.is_closed())
    }

    /// How many capability queries were made.
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// How many attempts were submitted.
    pub fn submissions(&self) -> usize {
        lock(&self.policies).len()
    }

    /// How many times the orchestrator asked to dismiss an attempt.
    pub fn cancellations(&self) -> usize {
        self.cancellations.load(Ordering::SeqCst)
    }

    /// The policy of the latest attempt.
    pub fn last_policy(&self) -> Option<AuthenticationPolicy> {
        lock(&self.policies).last().cloned()
    }
}

impl AuthenticatorOracle for ScriptedOracle {
    fn query_capability(&self, _requested: AuthenticatorSet) -> RawCapability {
        self.queries.fetch_add(1, Ordering::SeqCst);
        *lock(&self.capability)
    }

    fn submit_attempt(&self, policy: &AuthenticationPolicy, events: AttemptEvents) {
        lock(&self.policies).push(policy.clone());
        if let Some(script) = lock(&self.scripts).pop_front() {
            for event in script {
                events.emit(event);
            }
        }
        *lock(&self.attempt) = Some(events);
    }

    fn cancel_attempt(&self) {
        self.cancellations.fetch_add(1, Ordering::SeqCst);
        // Platforms echo a dismissal back as a cancel event.
        if let Some(events) = lock(&self.attempt).as_ref() {
            events.cancelled();
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Reply {
    Outcome(EnrollmentOutcome),
    Silent,
    Unsupported,
}

/// An enrollment screen with a fixed outcome.
#[derive(Debug)]
pub struct ScriptedLauncher {
    reply: Reply,
    enrolls: Option<(Arc<ScriptedOracle>, RawCapability)>,
    launched: Mutex<Vec<EnrollmentIntent>>,
}

impl ScriptedLauncher {
    /// A screen that returns `outcome`.
    #[must_use]
    pub const fn new(outcome: EnrollmentOutcome) -> Self {
        Self::with_reply(Reply::Outcome(outcome))
    }

    /// A screen that closes without reporting anything.
    #[must_use]
    pub const fn silent() -> Self {
        Self::with_reply(Reply::Silent)
    }

    /// A platform without an enrollment screen.
    #[must_use]
    pub const fn unsupported() -> Self {
        Self::with_reply(Reply::Unsupported)
    }

    const fn with_reply(reply: Reply) -> Self {
        Self {
            reply,
            enrolls: None,
            launched: Mutex::new(Vec::new()),
        }
    }

    /// On a completed enrollment, switches `oracle` to answer `capability`.
    #[must_use]
    pub fn enrolling(mut self, oracle: Arc<ScriptedOracle>, capability: RawCapability) -> Self {
        self.enrolls = Some((oracle, capability));
        self
    }

    /// The intents launched so far.
    pub fn launched(&self) -> Vec<EnrollmentIntent> {
        lock(&self.launched).clone()
    }
}

impl EnrollmentLauncher for ScriptedLauncher {
    fn launch(
        &self,
        intent: &EnrollmentIntent,
    ) -> Result<oneshot::Receiver<EnrollmentOutcome>, EnrollmentError> {
        let outcome = match self.reply {
            Reply::Unsupported => return Err(EnrollmentError::NotSupported),
            Reply::Silent => None,
            Reply::Outcome(outcome) => Some(outcome),
        };
        lock(&self.launched).push(*intent);

        if outcome == Some(EnrollmentOutcome::Completed) {
            if let Some((oracle, capability)) = &self.enrolls {
                oracle.set_capability(*capability);
            }
        }

        let (sender, receiver) = oneshot::channel();
        if let Some(outcome) = outcome {
            let _ = sender.send(outcome);
        }
        Ok(receiver)
    }
}
