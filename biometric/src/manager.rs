//! The orchestrator callers talk to.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::authenticator::AuthenticatorSet;
use crate::capability::{CapabilityClassifier, CapabilityOutcome};
use crate::enrollment::{
    EnrollmentError, EnrollmentIntent, EnrollmentLauncher, EnrollmentOutcome, EnrollmentRequest,
    EnrollmentResolution,
};
use crate::error::SessionError;
use crate::observer::{AuthEvent, AuthObserver, LogObserver};
use crate::oracle::AuthenticatorOracle;
use crate::policy::{AuthenticationPolicy, BoundOperationToken, PolicyBuilder, PolicyError, PromptText};
use crate::profile::PlatformCapabilityProfile;
use crate::session::{ActiveSlot, AuthenticationSession, SessionHandle, SessionId};
use crate::sys;

/// What the caller should do next, given the current capability.
#[derive(Debug, PartialEq, Eq)]
pub enum Readiness {
    /// Start a session.
    Ready,
    /// Nothing is enrolled; route the user to enrollment with this request.
    PromptEnrollment(EnrollmentRequest),
    /// Authentication cannot be offered; show a generic unavailable state.
    Unavailable(CapabilityOutcome),
}

/// Gates an operation behind local authentication.
///
/// Clones share the oracle and the single active-session slot.
#[derive(Debug, Clone)]
pub struct AuthenticationManager {
    classifier: CapabilityClassifier,
    oracle: Arc<dyn AuthenticatorOracle>,
    launcher: Arc<dyn EnrollmentLauncher>,
    profile: PlatformCapabilityProfile,
    observer: Arc<dyn AuthObserver>,
    slot: ActiveSlot,
    next_id: Arc<AtomicU64>,
}

impl AuthenticationManager {
    /// Creates a manager reporting to a [`LogObserver`].
    pub fn new(
        oracle: Arc<dyn AuthenticatorOracle>,
        launcher: Arc<dyn EnrollmentLauncher>,
        profile: PlatformCapabilityProfile,
    ) -> Self {
        let observer: Arc<dyn AuthObserver> = Arc::new(LogObserver);
        Self {
            classifier: CapabilityClassifier::new(oracle.clone(), observer.clone()),
            oracle,
            launcher,
            profile,
            observer,
            slot: ActiveSlot::default(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// A manager over this platform's authenticator and enrollment screen.
    #[must_use]
    pub fn platform() -> Self {
        Self::new(sys::oracle(), sys::launcher(), sys::profile())
    }

    /// Reports events to `observer` instead.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn AuthObserver>) -> Self {
        self.classifier = CapabilityClassifier::new(self.oracle.clone(), observer.clone());
        self.observer = observer;
        self
    }

    /// The resolved platform profile.
    #[must_use]
    pub const fn profile(&self) -> &PlatformCapabilityProfile {
        &self.profile
    }

    /// The capability classifier.
    #[must_use]
    pub const fn classifier(&self) -> &CapabilityClassifier {
        &self.classifier
    }

    /// Classifies the device's capability for `requested`; see [`CapabilityClassifier::classify`].
    pub fn classify(&self, requested: AuthenticatorSet) -> CapabilityOutcome {
        self.classifier.classify(requested)
    }

    /// Classifies without blocking the calling task; see [`CapabilityClassifier::classify_async`].
    pub async fn classify_async(&self, requested: AuthenticatorSet) -> CapabilityOutcome {
        self.classifier.classify_async(requested).await
    }

    /// Whether an attempt with `requested` can be offered right now.
    pub fn is_ready(&self, requested: AuthenticatorSet) -> bool {
        self.classifier.is_ready(requested)
    }

    /// Classifies and decides what the caller should do.
    ///
    /// Emits [`AuthEvent::PromptEnrollment`] when enrollment is the way forward.
    pub fn check(&self, requested: AuthenticatorSet) -> Readiness {
        match self.classify(requested) {
            CapabilityOutcome::Ready => Readiness::Ready,
            CapabilityOutcome::NotEnrolled => {
                Readiness::PromptEnrollment(self.enrollment_request(requested))
            }
            other => Readiness::Unavailable(other),
        }
    }

    /// A policy builder seeded from the platform profile.
    #[must_use]
    pub fn policy(&self) -> PolicyBuilder {
        self.profile.policy()
    }

    /// Builds a policy, applying the profile's rule for credential-bound operations.
    ///
    /// # Errors
    /// Returns a [`PolicyError`] for an invalid combination.
    pub fn build_policy(
        &self,
        allowed: AuthenticatorSet,
        allow_fallback_credential: bool,
        prompt: PromptText,
        bound_operation_token: Option<BoundOperationToken>,
    ) -> Result<AuthenticationPolicy, PolicyError> {
        let mut builder = self
            .profile
            .policy()
            .allowed(allowed)
            .allow_fallback_credential(allow_fallback_credential)
            .prompt(prompt);
        if let Some(token) = bound_operation_token {
            builder = builder.bind(token);
        }
        builder.build()
    }

    /// Starts a session for `policy`.
    ///
    /// The capability is classified fresh for the policy's classes, through the blocking
    /// [`classify`](Self::classify); a session is only submitted when it is
    /// [`CapabilityOutcome::Ready`].
    ///
    /// # Errors
    /// - [`SessionError::AlreadyActive`] while another session is live. A session stays live
    ///   until its terminal event is read or it is cancelled, even if the oracle has already
    ///   answered.
    /// - [`SessionError::EnrollmentRequired`] when nothing is enrolled; also emits
    ///   [`AuthEvent::PromptEnrollment`].
    /// - [`SessionError::Unavailable`] for any other non-ready capability.
    pub fn start_session(
        &self,
        policy: &AuthenticationPolicy,
    ) -> Result<AuthenticationSession, SessionError> {
        let id = SessionId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        if !self.slot.try_acquire(id) {
            return Err(SessionError::AlreadyActive);
        }

        match self.classify(policy.allowed()) {
            CapabilityOutcome::Ready => {}
            CapabilityOutcome::NotEnrolled => {
                self.slot.release(id);
                return Err(SessionError::EnrollmentRequired(
                    self.enrollment_request(policy.allowed()),
                ));
            }
            other => {
                self.slot.release(id);
                return Err(SessionError::Unavailable(other));
            }
        }

        Ok(AuthenticationSession::submit(
            id,
            policy,
            self.oracle.clone(),
            self.slot.clone(),
            self.observer.clone(),
        ))
    }

    /// Cancels the session behind `handle`. A no-op if it already finished.
    pub fn cancel_session(&self, handle: &SessionHandle) -> bool {
        handle.cancel()
    }

    /// The live session, if any.
    #[must_use]
    pub fn active_session(&self) -> Option<SessionId> {
        self.slot.current()
    }

    /// Runs the enrollment round-trip and classifies again once it returns.
    ///
    /// # Errors
    /// Returns an [`EnrollmentError`] if the enrollment screen cannot be launched.
    pub async fn enroll(
        &self,
        request: EnrollmentRequest,
    ) -> Result<EnrollmentResolution, EnrollmentError> {
        let reply = self.launcher.launch(request.intent())?;
        let outcome = reply.await.unwrap_or(EnrollmentOutcome::Unknown);
        let capability = self.classify_async(request.requested()).await;

        self.observer.on_event(&AuthEvent::EnrollmentFinished {
            outcome,
            capability,
        });
        Ok(EnrollmentResolution {
            outcome,
            capability,
        })
    }

    fn enrollment_request(&self, requested: AuthenticatorSet) -> EnrollmentRequest {
        let intent = EnrollmentIntent::for_screen(self.profile.enrollment_screen, requested);
        self.observer
            .on_event(&AuthEvent::PromptEnrollment { intent });
        EnrollmentRequest::new(requested, intent)
    }
}
