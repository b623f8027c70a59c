//! The boundary to the platform authentication subsystem.

use std::fmt;

use async_channel::Sender;
use futures::FutureExt;
use futures::future::{self, BoxFuture};
use log::debug;

use crate::authenticator::{AuthenticatorClass, AuthenticatorSet};
use crate::capability::RawCapability;
use crate::policy::{AuthenticationPolicy, BoundOperationToken};
use crate::result::AuthenticationResult;

/// The platform authenticator, treated as an opaque oracle.
///
/// Implementations wrap a platform API (Windows Hello, `BiometricPrompt`, `LocalAuthentication`)
/// or a scripted fake.
pub trait AuthenticatorOracle: Send + Sync + fmt::Debug {
    /// Reports whether the device can authenticate with any of `requested`.
    ///
    /// Must be a read-only query.
    fn query_capability(&self, requested: AuthenticatorSet) -> RawCapability;

    /// [`query_capability`](Self::query_capability) for async callers.
    ///
    /// Backends whose platform query is asynchronous override this to await it instead of
    /// blocking the caller.
    fn query_capability_async(&self, requested: AuthenticatorSet) -> BoxFuture<'_, RawCapability> {
        future::ready(self.query_capability(requested)).boxed()
    }

    /// Starts an attempt for `policy` and returns immediately.
    ///
    /// Results are delivered through `events`, from any thread, at any later time.
    fn submit_attempt(&self, policy: &AuthenticationPolicy, events: AttemptEvents);

    /// Asks the platform to dismiss the attempt currently on screen.
    fn cancel_attempt(&self) {}
}

/// The callback side of an attempt, handed to the oracle on submission.
///
/// Cloning is allowed; every clone feeds the same session, which keeps only the first
/// terminal event.
#[derive(Clone)]
pub struct AttemptEvents {
    sender: Sender<AuthenticationResult>,
}

impl AttemptEvents {
    pub(crate) const fn new(sender: Sender<AuthenticationResult>) -> Self {
        Self { sender }
    }

    /// Delivers a raw event.
    pub fn emit(&self, result: AuthenticationResult) {
        if let Err(err) = self.sender.try_send(result) {
            debug!("attempt already finished, dropping {}", err.into_inner());
        }
    }

    /// The attempt succeeded through `via`, attesting `token` if the policy carried one.
    pub fn succeeded(&self, via: AuthenticatorClass, token: Option<BoundOperationToken>) {
        self.emit(AuthenticationResult::Success {
            authenticated_via: via,
            bound_operation_token: token,
        });
    }

    /// The presented sample was rejected.
    pub fn failed(&self) {
        self.emit(AuthenticationResult::RecoverableFailure);
    }

    /// The platform reported an error code; cancellation codes are folded into cancel.
    pub fn error(&self, code: i32, message: impl Into<String>) {
        self.emit(AuthenticationResult::from_platform_error(code, message));
    }

    /// The attempt was cancelled.
    pub fn cancelled(&self) {
        self.emit(AuthenticationResult::UserCancelled);
    }

    /// Whether the session stopped listening.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl fmt::Debug for AttemptEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttemptEvents")
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}
