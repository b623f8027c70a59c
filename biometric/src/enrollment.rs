//! The enrollment round-trip.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::authenticator::AuthenticatorSet;
use crate::capability::CapabilityOutcome;

/// Which settings screen a profile routes enrollment to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentScreen {
    /// The biometric enrollment screen that accepts an allowed-authenticators hint.
    BiometricEnroll,
    /// The fingerprint enrollment screen.
    FingerprintEnroll,
    /// The general security settings screen.
    SecuritySettings,
}

/// Where to send the user to enroll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnrollmentIntent {
    /// Biometric enrollment, restricted to `allowed`.
    BiometricEnroll {
        /// The classes the enrollment should satisfy.
        allowed: AuthenticatorSet,
    },
    /// Fingerprint enrollment.
    FingerprintEnroll,
    /// Security settings.
    SecuritySettings,
}

impl EnrollmentIntent {
    /// The intent for `screen`, carrying `requested` where the screen accepts it.
    #[must_use]
    pub const fn for_screen(screen: EnrollmentScreen, requested: AuthenticatorSet) -> Self {
        match screen {
            EnrollmentScreen::BiometricEnroll => Self::BiometricEnroll { allowed: requested },
            EnrollmentScreen::FingerprintEnroll => Self::FingerprintEnroll,
            EnrollmentScreen::SecuritySettings => Self::SecuritySettings,
        }
    }

    /// The platform settings action to launch.
    #[must_use]
    pub const fn settings_action(&self) -> &'static str {
        match self {
            Self::BiometricEnroll { .. } => "android.settings.BIOMETRIC_ENROLL",
            Self::FingerprintEnroll => "android.settings.FINGERPRINT_ENROLL",
            Self::SecuritySettings => "android.settings.SECURITY_SETTINGS",
        }
    }
}

/// What the enrollment screen reported when it returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnrollmentOutcome {
    /// The screen finished normally.
    Completed,
    /// The user backed out.
    Cancelled,
    /// Anything else, including a launcher that never replied.
    Unknown,
}

impl EnrollmentOutcome {
    /// Activity result code for a normal finish.
    pub const RESULT_OK: i32 = -1;
    /// Activity result code for a cancel.
    pub const RESULT_CANCELED: i32 = 0;

    /// Decodes an activity result code.
    #[must_use]
    pub const fn from_result_code(code: i32) -> Self {
        match code {
            Self::RESULT_OK => Self::Completed,
            Self::RESULT_CANCELED => Self::Cancelled,
            _ => Self::Unknown,
        }
    }
}

/// Errors launching enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrollmentError {
    /// This platform has no enrollment screen to launch.
    #[error("enrollment is not supported on this platform")]
    NotSupported,
    /// The platform failed to launch the screen.
    #[error("platform error: {0}")]
    Platform(String),
}

/// Launches the external enrollment UI.
pub trait EnrollmentLauncher: Send + Sync + fmt::Debug {
    /// Opens `intent` and returns a receiver for its outcome.
    ///
    /// The launcher answers on the receiver when the screen returns; dropping the sender
    /// instead is read as [`EnrollmentOutcome::Unknown`].
    ///
    /// # Errors
    /// Returns an [`EnrollmentError`] if the screen cannot be opened.
    fn launch(
        &self,
        intent: &EnrollmentIntent,
    ) -> Result<oneshot::Receiver<EnrollmentOutcome>, EnrollmentError>;
}

/// A pending enrollment, handed out when the device reports nothing enrolled.
///
/// Consumed by [`AuthenticationManager::enroll`](crate::AuthenticationManager::enroll), which
/// re-classifies once the round-trip returns, so a stale classification cannot cross it.
#[derive(Debug, PartialEq, Eq)]
pub struct EnrollmentRequest {
    requested: AuthenticatorSet,
    intent: EnrollmentIntent,
}

impl EnrollmentRequest {
    pub(crate) const fn new(requested: AuthenticatorSet, intent: EnrollmentIntent) -> Self {
        Self { requested, intent }
    }

    /// The classes the caller asked about.
    #[must_use]
    pub const fn requested(&self) -> AuthenticatorSet {
        self.requested
    }

    /// Where to send the user.
    #[must_use]
    pub const fn intent(&self) -> &EnrollmentIntent {
        &self.intent
    }
}

/// The result of an enrollment round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollmentResolution {
    /// What the enrollment screen reported.
    pub outcome: EnrollmentOutcome,
    /// A classification taken after the screen returned.
    pub capability: CapabilityOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_codes() {
        assert_eq!(EnrollmentOutcome::from_result_code(-1), EnrollmentOutcome::Completed);
        assert_eq!(EnrollmentOutcome::from_result_code(0), EnrollmentOutcome::Cancelled);
        assert_eq!(EnrollmentOutcome::from_result_code(1), EnrollmentOutcome::Unknown);
    }

    #[test]
    fn biometric_enroll_carries_the_requested_classes() {
        let intent = EnrollmentIntent::for_screen(
            EnrollmentScreen::BiometricEnroll,
            AuthenticatorSet::STRONG_OR_CREDENTIAL,
        );
        assert_eq!(
            intent,
            EnrollmentIntent::BiometricEnroll {
                allowed: AuthenticatorSet::STRONG_OR_CREDENTIAL
            }
        );
        assert_eq!(intent.settings_action(), "android.settings.BIOMETRIC_ENROLL");
        assert_eq!(
            EnrollmentIntent::for_screen(
                EnrollmentScreen::SecuritySettings,
                AuthenticatorSet::STRONG_OR_CREDENTIAL
            )
            .settings_action(),
            "android.settings.SECURITY_SETTINGS"
        );
    }
}
