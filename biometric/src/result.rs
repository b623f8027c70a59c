//! Outcomes of an authentication attempt.

use std::fmt;

use crate::authenticator::AuthenticatorClass;
use crate::policy::BoundOperationToken;

/// Error codes reported by platform prompts, plus the codes the orchestrator assigns itself.
pub mod codes {
    /// The hardware is unavailable.
    pub const HW_UNAVAILABLE: i32 = 1;
    /// The sensor could not process the current sample.
    pub const UNABLE_TO_PROCESS: i32 = 2;
    /// The attempt timed out.
    pub const TIMEOUT: i32 = 3;
    /// Not enough storage to complete the operation.
    pub const NO_SPACE: i32 = 4;
    /// The platform cancelled the attempt.
    pub const CANCELED: i32 = 5;
    /// Too many failed attempts; temporarily locked.
    pub const LOCKOUT: i32 = 7;
    /// Vendor specific failure.
    pub const VENDOR: i32 = 8;
    /// Too many lockouts; locked until the device credential is used.
    pub const LOCKOUT_PERMANENT: i32 = 9;
    /// The user cancelled the attempt.
    pub const USER_CANCELED: i32 = 10;
    /// Nothing is enrolled.
    pub const NO_BIOMETRICS: i32 = 11;
    /// No hardware present.
    pub const HW_NOT_PRESENT: i32 = 12;
    /// The user pressed the negative button.
    pub const NEGATIVE_BUTTON: i32 = 13;
    /// No device credential is set up.
    pub const NO_DEVICE_CREDENTIAL: i32 = 14;
    /// A security update is required.
    pub const SECURITY_UPDATE_REQUIRED: i32 = 15;

    /// The oracle released the attempt without a terminal event.
    pub const ORACLE_DISCONNECTED: i32 = -100;
    /// The oracle reported success without attesting the bound operation.
    pub const UNATTESTED_BINDING: i32 = -101;
    /// The oracle reported success through a class the policy did not allow.
    pub const AUTHENTICATOR_NOT_ALLOWED: i32 = -102;
}

/// A single event of an authentication attempt.
///
/// `RecoverableFailure` may repeat; the other three variants are terminal and a session
/// delivers at most one of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationResult {
    /// The attempt succeeded.
    Success {
        /// The class that satisfied the policy.
        authenticated_via: AuthenticatorClass,
        /// The bound operation the attempt attested, if the policy carried one.
        bound_operation_token: Option<BoundOperationToken>,
    },
    /// The presented sample was rejected; the attempt is still live.
    RecoverableFailure,
    /// The attempt ended with a hard error.
    Error {
        /// Platform or orchestrator error code, see [`codes`].
        code: i32,
        /// Human readable message from the platform.
        message: String,
    },
    /// The user or the system cancelled the attempt.
    UserCancelled,
}

impl AuthenticationResult {
    /// Maps a platform prompt error into a result.
    ///
    /// Cancellation codes become [`AuthenticationResult::UserCancelled`]; everything else is
    /// an [`AuthenticationResult::Error`] carrying the code verbatim.
    pub fn from_platform_error(code: i32, message: impl Into<String>) -> Self {
        match code {
            codes::CANCELED | codes::USER_CANCELED | codes::NEGATIVE_BUTTON => Self::UserCancelled,
            _ => Self::Error {
                code,
                message: message.into(),
            },
        }
    }

    /// Whether this event ends the attempt.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::RecoverableFailure)
    }

    /// Whether this is a success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Whether this is a lockout error. Lockouts are time bounded; retrying early can extend them.
    #[must_use]
    pub const fn is_lockout(&self) -> bool {
        matches!(
            self,
            Self::Error {
                code: codes::LOCKOUT | codes::LOCKOUT_PERMANENT,
                ..
            }
        )
    }

    pub(crate) fn orchestrator_error(code: i32, message: &str) -> Self {
        Self::Error {
            code,
            message: message.to_owned(),
        }
    }
}

impl fmt::Display for AuthenticationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success {
                authenticated_via, ..
            } => write!(f, "authenticated via {authenticated_via}"),
            Self::RecoverableFailure => write!(f, "not recognized, try again"),
            Self::Error { code, message } => write!(f, "authentication error {code}: {message}"),
            Self::UserCancelled => write!(f, "authentication cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_codes_become_user_cancelled() {
        for code in [codes::CANCELED, codes::USER_CANCELED, codes::NEGATIVE_BUTTON] {
            assert_eq!(
                AuthenticationResult::from_platform_error(code, "cancel"),
                AuthenticationResult::UserCancelled
            );
        }
    }

    #[test]
    fn other_codes_are_kept_verbatim() {
        let result = AuthenticationResult::from_platform_error(codes::LOCKOUT, "Too many attempts");
        assert!(result.is_lockout());
        assert!(result.is_terminal());
        assert_eq!(
            result,
            AuthenticationResult::Error {
                code: codes::LOCKOUT,
                message: "Too many attempts".into(),
            }
        );
        assert!(!AuthenticationResult::RecoverableFailure.is_terminal());
    }
}
