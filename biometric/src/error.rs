use thiserror::Error;

use crate::capability::CapabilityOutcome;
use crate::enrollment::{EnrollmentError, EnrollmentRequest};
use crate::policy::PolicyError;
use crate::profile::ProfileError;

/// Reasons a session cannot start. Returned before anything is submitted to the oracle.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Another session is still live; retry once it finishes.
    #[error("an authentication session is already active")]
    AlreadyActive,
    /// Nothing is enrolled. Route the user to enrollment with the attached request.
    #[error("nothing is enrolled, enrollment required")]
    EnrollmentRequired(EnrollmentRequest),
    /// The device cannot authenticate with the policy's classes.
    #[error("authentication unavailable: {0}")]
    Unavailable(CapabilityOutcome),
}

/// Any error this crate returns.
#[derive(Debug, Error)]
pub enum BiometricError {
    /// Invalid policy.
    #[error(transparent)]
    Policy(#[from] PolicyError),
    /// Session could not start.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// Enrollment could not launch.
    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),
    /// Invalid profile table.
    #[error(transparent)]
    Profile(#[from] ProfileError),
}
