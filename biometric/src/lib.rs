//! Local authentication orchestration.
//!
//! This crate gates a sensitive operation behind the device's local authentication: a
//! biometric sensor or the device credential (PIN, pattern, password). It classifies what
//! the device can do, routes the user to enrollment when nothing is enrolled, and drives a
//! single authentication attempt through a strict state machine.
//!
//! The platform authenticator is an [`AuthenticatorOracle`]; enrollment screens are behind
//! an [`EnrollmentLauncher`]. [`AuthenticationManager::platform`] wires up the backend for
//! the current target.
//!
//! ```ignore
//! use gatekit_biometric::{AuthenticationManager, AuthenticatorSet, Readiness};
//!
//! let manager = AuthenticationManager::platform();
//! match manager.check(AuthenticatorSet::STRONG_OR_CREDENTIAL) {
//!     Readiness::Ready => {
//!         let policy = manager.policy().title("Unlock vault").build()?;
//!         let result = manager.start_session(&policy)?.wait().await;
//!         println!("{result}");
//!     }
//!     Readiness::PromptEnrollment(request) => {
//!         let resolution = manager.enroll(request).await?;
//!         println!("capability is now {}", resolution.capability);
//!     }
//!     Readiness::Unavailable(outcome) => println!("{outcome}"),
//! }
//! ```

#![warn(missing_docs)]

mod authenticator;
mod capability;
mod enrollment;
mod error;
mod manager;
mod observer;
mod oracle;
mod policy;
mod profile;
mod result;
mod session;
/// Platform-specific implementations.
mod sys;
pub mod testing;

pub use authenticator::{Assurance, AuthenticatorClass, AuthenticatorSet};
pub use capability::{CapabilityClassifier, CapabilityOutcome, RawCapability};
pub use enrollment::{
    EnrollmentError, EnrollmentIntent, EnrollmentLauncher, EnrollmentOutcome, EnrollmentRequest,
    EnrollmentResolution, EnrollmentScreen,
};
pub use error::{BiometricError, SessionError};
pub use manager::{AuthenticationManager, Readiness};
pub use observer::{AuthEvent, AuthObserver, ChannelObserver, LogObserver};
pub use oracle::{AttemptEvents, AuthenticatorOracle};
pub use policy::{AuthenticationPolicy, BoundOperationToken, PolicyBuilder, PolicyError, PromptText};
pub use profile::{PlatformCapabilityProfile, ProfileEntry, ProfileError, ProfileTable};
pub use result::{AuthenticationResult, codes};
pub use session::{AuthenticationSession, SessionHandle, SessionId, SessionMachine, SessionState};
