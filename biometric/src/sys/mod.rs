#[cfg(target_os = "windows")]
mod hello;
#[cfg(target_os = "windows")]
pub use hello::*;

#[cfg(not(target_os = "windows"))]
pub mod stub {
    use std::sync::Arc;

    use tokio::sync::oneshot;

    use crate::authenticator::AuthenticatorSet;
    use crate::capability::RawCapability;
    use crate::enrollment::{
        EnrollmentError, EnrollmentIntent, EnrollmentLauncher, EnrollmentOutcome,
    };
    use crate::oracle::{AttemptEvents, AuthenticatorOracle};
    use crate::policy::AuthenticationPolicy;
    use crate::profile::PlatformCapabilityProfile;
    use crate::result::codes;

    /// Oracle for targets without a supported authenticator.
    #[derive(Debug, Default)]
    pub struct UnsupportedOracle;

    impl AuthenticatorOracle for UnsupportedOracle {
        fn query_capability(&self, _requested: AuthenticatorSet) -> RawCapability {
            RawCapability::NoHardware
        }

        fn submit_attempt(&self, _policy: &AuthenticationPolicy, events: AttemptEvents) {
            events.error(codes::HW_NOT_PRESENT, "no authenticator on this platform");
        }
    }

    /// Launcher for targets without an enrollment screen.
    #[derive(Debug, Default)]
    pub struct UnsupportedLauncher;

    impl EnrollmentLauncher for UnsupportedLauncher {
        fn launch(
            &self,
            _intent: &EnrollmentIntent,
        ) -> Result<oneshot::Receiver<EnrollmentOutcome>, EnrollmentError> {
            Err(EnrollmentError::NotSupported)
        }
    }

    pub fn oracle() -> Arc<dyn AuthenticatorOracle> {
        Arc::new(UnsupportedOracle)
    }

    pub fn launcher() -> Arc<dyn EnrollmentLauncher> {
        Arc::new(UnsupportedLauncher)
    }

    pub fn profile() -> PlatformCapabilityProfile {
        PlatformCapabilityProfile::desktop()
    }
}
#[cfg(not(target_os = "windows"))]
pub use stub::*;
