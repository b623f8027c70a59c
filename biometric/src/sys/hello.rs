//! Windows Hello backend.

use std::sync::Arc;
use std::thread;

use futures::FutureExt;
use futures::future::BoxFuture;
use log::warn;
use tokio::sync::oneshot;
use windows::Foundation::Uri;
use windows::Security::Credentials::UI::{
    UserConsentVerificationResult, UserConsentVerifier, UserConsentVerifierAvailability,
};
use windows::System::Launcher;
use windows::core::HSTRING;

use crate::authenticator::{AuthenticatorClass, AuthenticatorSet};
use crate::capability::RawCapability;
use crate::enrollment::{EnrollmentError, EnrollmentIntent, EnrollmentLauncher, EnrollmentOutcome};
use crate::oracle::{AttemptEvents, AuthenticatorOracle};
use crate::policy::{AuthenticationPolicy, PromptText};
use crate::profile::PlatformCapabilityProfile;
use crate::result::codes;

const SIGN_IN_OPTIONS: &str = "ms-settings:signinoptions";

/// Oracle backed by `UserConsentVerifier`.
#[derive(Debug, Default)]
pub struct WindowsHelloOracle;

impl AuthenticatorOracle for WindowsHelloOracle {
    /// Blocks the calling thread on the WinRT query; async callers go through
    /// [`query_capability_async`](AuthenticatorOracle::query_capability_async).
    fn query_capability(&self, _requested: AuthenticatorSet) -> RawCapability {
        futures::executor::block_on(check_availability())
    }

    fn query_capability_async(&self, _requested: AuthenticatorSet) -> BoxFuture<'_, RawCapability> {
        check_availability().boxed()
    }

    fn submit_attempt(&self, policy: &AuthenticationPolicy, events: AttemptEvents) {
        let message = HSTRING::from(prompt_message(policy.prompt()));
        let via = reported_class(policy.allowed());

        thread::spawn(move || {
            let verdict = futures::executor::block_on(async {
                UserConsentVerifier::RequestVerificationAsync(&message)?.await
            });

            match verdict {
                // Windows Hello does not say whether a biometric or the PIN was used.
                Ok(UserConsentVerificationResult::Verified) => events.succeeded(via, None),
                Ok(UserConsentVerificationResult::Canceled) => events.cancelled(),
                Ok(UserConsentVerificationResult::DeviceNotPresent) => {
                    events.error(codes::HW_NOT_PRESENT, "Windows Hello device not present");
                }
                Ok(UserConsentVerificationResult::NotConfiguredForUser) => {
                    events.error(codes::NO_BIOMETRICS, "Windows Hello not configured");
                }
                Ok(UserConsentVerificationResult::DeviceBusy) => {
                    events.error(codes::HW_UNAVAILABLE, "Device busy");
                }
                Ok(UserConsentVerificationResult::DisabledByPolicy) => {
                    events.error(codes::HW_UNAVAILABLE, "Disabled by policy");
                }
                Ok(UserConsentVerificationResult::RetriesExhausted) => {
                    events.error(codes::LOCKOUT, "Retries exhausted");
                }
                Ok(other) => events.error(codes::VENDOR, format!("verification result {}", other.0)),
                Err(err) => events.error(codes::VENDOR, err.to_string()),
            }
        });
    }
}

async fn check_availability() -> RawCapability {
    let availability = match UserConsentVerifier::CheckAvailabilityAsync() {
        Ok(op) => op.await,
        Err(err) => Err(err),
    };

    match availability {
        Ok(UserConsentVerifierAvailability::Available) => RawCapability::Success,
        Ok(UserConsentVerifierAvailability::DeviceNotPresent) => RawCapability::NoHardware,
        Ok(UserConsentVerifierAvailability::NotConfiguredForUser) => RawCapability::NoneEnrolled,
        Ok(UserConsentVerifierAvailability::DeviceBusy) => RawCapability::HardwareUnavailable,
        Ok(UserConsentVerifierAvailability::DisabledByPolicy) => RawCapability::Unsupported,
        Ok(other) => RawCapability::Unrecognized(other.0),
        Err(err) => {
            warn!("CheckAvailabilityAsync failed: {err}");
            RawCapability::StatusUnknown
        }
    }
}

/// The weakest class the policy allows, since Windows Hello may have used any of them.
fn reported_class(allowed: AuthenticatorSet) -> AuthenticatorClass {
    allowed
        .iter()
        .last()
        .unwrap_or(AuthenticatorClass::DeviceCredential)
}

fn prompt_message(prompt: &PromptText) -> String {
    [&prompt.title, &prompt.subtitle, &prompt.description]
        .into_iter()
        .filter(|part| !part.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Opens the sign-in options page of the Settings app.
///
/// Settings never reports back, so the outcome is always [`EnrollmentOutcome::Unknown`].
#[derive(Debug, Default)]
pub struct SettingsLauncher;

impl EnrollmentLauncher for SettingsLauncher {
    fn launch(
        &self,
        _intent: &EnrollmentIntent,
    ) -> Result<oneshot::Receiver<EnrollmentOutcome>, EnrollmentError> {
        let uri = Uri::CreateUri(&HSTRING::from(SIGN_IN_OPTIONS))
            .map_err(|e| EnrollmentError::Platform(e.to_string()))?;
        let (sender, receiver) = oneshot::channel();

        thread::spawn(move || {
            let launched =
                futures::executor::block_on(async { Launcher::LaunchUriAsync(&uri)?.await });
            match launched {
                Ok(true) => {}
                Ok(false) => warn!("settings app refused {SIGN_IN_OPTIONS}"),
                Err(err) => warn!("failed to open {SIGN_IN_OPTIONS}: {err}"),
            }
            let _ = sender.send(EnrollmentOutcome::Unknown);
        });

        Ok(receiver)
    }
}

pub fn oracle() -> Arc<dyn AuthenticatorOracle> {
    Arc::new(WindowsHelloOracle)
}

pub fn launcher() -> Arc<dyn EnrollmentLauncher> {
    Arc::new(SettingsLauncher)
}

pub fn profile() -> PlatformCapabilityProfile {
    PlatformCapabilityProfile::desktop()
}
