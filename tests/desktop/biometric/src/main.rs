use std::sync::Arc;

use gatekit_biometric::testing::{ScriptedLauncher, ScriptedOracle};
use gatekit_biometric::{
    AuthenticationManager, AuthenticationResult, AuthenticatorClass, AuthenticatorSet,
    ChannelObserver, EnrollmentOutcome, LogObserver, PlatformCapabilityProfile, RawCapability,
    Readiness,
};
use log::info;

const REQUESTED: AuthenticatorSet = AuthenticatorSet::STRONG_OR_CREDENTIAL;

#[tokio::main]
async fn main() {
    env_logger::init();

    println!("Checking platform authenticator...");
    let platform = AuthenticationManager::platform();
    let capability = platform.classify_async(REQUESTED).await;
    println!("Platform capability: {capability}");

    if capability.is_ready() && std::env::args().any(|arg| arg == "--prompt") {
        match platform.policy().title("Gatekit demo").build() {
            Ok(policy) => match platform.start_session(&policy) {
                Ok(session) => println!("Platform result: {}", session.wait().await),
                Err(e) => println!("Could not start: {e}"),
            },
            Err(e) => println!("Invalid policy: {e}"),
        }
    }

    println!("\nRunning scripted enrollment and authentication...");
    scripted().await;
}

async fn scripted() {
    let oracle = Arc::new(ScriptedOracle::new(RawCapability::NoneEnrolled));
    let launcher = ScriptedLauncher::new(EnrollmentOutcome::Completed)
        .enrolling(oracle.clone(), RawCapability::Success);
    let (observer, events) = ChannelObserver::new();
    let manager = AuthenticationManager::new(
        oracle.clone(),
        Arc::new(launcher),
        PlatformCapabilityProfile::for_level(34),
    )
    .with_observer(Arc::new(observer.forwarding_to(Arc::new(LogObserver))));

    if let Readiness::PromptEnrollment(request) = manager.check(REQUESTED) {
        println!("Nothing enrolled, opening {}", request.intent().settings_action());
        match manager.enroll(request).await {
            Ok(resolution) => println!(
                "Enrollment {:?}, capability is now {}",
                resolution.outcome, resolution.capability
            ),
            Err(e) => println!("Enrollment failed: {e}"),
        }
    }

    oracle.script([
        AuthenticationResult::RecoverableFailure,
        AuthenticationResult::Success {
            authenticated_via: AuthenticatorClass::BiometricStrong,
            bound_operation_token: None,
        },
    ]);

    let policy = match manager.policy().title("Unlock demo vault").build() {
        Ok(policy) => policy,
        Err(e) => {
            println!("Invalid policy: {e}");
            return;
        }
    };
    match manager.start_session(&policy) {
        Ok(mut session) => {
            while let Some(result) = session.next_event().await {
                println!("{}: {result}", session.id());
            }
            println!("Session ended in {:?}", session.state());
        }
        Err(e) => println!("Could not start: {e}"),
    }

    let observed = std::iter::from_fn(|| events.try_recv().ok()).count();
    info!("observer received {observed} events");
}
