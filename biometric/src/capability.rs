//! Device capability classification.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::authenticator::AuthenticatorSet;
use crate::observer::{AuthEvent, AuthObserver};
use crate::oracle::AuthenticatorOracle;

/// What the oracle answered to a capability query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawCapability {
    /// The device can authenticate with the requested classes.
    Success,
    /// No authentication hardware is present.
    NoHardware,
    /// Hardware is present but currently unavailable.
    HardwareUnavailable,
    /// Hardware is present but nothing is enrolled.
    NoneEnrolled,
    /// The requested combination is not supported on this platform version.
    Unsupported,
    /// A security patch is required before biometrics may be used.
    SecurityUpdateRequired,
    /// The oracle itself could not tell.
    StatusUnknown,
    /// A code this crate does not know.
    Unrecognized(i32),
}

impl RawCapability {
    /// Platform manager code for [`RawCapability::Success`].
    pub const CODE_SUCCESS: i32 = 0;
    /// Platform manager code for [`RawCapability::StatusUnknown`].
    pub const CODE_STATUS_UNKNOWN: i32 = -1;
    /// Platform manager code for [`RawCapability::Unsupported`].
    pub const CODE_UNSUPPORTED: i32 = -2;
    /// Platform manager code for [`RawCapability::HardwareUnavailable`].
    pub const CODE_HW_UNAVAILABLE: i32 = 1;
    /// Platform manager code for [`RawCapability::NoneEnrolled`].
    pub const CODE_NONE_ENROLLED: i32 = 11;
    /// Platform manager code for [`RawCapability::NoHardware`].
    pub const CODE_NO_HARDWARE: i32 = 12;
    /// Platform manager code for [`RawCapability::SecurityUpdateRequired`].
    pub const CODE_SECURITY_UPDATE_REQUIRED: i32 = 15;

    /// Decodes a platform manager code.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            Self::CODE_SUCCESS => Self::Success,
            Self::CODE_STATUS_UNKNOWN => Self::StatusUnknown,
            Self::CODE_UNSUPPORTED => Self::Unsupported,
            Self::CODE_HW_UNAVAILABLE => Self::HardwareUnavailable,
            Self::CODE_NONE_ENROLLED => Self::NoneEnrolled,
            Self::CODE_NO_HARDWARE => Self::NoHardware,
            Self::CODE_SECURITY_UPDATE_REQUIRED => Self::SecurityUpdateRequired,
            other => Self::Unrecognized(other),
        }
    }
}

/// The semantic capability of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityOutcome {
    /// Authentication can be offered.
    Ready,
    /// No authentication hardware.
    NoHardware,
    /// Hardware is temporarily unavailable.
    HardwareUnavailable,
    /// Nothing is enrolled; fixable through enrollment.
    NotEnrolled,
    /// The requested classes are unsupported on this platform version.
    Unsupported,
    /// A security update is required first.
    SecurityUpdateRequired,
    /// The capability could not be determined.
    Unknown,
}

impl CapabilityOutcome {
    /// Maps a raw oracle answer. Total: anything unmapped is [`CapabilityOutcome::Unknown`].
    #[must_use]
    pub const fn from_raw(raw: RawCapability) -> Self {
        match raw {
            RawCapability::Success => Self::Ready,
            RawCapability::NoHardware => Self::NoHardware,
            RawCapability::HardwareUnavailable => Self::HardwareUnavailable,
            RawCapability::NoneEnrolled => Self::NotEnrolled,
            RawCapability::Unsupported => Self::Unsupported,
            RawCapability::SecurityUpdateRequired => Self::SecurityUpdateRequired,
            RawCapability::StatusUnknown | RawCapability::Unrecognized(_) => Self::Unknown,
        }
    }

    /// Whether an attempt may be offered.
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Whether the user can fix this by enrolling.
    #[must_use]
    pub const fn is_enrollable(self) -> bool {
        matches!(self, Self::NotEnrolled)
    }
}

impl fmt::Display for CapabilityOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Ready => "ready",
            Self::NoHardware => "no authentication hardware",
            Self::HardwareUnavailable => "authentication hardware unavailable",
            Self::NotEnrolled => "nothing enrolled",
            Self::Unsupported => "unsupported on this platform version",
            Self::SecurityUpdateRequired => "security update required",
            Self::Unknown => "authentication unavailable",
        };
        f.write_str(text)
    }
}

/// Classifies device capability by querying the oracle.
///
/// Holds no state of its own: every call asks the oracle again, since enrollment and
/// hardware state can change between calls.
#[derive(Debug, Clone)]
pub struct CapabilityClassifier {
    oracle: Arc<dyn AuthenticatorOracle>,
    observer: Arc<dyn AuthObserver>,
}

impl CapabilityClassifier {
    /// Creates a classifier over `oracle`, reporting to `observer`.
    pub fn new(oracle: Arc<dyn AuthenticatorOracle>, observer: Arc<dyn AuthObserver>) -> Self {
        Self { oracle, observer }
    }

    /// Classifies the device's ability to authenticate with any of `requested`.
    ///
    /// An empty set is answered with [`CapabilityOutcome::Unsupported`] without asking the oracle.
    pub fn classify(&self, requested: AuthenticatorSet) -> CapabilityOutcome {
        let raw = (!requested.is_empty()).then(|| self.oracle.query_capability(requested));
        self.resolve(requested, raw)
    }

    /// [`classify`](Self::classify) without blocking the calling task on the platform query.
    pub async fn classify_async(&self, requested: AuthenticatorSet) -> CapabilityOutcome {
        let raw = if requested.is_empty() {
            None
        } else {
            Some(self.oracle.query_capability_async(requested).await)
        };
        self.resolve(requested, raw)
    }

    fn resolve(&self, requested: AuthenticatorSet, raw: Option<RawCapability>) -> CapabilityOutcome {
        let outcome = match raw {
            None => CapabilityOutcome::Unsupported,
            Some(raw) => {
                if let RawCapability::Unrecognized(code) = raw {
                    self.observer
                        .on_event(&AuthEvent::ClassificationAmbiguous { code });
                }
                CapabilityOutcome::from_raw(raw)
            }
        };

        self.observer.on_event(&AuthEvent::CapabilityClassified { requested, outcome });
        outcome
    }

    /// Whether [`classify`](Self::classify) answers [`CapabilityOutcome::Ready`].
    pub fn is_ready(&self, requested: AuthenticatorSet) -> bool {
        self.classify(requested).is_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::ChannelObserver;
    use crate::testing::ScriptedOracle;

    fn classifier(raw: RawCapability) -> (CapabilityClassifier, Arc<ScriptedOracle>) {
        let oracle = Arc::new(ScriptedOracle::new(raw));
        let (observer, _events) = ChannelObserver::new();
        (
            CapabilityClassifier::new(oracle.clone(), Arc::new(observer)),
            oracle,
        )
    }

    #[test]
    fn maps_every_defined_raw_outcome() {
        let table = [
            (RawCapability::Success, CapabilityOutcome::Ready),
            (RawCapability::NoHardware, CapabilityOutcome::NoHardware),
            (RawCapability::HardwareUnavailable, CapabilityOutcome::HardwareUnavailable),
            (RawCapability::NoneEnrolled, CapabilityOutcome::NotEnrolled),
            (RawCapability::Unsupported, CapabilityOutcome::Unsupported),
            (RawCapability::SecurityUpdateRequired, CapabilityOutcome::SecurityUpdateRequired),
            (RawCapability::StatusUnknown, CapabilityOutcome::Unknown),
        ];

        for (raw, expected) in table {
            let (classifier, _) = classifier(raw);
            assert_eq!(classifier.classify(AuthenticatorSet::STRONG_OR_CREDENTIAL), expected);
        }
    }

    #[test]
    fn platform_codes_decode() {
        assert_eq!(RawCapability::from_code(0), RawCapability::Success);
        assert_eq!(RawCapability::from_code(11), RawCapability::NoneEnrolled);
        assert_eq!(RawCapability::from_code(12), RawCapability::NoHardware);
        assert_eq!(RawCapability::from_code(15), RawCapability::SecurityUpdateRequired);
        assert_eq!(RawCapability::from_code(-2), RawCapability::Unsupported);
        assert_eq!(RawCapability::from_code(42), RawCapability::Unrecognized(42));
    }

    #[test]
    fn unrecognized_code_is_unknown_and_reported() {
        let oracle = Arc::new(ScriptedOracle::new(RawCapability::from_code(99)));
        let (observer, events) = ChannelObserver::new();
        let classifier = CapabilityClassifier::new(oracle, Arc::new(observer));

        assert_eq!(
            classifier.classify(AuthenticatorSet::STRONG_OR_CREDENTIAL),
            CapabilityOutcome::Unknown
        );
        assert_eq!(
            events.try_recv().unwrap(),
            AuthEvent::ClassificationAmbiguous { code: 99 }
        );
    }

    #[test]
    fn is_ready_agrees_with_classify() {
        let raws = [
            RawCapability::Success,
            RawCapability::NoHardware,
            RawCapability::HardwareUnavailable,
            RawCapability::NoneEnrolled,
            RawCapability::Unsupported,
            RawCapability::SecurityUpdateRequired,
            RawCapability::StatusUnknown,
            RawCapability::Unrecognized(7),
        ];

        for raw in raws {
            let (classifier, _) = classifier(raw);
            let requested = AuthenticatorSet::STRONG_OR_CREDENTIAL;
            assert_eq!(
                classifier.is_ready(requested),
                classifier.classify(requested) == CapabilityOutcome::Ready,
                "{raw:?}"
            );
        }
    }

    #[test]
    fn queries_the_oracle_every_time() {
        let (classifier, oracle) = classifier(RawCapability::NoneEnrolled);
        let requested = AuthenticatorSet::STRONG_OR_CREDENTIAL;

        assert_eq!(classifier.classify(requested), CapabilityOutcome::NotEnrolled);
        oracle.set_capability(RawCapability::Success);
        assert_eq!(classifier.classify(requested), CapabilityOutcome::Ready);
        assert_eq!(oracle.queries(), 2);
    }

    #[tokio::test]
    async fn async_classification_matches() {
        let (classifier, oracle) = classifier(RawCapability::NoneEnrolled);
        let requested = AuthenticatorSet::STRONG_OR_CREDENTIAL;

        assert_eq!(classifier.classify_async(requested).await, CapabilityOutcome::NotEnrolled);
        oracle.set_capability(RawCapability::Unrecognized(3));
        assert_eq!(classifier.classify_async(requested).await, CapabilityOutcome::Unknown);
        assert_eq!(
            classifier.classify_async(AuthenticatorSet::EMPTY).await,
            CapabilityOutcome::Unsupported
        );
        assert_eq!(oracle.queries(), 2);
    }

    #[test]
    fn empty_request_is_unsupported_without_a_query() {
        let (classifier, oracle) = classifier(RawCapability::Success);
        assert_eq!(
            classifier.classify(AuthenticatorSet::EMPTY),
            CapabilityOutcome::Unsupported
        );
        assert_eq!(oracle.queries(), 0);
    }
}
