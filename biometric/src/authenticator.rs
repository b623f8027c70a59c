//! Authenticator classes and the sets policies are built from.

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// A category of credential that can satisfy an authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticatorClass {
    /// A biometric that meets the platform's strong (class 3) requirements.
    BiometricStrong,
    /// A biometric that meets the platform's weak (class 2) requirements.
    BiometricWeak,
    /// The device's screen lock credential (PIN, pattern or password).
    DeviceCredential,
}

/// The assurance a successful authentication carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Assurance {
    /// Screen lock credential.
    Credential,
    /// Weak biometric.
    Weak,
    /// Strong biometric.
    Strong,
}

impl AuthenticatorClass {
    /// Every class, strongest biometric first.
    pub const ALL: [Self; 3] = [
        Self::BiometricStrong,
        Self::BiometricWeak,
        Self::DeviceCredential,
    ];

    const fn bit(self) -> u8 {
        match self {
            Self::BiometricStrong => 0b001,
            Self::BiometricWeak => 0b010,
            Self::DeviceCredential => 0b100,
        }
    }

    /// Returns `true` for the two biometric classes.
    #[must_use]
    pub const fn is_biometric(self) -> bool {
        matches!(self, Self::BiometricStrong | Self::BiometricWeak)
    }

    /// The assurance level of an authentication satisfied by this class.
    #[must_use]
    pub const fn assurance(self) -> Assurance {
        match self {
            Self::BiometricStrong => Assurance::Strong,
            Self::BiometricWeak => Assurance::Weak,
            Self::DeviceCredential => Assurance::Credential,
        }
    }
}

impl fmt::Display for AuthenticatorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BiometricStrong => write!(f, "strong biometric"),
            Self::BiometricWeak => write!(f, "weak biometric"),
            Self::DeviceCredential => write!(f, "device credential"),
        }
    }
}

/// A set of [`AuthenticatorClass`] values.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<AuthenticatorClass>", into = "Vec<AuthenticatorClass>")]
pub struct AuthenticatorSet(u8);

impl AuthenticatorSet {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// The set most callers query with: a strong biometric or the device credential.
    pub const STRONG_OR_CREDENTIAL: Self = Self(
        AuthenticatorClass::BiometricStrong.bit() | AuthenticatorClass::DeviceCredential.bit(),
    );

    /// A set holding a single class.
    #[must_use]
    pub const fn only(class: AuthenticatorClass) -> Self {
        Self(class.bit())
    }

    /// Returns a copy of this set with `class` added.
    #[must_use]
    pub const fn with(self, class: AuthenticatorClass) -> Self {
        Self(self.0 | class.bit())
    }

    /// Returns a copy of this set with `class` removed.
    #[must_use]
    pub const fn without(self, class: AuthenticatorClass) -> Self {
        Self(self.0 & !class.bit())
    }

    /// Whether `class` is a member.
    #[must_use]
    pub const fn contains(self, class: AuthenticatorClass) -> bool {
        self.0 & class.bit() != 0
    }

    /// Whether the set has no members.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether at least one biometric class is a member.
    #[must_use]
    pub const fn has_biometric(self) -> bool {
        self.contains(AuthenticatorClass::BiometricStrong)
            || self.contains(AuthenticatorClass::BiometricWeak)
    }

    /// Iterates over the members, strongest biometric first.
    pub fn iter(self) -> impl Iterator<Item = AuthenticatorClass> {
        AuthenticatorClass::ALL
            .into_iter()
            .filter(move |class| self.contains(*class))
    }
}

impl fmt::Debug for AuthenticatorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl From<AuthenticatorClass> for AuthenticatorSet {
    fn from(class: AuthenticatorClass) -> Self {
        Self::only(class)
    }
}

impl FromIterator<AuthenticatorClass> for AuthenticatorSet {
    fn from_iter<I: IntoIterator<Item = AuthenticatorClass>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

impl From<Vec<AuthenticatorClass>> for AuthenticatorSet {
    fn from(classes: Vec<AuthenticatorClass>) -> Self {
        classes.into_iter().collect()
    }
}

impl From<AuthenticatorSet> for Vec<AuthenticatorClass> {
    fn from(set: AuthenticatorSet) -> Self {
        set.iter().collect()
    }
}

impl BitOr for AuthenticatorClass {
    type Output = AuthenticatorSet;

    fn bitor(self, rhs: Self) -> AuthenticatorSet {
        AuthenticatorSet::only(self).with(rhs)
    }
}

impl BitOr<AuthenticatorClass> for AuthenticatorSet {
    type Output = Self;

    fn bitor(self, rhs: AuthenticatorClass) -> Self {
        self.with(rhs)
    }
}

impl BitOr for AuthenticatorSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_operations() {
        let set = AuthenticatorClass::BiometricStrong | AuthenticatorClass::DeviceCredential;
        assert_eq!(set, AuthenticatorSet::STRONG_OR_CREDENTIAL);
        assert!(set.has_biometric());
        assert!(!set.contains(AuthenticatorClass::BiometricWeak));

        let credential_only = set.without(AuthenticatorClass::BiometricStrong);
        assert!(!credential_only.has_biometric());
        assert_eq!(
            credential_only.iter().collect::<Vec<_>>(),
            vec![AuthenticatorClass::DeviceCredential]
        );
        assert!(credential_only.without(AuthenticatorClass::DeviceCredential).is_empty());
    }

    #[test]
    fn serializes_as_class_list() {
        let json = serde_json::to_string(&AuthenticatorSet::STRONG_OR_CREDENTIAL).unwrap();
        assert_eq!(json, r#"["biometric_strong","device_credential"]"#);

        let parsed: AuthenticatorSet = serde_json::from_str(r#"["biometric_weak"]"#).unwrap();
        assert_eq!(parsed, AuthenticatorSet::only(AuthenticatorClass::BiometricWeak));
    }

    #[test]
    fn assurance_orders_strong_above_credential() {
        assert!(AuthenticatorClass::BiometricStrong.assurance() > AuthenticatorClass::BiometricWeak.assurance());
        assert!(AuthenticatorClass::BiometricWeak.assurance() > AuthenticatorClass::DeviceCredential.assurance());
    }
}
