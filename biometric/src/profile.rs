//! Platform capability profiles.
//!
//! Which authenticator classes a platform can combine, whether it offers a credential
//! fallback and which enrollment screen it has all depend on the platform version. Those
//! differences live in one lookup table, resolved once when the manager is created.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::authenticator::{AuthenticatorClass, AuthenticatorSet};
use crate::enrollment::EnrollmentScreen;
use crate::policy::{AuthenticationPolicy, PolicyBuilder, PromptText};

/// Default policy template and platform rules for one platform version range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCapabilityProfile {
    /// Classes a default policy allows.
    pub allowed: AuthenticatorSet,
    /// Whether a default policy offers the device credential fallback.
    pub allow_fallback_credential: bool,
    /// Where enrollment is routed.
    pub enrollment_screen: EnrollmentScreen,
    /// Whether a bound operation may be satisfied by the device credential alone.
    #[serde(default)]
    pub allow_credential_bound_operations: bool,
    /// Default prompt text.
    #[serde(default)]
    pub prompt: PromptText,
}

impl PlatformCapabilityProfile {
    /// Resolves the built-in profile for platform API `level`.
    #[must_use]
    pub fn for_level(level: u32) -> Self {
        ProfileTable::builtin().resolve(level).clone()
    }

    /// Profile for desktop backends, which have a single enrollment entry point.
    #[must_use]
    pub fn desktop() -> Self {
        Self {
            allowed: AuthenticatorSet::STRONG_OR_CREDENTIAL,
            allow_fallback_credential: true,
            enrollment_screen: EnrollmentScreen::SecuritySettings,
            allow_credential_bound_operations: false,
            prompt: PromptText::default(),
        }
    }

    /// A policy builder seeded with this profile's defaults and binding rule.
    #[must_use]
    pub fn policy(&self) -> PolicyBuilder {
        AuthenticationPolicy::builder(self.allowed)
            .allow_fallback_credential(self.allow_fallback_credential)
            .prompt(self.prompt.clone())
            .permit_credential_binding(self.allow_credential_bound_operations)
    }
}

/// One row of a [`ProfileTable`]: the profile for levels `min_level..=max_level`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEntry {
    /// Lowest level covered.
    pub min_level: u32,
    /// Highest level covered; open ended when absent.
    #[serde(default)]
    pub max_level: Option<u32>,
    /// The profile.
    pub profile: PlatformCapabilityProfile,
}

impl ProfileEntry {
    fn covers(&self, level: u32) -> bool {
        level >= self.min_level && self.max_level.is_none_or(|max| level <= max)
    }

    fn upper(&self) -> u32 {
        self.max_level.unwrap_or(u32::MAX)
    }
}

/// Errors loading a profile table.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// The JSON did not parse.
    #[error("invalid profile table: {0}")]
    Parse(#[from] serde_json::Error),
    /// The table has no rows.
    #[error("profile table is empty")]
    Empty,
    /// A row has its bounds reversed.
    #[error("profile range {min}..={max} is inverted")]
    Inverted {
        /// Lower bound.
        min: u32,
        /// Upper bound.
        max: u32,
    },
    /// Two rows cover the same level.
    #[error("profile ranges overlap at level {0}")]
    Overlap(u32),
}

/// Platform version ranges mapped to profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ProfileEntry>", into = "Vec<ProfileEntry>")]
pub struct ProfileTable {
    entries: Vec<ProfileEntry>,
}

impl TryFrom<Vec<ProfileEntry>> for ProfileTable {
    type Error = ProfileError;

    fn try_from(entries: Vec<ProfileEntry>) -> Result<Self, Self::Error> {
        Self::new(entries)
    }
}

impl From<ProfileTable> for Vec<ProfileEntry> {
    fn from(table: ProfileTable) -> Self {
        table.entries
    }
}

impl ProfileTable {
    /// Builds a table, checking that it is non-empty and its ranges are disjoint.
    ///
    /// # Errors
    /// Returns a [`ProfileError`] describing the first problem found.
    pub fn new(mut entries: Vec<ProfileEntry>) -> Result<Self, ProfileError> {
        if entries.is_empty() {
            return Err(ProfileError::Empty);
        }
        entries.sort_by_key(|entry| entry.min_level);

        for entry in &entries {
            match entry.max_level {
                Some(max) if max < entry.min_level => {
                    return Err(ProfileError::Inverted {
                        min: entry.min_level,
                        max,
                    });
                }
                _ => {}
            }
        }
        for pair in entries.windows(2) {
            if pair[1].min_level <= pair[0].upper() {
                return Err(ProfileError::Overlap(pair[1].min_level));
            }
        }

        Ok(Self { entries })
    }

    /// Parses and validates a JSON table.
    ///
    /// # Errors
    /// Returns [`ProfileError::Parse`] for malformed JSON, or a validation error.
    pub fn from_json(json: &str) -> Result<Self, ProfileError> {
        let entries: Vec<ProfileEntry> = serde_json::from_str(json)?;
        Self::new(entries)
    }

    /// The table for platform API levels: biometric enrollment with an authenticator hint from
    /// level 30, fingerprint enrollment at 28 and 29, security settings below that, and a
    /// credential fallback from level 23.
    #[must_use]
    pub fn builtin() -> Self {
        use AuthenticatorClass::{BiometricWeak, DeviceCredential};

        fn row(
            min_level: u32,
            max_level: Option<u32>,
            allowed: AuthenticatorSet,
            enrollment_screen: EnrollmentScreen,
        ) -> ProfileEntry {
            ProfileEntry {
                min_level,
                max_level,
                profile: PlatformCapabilityProfile {
                    allowed,
                    allow_fallback_credential: allowed.contains(DeviceCredential),
                    enrollment_screen,
                    allow_credential_bound_operations: false,
                    prompt: PromptText::default(),
                },
            }
        }

        Self {
            entries: vec![
                row(
                    0,
                    Some(22),
                    AuthenticatorSet::only(BiometricWeak),
                    EnrollmentScreen::SecuritySettings,
                ),
                row(
                    23,
                    Some(27),
                    BiometricWeak | DeviceCredential,
                    EnrollmentScreen::SecuritySettings,
                ),
                row(
                    28,
                    Some(29),
                    BiometricWeak | DeviceCredential,
                    EnrollmentScreen::FingerprintEnroll,
                ),
                row(
                    30,
                    None,
                    AuthenticatorSet::STRONG_OR_CREDENTIAL,
                    EnrollmentScreen::BiometricEnroll,
                ),
            ],
        }
    }

    /// The profile covering `level`.
    ///
    /// Levels outside every row fall back to the nearest row below, or the first row.
    #[must_use]
    pub fn resolve(&self, level: u32) -> &PlatformCapabilityProfile {
        let entry = self
            .entries
            .iter()
            .find(|entry| entry.covers(level))
            .or_else(|| {
                self.entries
                    .iter()
                    .rev()
                    .find(|entry| entry.min_level <= level)
            })
            .unwrap_or_else(|| &self.entries[0]);
        &entry.profile
    }

    /// The rows, sorted by lower bound.
    #[must_use]
    pub fn entries(&self) -> &[ProfileEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AuthenticatorClass::{BiometricWeak, DeviceCredential};

    #[test]
    fn builtin_table_by_level() {
        let modern = PlatformCapabilityProfile::for_level(34);
        assert_eq!(modern.allowed, AuthenticatorSet::STRONG_OR_CREDENTIAL);
        assert_eq!(modern.enrollment_screen, EnrollmentScreen::BiometricEnroll);

        let pie = PlatformCapabilityProfile::for_level(28);
        assert_eq!(pie.allowed, BiometricWeak | DeviceCredential);
        assert_eq!(pie.enrollment_screen, EnrollmentScreen::FingerprintEnroll);

        let marshmallow = PlatformCapabilityProfile::for_level(23);
        assert_eq!(marshmallow.enrollment_screen, EnrollmentScreen::SecuritySettings);
        assert!(marshmallow.allow_fallback_credential);

        let legacy = PlatformCapabilityProfile::for_level(21);
        assert!(!legacy.allow_fallback_credential);
    }

    #[test]
    fn builtin_templates_build() {
        for entry in ProfileTable::builtin().entries() {
            assert!(entry.profile.policy().build().is_ok(), "{entry:?}");
        }
        assert!(PlatformCapabilityProfile::desktop().policy().build().is_ok());
    }

    #[test]
    fn loads_json_table() {
        let json = r#"[
            {
                "min_level": 30,
                "profile": {
                    "allowed": ["biometric_strong", "device_credential"],
                    "allow_fallback_credential": true,
                    "enrollment_screen": "biometric_enroll",
                    "allow_credential_bound_operations": true
                }
            },
            {
                "min_level": 0,
                "max_level": 29,
                "profile": {
                    "allowed": ["biometric_weak"],
                    "allow_fallback_credential": false,
                    "enrollment_screen": "security_settings"
                }
            }
        ]"#;

        let table = ProfileTable::from_json(json).unwrap();
        assert_eq!(table.entries()[0].min_level, 0);
        assert!(table.resolve(31).allow_credential_bound_operations);
        assert_eq!(table.resolve(31).prompt, PromptText::default());
        assert_eq!(table.resolve(12).allowed, AuthenticatorSet::only(BiometricWeak));
    }

    #[test]
    fn rejects_bad_tables() {
        assert!(matches!(ProfileTable::from_json("[]"), Err(ProfileError::Empty)));
        assert!(matches!(ProfileTable::from_json("{"), Err(ProfileError::Parse(_))));

        let profile = PlatformCapabilityProfile::desktop();
        let overlapping = vec![
            ProfileEntry {
                min_level: 0,
                max_level: Some(10),
                profile: profile.clone(),
            },
            ProfileEntry {
                min_level: 10,
                max_level: None,
                profile: profile.clone(),
            },
        ];
        assert!(matches!(
            ProfileTable::new(overlapping),
            Err(ProfileError::Overlap(10))
        ));

        let inverted = vec![ProfileEntry {
            min_level: 5,
            max_level: Some(1),
            profile,
        }];
        assert!(matches!(
            ProfileTable::new(inverted),
            Err(ProfileError::Inverted { min: 5, max: 1 })
        ));
    }

    #[test]
    fn gaps_resolve_to_the_row_below() {
        let profile = PlatformCapabilityProfile::desktop();
        let mut high = profile.clone();
        high.allow_credential_bound_operations = true;
        let table = ProfileTable::new(vec![
            ProfileEntry {
                min_level: 10,
                max_level: Some(12),
                profile: profile.clone(),
            },
            ProfileEntry {
                min_level: 20,
                max_level: None,
                profile: high,
            },
        ])
        .unwrap();

        assert!(!table.resolve(15).allow_credential_bound_operations);
        assert!(table.resolve(25).allow_credential_bound_operations);
        assert_eq!(table.resolve(1), &profile);
    }
}
