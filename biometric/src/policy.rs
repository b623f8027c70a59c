//! Per-attempt authentication policy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::authenticator::{AuthenticatorClass, AuthenticatorSet};

/// Opaque handle to a cryptographic operation whose completion is gated on authentication.
///
/// Platform backends map their own crypto objects onto handles; the orchestrator only
/// checks that a successful attempt attests the same handle the policy carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundOperationToken(u64);

impl BoundOperationToken {
    /// Wraps a platform handle.
    #[must_use]
    pub const fn new(handle: u64) -> Self {
        Self(handle)
    }

    /// The platform handle.
    #[must_use]
    pub const fn handle(self) -> u64 {
        self.0
    }
}

/// User facing prompt text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptText {
    /// Prompt title. Must not be blank.
    pub title: String,
    /// Prompt subtitle.
    pub subtitle: String,
    /// Longer description.
    pub description: String,
    /// Label of the button shown instead of the credential fallback.
    pub negative_button: Option<String>,
}

impl Default for PromptText {
    fn default() -> Self {
        Self {
            title: "Biometric Authentication".into(),
            subtitle: "Enter biometric credentials to proceed.".into(),
            description: "Input your Fingerprint or FaceID to ensure it's you!".into(),
            negative_button: Some("Cancel".into()),
        }
    }
}

/// Reasons a policy is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// No authenticator class was allowed.
    #[error("policy allows no authenticator class")]
    NoAuthenticators,
    /// The prompt title is blank.
    #[error("prompt title must not be empty")]
    EmptyTitle,
    /// The fallback flag disagrees with whether the device credential is allowed.
    #[error("fallback credential flag ({allow_fallback}) disagrees with allowed authenticators")]
    FallbackMismatch {
        /// The requested fallback flag.
        allow_fallback: bool,
    },
    /// Without a credential fallback the prompt needs a negative button.
    #[error("a negative button label is required when the credential fallback is disabled")]
    MissingNegativeButton,
    /// A bound operation needs a biometric authenticator.
    #[error("a bound operation requires a biometric authenticator, not the device credential alone")]
    CredentialOnlyBinding,
}

/// A validated authentication policy for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationPolicy {
    allowed: AuthenticatorSet,
    allow_fallback_credential: bool,
    prompt: PromptText,
    bound_operation_token: Option<BoundOperationToken>,
}

impl AuthenticationPolicy {
    /// Starts a policy for `allowed`.
    ///
    /// The fallback flag defaults to whether the device credential is allowed.
    #[must_use]
    pub fn builder(allowed: AuthenticatorSet) -> PolicyBuilder {
        PolicyBuilder::new(allowed)
    }

    /// Builds and validates a policy in one call.
    ///
    /// # Errors
    /// Returns a [`PolicyError`] if the combination is invalid; see [`PolicyBuilder::build`].
    pub fn build(
        allowed: AuthenticatorSet,
        allow_fallback_credential: bool,
        prompt: PromptText,
        bound_operation_token: Option<BoundOperationToken>,
    ) -> Result<Self, PolicyError> {
        let mut builder = Self::builder(allowed)
            .allow_fallback_credential(allow_fallback_credential)
            .prompt(prompt);
        if let Some(token) = bound_operation_token {
            builder = builder.bind(token);
        }
        builder.build()
    }

    /// The classes that may satisfy this attempt.
    #[must_use]
    pub const fn allowed(&self) -> AuthenticatorSet {
        self.allowed
    }

    /// Whether the device credential may be used instead of a biometric.
    #[must_use]
    pub const fn allow_fallback_credential(&self) -> bool {
        self.allow_fallback_credential
    }

    /// The prompt text.
    #[must_use]
    pub const fn prompt(&self) -> &PromptText {
        &self.prompt
    }

    /// The bound operation, if any.
    #[must_use]
    pub const fn bound_operation_token(&self) -> Option<BoundOperationToken> {
        self.bound_operation_token
    }

    /// Whether a success through `class` satisfies this policy.
    #[must_use]
    pub const fn permits(&self, class: AuthenticatorClass) -> bool {
        self.allowed.contains(class)
    }
}

/// Builder for [`AuthenticationPolicy`].
#[derive(Debug, Clone)]
pub struct PolicyBuilder {
    allowed: AuthenticatorSet,
    allow_fallback_credential: bool,
    prompt: PromptText,
    bound_operation_token: Option<BoundOperationToken>,
    credential_binding: bool,
}

impl PolicyBuilder {
    fn new(allowed: AuthenticatorSet) -> Self {
        Self {
            allowed,
            allow_fallback_credential: allowed.contains(AuthenticatorClass::DeviceCredential),
            prompt: PromptText::default(),
            bound_operation_token: None,
            credential_binding: false,
        }
    }

    /// Replaces the allowed classes. Does not touch the fallback flag.
    #[must_use]
    pub const fn allowed(mut self, allowed: AuthenticatorSet) -> Self {
        self.allowed = allowed;
        self
    }

    /// Sets whether the device credential may be used.
    #[must_use]
    pub const fn allow_fallback_credential(mut self, allow: bool) -> Self {
        self.allow_fallback_credential = allow;
        self
    }

    /// Replaces all prompt text.
    #[must_use]
    pub fn prompt(mut self, prompt: PromptText) -> Self {
        self.prompt = prompt;
        self
    }

    /// Sets the prompt title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.prompt.title = title.into();
        self
    }

    /// Sets the prompt subtitle.
    #[must_use]
    pub fn subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.prompt.subtitle = subtitle.into();
        self
    }

    /// Sets the prompt description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.prompt.description = description.into();
        self
    }

    /// Sets the negative button label.
    #[must_use]
    pub fn negative_button(mut self, label: impl Into<String>) -> Self {
        self.prompt.negative_button = Some(label.into());
        self
    }

    /// Binds the attempt to a cryptographic operation.
    #[must_use]
    pub const fn bind(mut self, token: BoundOperationToken) -> Self {
        self.bound_operation_token = Some(token);
        self
    }

    /// Permits binding an operation to the device credential alone.
    ///
    /// Off unless the platform profile enables it.
    #[must_use]
    pub const fn permit_credential_binding(mut self, permit: bool) -> Self {
        self.credential_binding = permit;
        self
    }

    /// Validates and builds the policy.
    ///
    /// # Errors
    /// - [`PolicyError::NoAuthenticators`] if no class is allowed.
    /// - [`PolicyError::EmptyTitle`] if the title is blank.
    /// - [`PolicyError::FallbackMismatch`] if the fallback flag disagrees with whether
    ///   [`AuthenticatorClass::DeviceCredential`] is allowed.
    /// - [`PolicyError::MissingNegativeButton`] if there is neither a fallback nor a
    ///   negative button.
    /// - [`PolicyError::CredentialOnlyBinding`] if a bound operation would be satisfied by the
    ///   device credential alone and the profile does not permit that.
    pub fn build(self) -> Result<AuthenticationPolicy, PolicyError> {
        if self.allowed.is_empty() {
            return Err(PolicyError::NoAuthenticators);
        }
        if self.prompt.title.trim().is_empty() {
            return Err(PolicyError::EmptyTitle);
        }
        if self.allow_fallback_credential
            != self.allowed.contains(AuthenticatorClass::DeviceCredential)
        {
            return Err(PolicyError::FallbackMismatch {
                allow_fallback: self.allow_fallback_credential,
            });
        }
        if !self.allow_fallback_credential
            && self
                .prompt
                .negative_button
                .as_deref()
                .is_none_or(|label| label.trim().is_empty())
        {
            return Err(PolicyError::MissingNegativeButton);
        }
        if self.bound_operation_token.is_some()
            && !self.allowed.has_biometric()
            && !self.credential_binding
        {
            return Err(PolicyError::CredentialOnlyBinding);
        }

        Ok(AuthenticationPolicy {
            allowed: self.allowed,
            allow_fallback_credential: self.allow_fallback_credential,
            prompt: self.prompt,
            bound_operation_token: self.bound_operation_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AuthenticatorClass::{BiometricStrong, BiometricWeak, DeviceCredential};

    #[test]
    fn default_policy_for_strong_or_credential() {
        let policy = AuthenticationPolicy::builder(AuthenticatorSet::STRONG_OR_CREDENTIAL)
            .build()
            .unwrap();
        assert!(policy.allow_fallback_credential());
        assert_eq!(policy.prompt().title, "Biometric Authentication");
        assert!(policy.permits(DeviceCredential));
        assert!(!policy.permits(BiometricWeak));
    }

    #[test]
    fn rejects_credential_only_binding() {
        let result = AuthenticationPolicy::build(
            AuthenticatorSet::only(DeviceCredential),
            true,
            PromptText::default(),
            Some(BoundOperationToken::new(1)),
        );
        assert_eq!(result, Err(PolicyError::CredentialOnlyBinding));
    }

    #[test]
    fn credential_binding_when_permitted() {
        let policy = AuthenticationPolicy::builder(AuthenticatorSet::only(DeviceCredential))
            .bind(BoundOperationToken::new(9))
            .permit_credential_binding(true)
            .build()
            .unwrap();
        assert_eq!(policy.bound_operation_token(), Some(BoundOperationToken::new(9)));
        assert_eq!(policy.allowed(), AuthenticatorSet::only(DeviceCredential));
    }

    #[test]
    fn binding_with_a_biometric_is_accepted_unchanged() {
        let policy = AuthenticationPolicy::build(
            BiometricStrong | DeviceCredential,
            true,
            PromptText::default(),
            Some(BoundOperationToken::new(3)),
        )
        .unwrap();
        assert_eq!(policy.allowed(), BiometricStrong | DeviceCredential);
    }

    #[test]
    fn fallback_flag_must_match_allowed_classes() {
        let result = AuthenticationPolicy::builder(AuthenticatorSet::only(BiometricStrong))
            .allow_fallback_credential(true)
            .build();
        assert_eq!(result, Err(PolicyError::FallbackMismatch { allow_fallback: true }));

        let result = AuthenticationPolicy::builder(AuthenticatorSet::STRONG_OR_CREDENTIAL)
            .allow_fallback_credential(false)
            .build();
        assert_eq!(result, Err(PolicyError::FallbackMismatch { allow_fallback: false }));
    }

    #[test]
    fn biometric_only_needs_a_negative_button() {
        let prompt = PromptText {
            negative_button: None,
            ..PromptText::default()
        };
        let result = AuthenticationPolicy::build(
            AuthenticatorSet::only(BiometricStrong),
            false,
            prompt,
            None,
        );
        assert_eq!(result, Err(PolicyError::MissingNegativeButton));
    }

    #[test]
    fn rejects_empty_inputs() {
        assert_eq!(
            AuthenticationPolicy::builder(AuthenticatorSet::EMPTY).build(),
            Err(PolicyError::NoAuthenticators)
        );
        assert_eq!(
            AuthenticationPolicy::builder(AuthenticatorSet::STRONG_OR_CREDENTIAL)
                .title("  ")
                .build(),
            Err(PolicyError::EmptyTitle)
        );
    }
}
