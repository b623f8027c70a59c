//! # Gatekit
//!
//! Gate sensitive operations behind the device's local authentication.
//!
//! Gatekit classifies what the device can authenticate with, sends the user to enrollment
//! when nothing is enrolled, and drives one authentication attempt at a time through a
//! strict session state machine.
//!
//! ## Features
//!
//! - `biometric`: capability classification, policies, sessions and enrollment.
//!
//! Use the `full` feature to enable everything.
//!
//! ## Example
//!
//! ```toml
//! [dependencies]
//! gatekit = { version = "0.1", features = ["biometric"] }
//! ```
//!
//! ```rust,ignore
//! use gatekit::biometric::{AuthenticationManager, AuthenticatorSet};
//!
//! async fn unlock() {
//!     let manager = AuthenticationManager::platform();
//!     if manager.is_ready(AuthenticatorSet::STRONG_OR_CREDENTIAL) {
//!         let policy = manager.policy().title("Unlock").build().unwrap();
//!         let result = manager.start_session(&policy).unwrap().wait().await;
//!         println!("{result}");
//!     }
//! }
//! ```

#[cfg(feature = "biometric")]
pub use gatekit_biometric as biometric;
