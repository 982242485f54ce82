#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Static SSO Plugin
//!
//! Config-driven collaborators for the SSO engine, for development and
//! testing. A single [`Service`] implements every plugin trait:
//!
//! - **credentials**: password and passwordless accounts with attributes
//!   and an optional multifactor provider
//! - **second factor**: reusable one-time tokens and single-use scratch codes
//! - **surrogates**: which delegate may act as which target (`*` for any)
//! - **usage policy**: terms plus an in-memory acceptance store
//!
//! ## Configuration
//!
//! ```yaml
//! plugins:
//!   static:
//!     users:
//!       - username: casuser
//!         password: Mellon
//!         attributes:
//!           cn: ["CAS User"]
//!           mail: ["casuser@example.org"]
//!       - username: mfauser
//!         password: Mellon
//!         mfa_provider: mfa-gauth
//!         otp_tokens: ["123456"]
//!         scratch_codes: ["87654321"]
//!       - username: yubiuser
//!         passwordless: true
//!         mfa_provider: mfa-yubikey
//!         otp_tokens: ["cccccckdvvulgjvtkjdhtlrbjjctggdihuevikehtlil"]
//!     surrogates:
//!       casuser: ["user3"]
//!     aup:
//!       enabled: true
//!       code: screen.aup.policyterms
//!       default_text: "Use this service responsibly."
//! ```

pub mod config;
pub mod domain;

pub use config::StaticSsoPluginConfig;
pub use domain::Service;
