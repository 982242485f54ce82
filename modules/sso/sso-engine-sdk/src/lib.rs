//! SSO Engine SDK
//!
//! This crate provides the public contract of the SSO engine:
//!
//! - [`ServiceTicketValidatorClient`] - Public API trait for relying services
//! - [`CredentialResolverPluginClient`], [`SecondFactorPluginClient`],
//!   [`AupPluginClient`], [`SurrogateAuthorizationPluginClient`] - Plugin API
//!   traits for the external collaborators the engine consumes
//! - [`Principal`], [`Attributes`], [`Credential`], [`ServiceValidation`] - Models
//! - [`SsoError`] - Error types
//!
//! ## Usage
//!
//! ```ignore
//! use sso_engine_sdk::ServiceTicketValidatorClient;
//!
//! let validation = validator.validate("ST-1-abc", "https://app.example.org").await?;
//! println!("authenticated {}", validation.user);
//! ```

pub mod api;
pub mod error;
pub mod models;
pub mod plugin_api;

// Re-export main types at crate root
pub use api::ServiceTicketValidatorClient;
pub use error::SsoError;
pub use models::{
    AttributeValues, Attributes, AupTerms, AuthenticatedPrincipal, Credential, Principal,
    ServiceValidation, TrustedDeviceRecord, surrogate_attributes,
};
pub use plugin_api::{
    AupPluginClient, CredentialResolverPluginClient, SecondFactorPluginClient,
    SurrogateAuthorizationPluginClient,
};
