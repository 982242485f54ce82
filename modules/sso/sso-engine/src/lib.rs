//! SSO Engine
//!
//! Ticket registry and authentication session engine. Ticket issuance,
//! one-time validation, SSO reuse, logout, multifactor trust, surrogate
//! authentication, acceptable usage policy gating and OIDC code exchange
//! all operate on one [`domain::registry::TicketRegistry`].
//!
//! The engine is assembled by [`module::SsoEngine::new`] from a
//! [`config::SsoEngineConfig`] and the collaborator plugins, and exposes an
//! axum router through [`module::SsoEngine::router`].
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod api;
pub mod config;
pub mod domain;
pub mod infra;
pub mod module;

pub use config::SsoEngineConfig;
pub use module::{Collaborators, SsoEngine};
