#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! REST AUP Plugin
//!
//! Delegates the acceptable usage policy to an external HTTP service:
//!
//! - `GET {base_url}/policy?username=` returns `{"code", "defaultText"}`
//! - `POST {base_url}?username=` records acceptance
//! - `GET {base_url}/status?username=` answers `202` when accepted, `403` when not
//!
//! ## Configuration
//!
//! ```yaml
//! plugins:
//!   rest_aup:
//!     base_url: "http://localhost:5544/aup"
//!     timeout_ms: 2000
//! ```

pub mod config;
pub mod domain;

pub use config::RestAupPluginConfig;
pub use domain::{RestAupError, Service};
