pub mod clock;
pub mod error;
pub mod expiration;
pub mod ids;
pub mod local_client;
pub mod oidc;
pub mod registry;
pub mod repo;
pub mod services;
pub mod session;
pub mod surrogate;
pub mod ticket;
pub mod trust;
pub mod validator;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::DomainError;
pub use local_client::SsoLocalClient;
