pub mod client;
pub mod error;
pub mod service;

pub use error::RestAupError;
pub use service::Service;
