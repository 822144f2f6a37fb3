//! Azure Resource Manager client for the App Service resource types

pub mod auth;
pub mod client;
pub mod common;
pub mod error;
pub mod lro;
pub mod pool;
pub mod service_plans;
pub mod sites;
pub mod static_sites;

#[cfg(test)]
pub mod test_helpers;

pub use auth::{ClientSecretCredential, Credential};
pub use client::{ArmResponse, Client, PollerConfig, RetryConfig};
pub use error::ApiError;
pub use lro::Poller;
