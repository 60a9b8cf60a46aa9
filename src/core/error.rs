//! Error returned by the core `Crawler`.
//!
//! Error | Context | Description
//! ---|---|---
//! `InvalidCidr` | Setup | A `cidr_denylist` entry could not be parsed.
//! `InvalidCapacity` | Setup | A capacity setting was zero.
use thiserror::Error;

/// Configuration error raised while building the core `Crawler`. Setup
/// failures are fatal: the application refuses to start with a partially
/// applied policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid CIDR block in denylist: {cidr}")]
    InvalidCidr { cidr: String },

    #[error("capacity setting {setting} must not be zero")]
    InvalidCapacity { setting: &'static str },
}
