//! Setup for the application.
//!
//! Its main responsibility is to load the configuration, initialize logging
//! and build the domain [`Crawler`](crate::core::Crawler) the jobs run on.
pub mod app;
pub mod config;
pub mod jobs;
pub mod logging;
