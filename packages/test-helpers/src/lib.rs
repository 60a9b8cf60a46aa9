//! Helpers for testing the Torrust DHT crawler.
pub mod configuration;
pub mod random;
