//! Application jobs.
//!
//! Each job is an independent task spawned at startup:
//!
//! - [`crawler`]: the indexing nodes, the metadata sink and the manager loop
//!   that fans observations into metadata exchanges.
//! - [`results_logger`]: the built-in consumer of the output stream.
pub mod crawler;
pub mod results_logger;
