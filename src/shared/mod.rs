//! Modules with logic shared between the crawler subsystems.
pub mod bit_torrent;
