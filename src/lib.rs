//! Geofenced site check-in.
//!
//! Loads project sites, measures how far the device is from the selected
//! one, and decides whether check-in is allowed.

pub mod checker;
pub mod config;
pub mod geo;
pub mod position;
pub mod server;
pub mod site;
