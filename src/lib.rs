//! Radiator valve node control core.
//!
//! Exposes the pure-logic modules for integration testing and the host
//! simulator. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod error;
pub mod node;
pub mod occupancy;
pub mod payload;
pub mod rng;
pub mod scheduler;
pub mod sensors;
pub mod stats;
pub mod user_schedule;
