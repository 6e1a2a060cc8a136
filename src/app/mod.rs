//! Application core: domain logic with no direct I/O.
//!
//! The service, its commands and events, and the port traits every
//! adapter implements. All hardware access goes through [`ports`], so
//! this layer is testable against mocks.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
