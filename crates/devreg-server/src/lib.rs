//! # devreg-server
//!
//! HTTP server library for the device warranty registry.
//!
//! This library provides the API handlers and state management for devreg.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod logging;
pub mod state;
