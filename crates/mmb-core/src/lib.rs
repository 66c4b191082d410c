//! Core domain + farming loop for the MMBump bot.
//!
//! This crate is intentionally transport-agnostic. The remote API and the
//! Telegram web-app payload live behind ports (traits) implemented in adapter
//! crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod farming;
pub mod logging;
pub mod ports;
pub mod profile;
pub mod proxy;
pub mod timing;

pub use errors::{Error, Result};
