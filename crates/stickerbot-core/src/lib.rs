//! Core domain + application logic for the sticker bot.
//!
//! This crate is framework-agnostic. The chat transport, the vision backend
//! and speech synthesis live behind ports (traits) implemented in adapter
//! crates.

pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod groups;
pub mod handlers;
pub mod logging;
pub mod media;
pub mod messaging;
pub mod ports;
pub mod security;
pub mod sticker;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
