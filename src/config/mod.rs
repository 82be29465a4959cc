//! Configuration Module
//!
//! Client settings and where they are loaded from.

pub mod client;
pub mod loader;

pub use client::ClientConfig;
pub use loader::ConfigLoader;
