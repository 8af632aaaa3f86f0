//! Ski relay server library.
//!
//! Exposes the relay components for use in tests and binaries.

pub mod config;
pub mod protocol;
pub mod registry;
pub mod relay_loop;
pub mod router;
pub mod server;
pub mod session;
pub mod world;
pub mod ws;
