//! Wire types shared between the ski relay server and its clients.
//!
//! The browser client consumes these through the TypeScript bindings that
//! `ts-rs` writes when this crate's tests run.

pub mod config;
pub mod protocol;
pub mod vec3;
