//! Shared types for the gasless dapp client.
//!
//! Connection state, relay request and task types, and the TOML schema
//! validation helpers used by every configurable implementation.

pub mod connection;
pub mod relay;
pub mod validation;

pub use alloy::primitives::{Address, Bytes};
pub use connection::*;
pub use relay::*;
pub use validation::*;
