//! # Escrowd
//!
//! Library for the implementation of the escrowd coordinator.

pub mod chain;
pub mod cli;
pub mod config;
pub mod constants;
pub mod directory;
pub mod error;
pub mod funding;
pub mod identity;
pub mod lifecycle;
pub mod metrics;
pub mod notify;
pub mod release;
pub mod rpc;
pub mod serde;
pub mod settlement;
pub mod spawn;
pub mod storage;
pub mod types;
