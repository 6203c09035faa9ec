//! Admin HTTP views over the store

pub mod error;
pub mod server;
