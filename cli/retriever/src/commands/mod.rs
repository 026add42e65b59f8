//! CLI command implementations.

pub mod download;
pub mod fetch;
pub mod ls;
pub mod reload;
pub mod search;
