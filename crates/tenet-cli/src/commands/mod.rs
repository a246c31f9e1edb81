//! CLI command implementations.

pub mod config;
pub mod demo;
pub mod evaluate;
pub mod init;
pub mod validate;
