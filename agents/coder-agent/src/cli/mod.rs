//! CLI module
//!
//! Startup configuration captured from the process environment.

pub mod config;
