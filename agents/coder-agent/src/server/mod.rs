//! Server module
//!
//! The local execution listener bound on the launcher port.

pub mod http;
