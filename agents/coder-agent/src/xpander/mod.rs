//! xpander module
//!
//! Control-plane client, remote agent handle, and the shared data model
//! for executions, tool calls, and chat transcripts.

pub mod agent;
pub mod client;
pub mod types;
