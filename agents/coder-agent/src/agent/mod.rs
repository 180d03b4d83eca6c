//! Agent module
//!
//! The coder agent loop, thread memory, and launcher lifecycle state.

pub mod coder;
pub mod state;
pub mod threads;
