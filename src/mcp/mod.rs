//! Tool and prompt surface over stateless JSON-RPC.

pub mod handler;
pub mod prompts;
pub mod protocol;
pub mod tools;

pub use handler::{dispatch, mcp_handler};
