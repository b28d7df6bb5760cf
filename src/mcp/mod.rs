pub mod client;

pub use client::{McpClient, McpError};
