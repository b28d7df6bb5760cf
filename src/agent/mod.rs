pub mod assistant;
pub mod system_prompt;

pub use assistant::{build_executor, Assistant};
