pub mod actions;
pub mod condition;
mod handlers;
pub mod scheduler;
pub mod store;

mod executor;

pub use actions::LoggingDispatcher;
pub use executor::{RunOptions, WorkflowExecutor};
pub use store::{ExecutionStore, MemoryWorkflowStore};
