pub mod agent;
pub mod config;
pub mod error;
pub mod execution;
pub mod traits;
pub mod types;
pub mod workflow;

pub use error::{Result, WeftError};
