pub mod runner;

pub use runner::{AgentRunner, RunOptions};
