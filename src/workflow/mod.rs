pub mod task_flow;

pub use task_flow::{TaskFailure, TaskFlow, TaskOutcome};
