pub mod merge;
pub mod pool;

pub use merge::MergeEngine;
pub use pool::{TaskHandle, TaskPool};
