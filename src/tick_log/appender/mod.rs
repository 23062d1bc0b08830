pub mod file;

pub use file::{FileAppender, FileAppenderConfig, Period};
