//! 多数据源行情 CSV 的流式归并与在线中位数计算。
//!
//! 输入目录下的每个 CSV 文件各自按 `receive_ts` 有序，`MergeEngine` 以 k 路归并把它们
//! 合成一条全局有序的记录流，`MedianCalculator` 逐条消费价格，每当中位数变化时由
//! `ResultWriter` 写出一行 `receive_ts;price_median`。

pub mod common;
pub mod config;
pub mod datafeed;
pub mod engine;
pub mod error;
pub mod output;
pub mod runner;
pub mod shutdown;
pub mod statistics;
pub mod test_utils;
pub mod tick_log;

pub use common::Record;
pub use config::AppConfig;
pub use engine::MergeEngine;
pub use error::MedianError;
pub use runner::{run, RunSummary};
pub use shutdown::ShutdownToken;
pub use statistics::MedianCalculator;
