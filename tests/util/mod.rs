use std::path::Path;

use tempfile::TempDir;
use tick_median::{
    config::{AppConfig, LogConfig, MainConfig},
    output::RESULT_FILE_NAME,
    test_utils::read_results,
};

pub use tick_median::test_utils::{write_raw, write_source};

/// 一次测试运行所需的输入/输出临时目录。
pub struct Workspace
{
    pub input: TempDir,
    pub output: TempDir,
}

impl Workspace
{
    pub fn new() -> Self
    {
        Self { input: tempfile::tempdir().unwrap(),
               output: tempfile::tempdir().unwrap() }
    }

    pub fn input(&self) -> &Path
    {
        self.input.path()
    }

    pub fn config(&self, masks: &[&str]) -> AppConfig
    {
        AppConfig { main: MainConfig { input: self.input.path().to_path_buf(),
                                       output: Some(self.output.path().to_path_buf()),
                                       filename_mask: masks.iter().map(|mask| mask.to_string()).collect(),
                                       threads: Some(4) },
                    log: LogConfig::default() }
    }

    pub fn results(&self) -> Vec<(u64, f64)>
    {
        read_results(&self.output.path().join(RESULT_FILE_NAME))
    }
}

/// 对 `prices` 逐个前缀求中位数（排序法），用于与在线计算结果对照。
pub fn prefix_medians(prices: &[f64]) -> Vec<f64>
{
    (1..=prices.len()).map(|len| {
                          let mut sorted = prices[..len].to_vec();
                          sorted.sort_by(f64::total_cmp);
                          let mid = len / 2;
                          if len % 2 == 0 {
                              (sorted[mid - 1] + sorted[mid]) / 2.0
                          }
                          else {
                              sorted[mid]
                          }
                      })
                      .collect()
}
