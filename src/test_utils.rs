// src/test_utils

use std::{
    fs,
    path::{Path, PathBuf},
};

/// 测试数据源默认使用的成交文件表头。
pub const TRADE_HEADER: &str = "receive_ts;exchange_ts;price;quantity;side";

/// 在 `dir` 下写入一个成交格式的 CSV 数据源，`rows` 为 `(receive_ts, price)`。
pub fn write_source(dir: &Path, file_name: &str, rows: &[(u64, &str)]) -> PathBuf
{
    let mut content = String::from(TRADE_HEADER);
    content.push('\n');
    for (timestamp, price) in rows {
        content.push_str(&format!("{};{};{};0.001;buy\n", timestamp, timestamp.saturating_sub(7), price));
    }
    write_raw(dir, file_name, &content)
}

/// 以原样内容写入文件，用于构造表头缺失、格式错误等场景。
pub fn write_raw(dir: &Path, file_name: &str, content: &str) -> PathBuf
{
    let path = dir.join(file_name);
    fs::write(&path, content).unwrap_or_else(|e| panic!("failed to write test source {}: {}", path.display(), e));
    path
}

/// 读取结果文件中的数据行 `(receive_ts, price_median)`，跳过表头。
pub fn read_results(path: &Path) -> Vec<(u64, f64)>
{
    let content = fs::read_to_string(path).unwrap_or_else(|e| panic!("failed to read results {}: {}", path.display(), e));
    content.lines()
           .skip(1)
           .filter(|line| !line.is_empty())
           .map(|line| {
               let (timestamp, median) = line.split_once(';').unwrap_or_else(|| panic!("malformed result line: {}", line));
               (timestamp.parse().unwrap_or_else(|_| panic!("bad timestamp: {}", line)), median.parse().unwrap_or_else(|_| panic!("bad median: {}", line)))
           })
           .collect()
}
