//! 一次完整运行：发现数据源、归并、计算中位数、写出变化。

pub mod summary;

use std::time::{Duration, Instant};

pub use summary::{RunSummary, TableBuilder};

use crate::{
    config::AppConfig,
    engine::{MergeEngine, TaskPool},
    error::MedianError,
    output::ResultWriter,
    shutdown::ShutdownToken,
    statistics::MedianCalculator,
    tick_log::{info, warn},
};

/// 进度日志的最小间隔
const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// 执行一次运行。
///
/// 输入目录不存在或不是目录、任务池或输出文件无法创建时返回错误，此时不会产生结果文件；
/// 没有任何可用记录时结果文件只有表头。`shutdown` 在每条记录之前检查，
/// 取消后停止处理，已写出的结果保留，运行仍视为成功（`interrupted = true`）。
pub fn run(config: &AppConfig, shutdown: &ShutdownToken) -> Result<RunSummary, MedianError>
{
    let started = Instant::now();
    let input = &config.main.input;
    let output_dir = config.output_dir();

    let pool = match config.main.threads {
        | Some(threads) => TaskPool::new(threads)?,
        | None => TaskPool::with_available_parallelism()?,
    };

    info!("[TickMedian] : input directory: {}", input.display());
    info!("[TickMedian] : output directory: {}", output_dir.display());
    if !config.main.filename_mask.is_empty() {
        info!("[TickMedian] : filename masks: {:?}", config.main.filename_mask);
    }
    info!("[TickMedian] : task pool threads: {}", pool.thread_count());

    let mut engine = MergeEngine::open(input, &config.main.filename_mask, &pool)?;
    let mut writer = ResultWriter::open(&output_dir)?;
    let mut median = MedianCalculator::new();
    let mut interrupted = false;
    let mut last_progress = Instant::now();

    loop {
        if shutdown.is_cancelled() {
            warn!("[TickMedian] : shutdown requested, stopping after {} records", engine.emitted());
            interrupted = true;
            break;
        }

        let record = match engine.next_record() {
            | Some(record) => record,
            | None => break,
        };

        median.add(record.price);
        if median.is_changed() {
            if let Some(value) = median.median() {
                writer.write(record.timestamp, value)?;
            }
        }

        // 每 4096 条记录检查一次时钟
        if engine.emitted() % 4096 == 0 && last_progress.elapsed() >= PROGRESS_INTERVAL {
            info!("[TickMedian] : processed {} records, {} median changes", engine.emitted(), writer.written_count());
            last_progress = Instant::now();
        }
    }

    let medians_written = writer.written_count();
    let output_path = writer.finish()?;

    let summary = RunSummary { sources_found: engine.source_count(),
                               sources_merged: engine.merged_source_count(),
                               records: engine.emitted(),
                               medians_written,
                               last_median: median.median(),
                               output_path,
                               interrupted,
                               elapsed: started.elapsed() };

    info!("[TickMedian] : processed {} records, wrote {} median changes to {}",
          summary.records,
          summary.medians_written,
          summary.output_path.display());
    Ok(summary)
}

#[cfg(test)]
mod tests
{
    use std::fs;

    use tempfile::tempdir;

    use super::*;
    use crate::{config::MainConfig, output::RESULT_FILE_NAME, test_utils::write_source};

    fn config_for(input: &std::path::Path, output: &std::path::Path) -> AppConfig
    {
        AppConfig { main: MainConfig { input: input.to_path_buf(),
                                       output: Some(output.to_path_buf()),
                                       filename_mask: Vec::new(),
                                       threads: Some(2) },
                    log: Default::default() }
    }

    #[test]
    fn writes_only_median_changes()
    {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        write_source(input.path(), "a.csv", &[(1, "5"), (3, "5"), (5, "10")]);
        write_source(input.path(), "b.csv", &[(2, "5"), (4, "10"), (6, "10")]);

        let summary = run(&config_for(input.path(), output.path()), &ShutdownToken::new()).unwrap();
        assert_eq!(summary.sources_found, 2);
        assert_eq!(summary.sources_merged, 2);
        assert_eq!(summary.records, 6);
        assert_eq!(summary.medians_written, 2);
        assert_eq!(summary.last_median, Some(7.5));
        assert!(!summary.interrupted);

        let content = fs::read_to_string(output.path().join(RESULT_FILE_NAME)).unwrap();
        assert_eq!(content, "receive_ts;price_median\n1;5.00000000\n6;7.50000000\n");
    }

    #[test]
    fn cancelled_token_stops_before_first_record()
    {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        write_source(input.path(), "a.csv", &[(1, "1"), (2, "2")]);

        let token = ShutdownToken::new();
        token.cancel();
        let summary = run(&config_for(input.path(), output.path()), &token).unwrap();
        assert!(summary.interrupted);
        assert_eq!(summary.records, 0);
        assert_eq!(fs::read_to_string(summary.output_path).unwrap(), "receive_ts;price_median\n");
    }

    #[test]
    fn missing_input_creates_no_output()
    {
        let dir = tempdir().unwrap();
        let output = dir.path().join("output");
        let result = run(&config_for(&dir.path().join("absent"), &output), &ShutdownToken::new());
        assert!(matches!(result, Err(MedianError::InputMissing(_))), "unexpected: {:?}", result);
        assert!(!output.exists());
    }
}
