use std::{io, path::PathBuf};

use thiserror::Error;

/// 运行级错误。单个数据源的问题（无法打开、缺少必需列、格式错误的行）不会出现在这里，
/// 只记录日志并跳过对应的数据源或行。
#[derive(Error, Debug)]
pub enum MedianError
{
    #[error("[TickMedian] : input directory does not exist: {0}")]
    InputMissing(PathBuf),

    #[error("[TickMedian] : input path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("[TickMedian] : failed to scan directory {path}: {source}")]
    DirectoryScan
    {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("[TickMedian] : config file not found: {0}")]
    ConfigMissing(PathBuf),

    #[error("[TickMedian] : config parse error: {0}")]
    ConfigParse(String),

    #[error("[TickMedian] : failed to write output {path}: {source}")]
    Output
    {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("[TickMedian] : failed to build task pool: {0}")]
    TaskPool(String),

    #[error("[TickMedian] : task failed: {0}")]
    TaskFailed(String),

    #[error("[TickMedian] : logger setup failed: {0}")]
    Logger(String),

    #[error("[TickMedian] : IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<toml::de::Error> for MedianError
{
    fn from(err: toml::de::Error) -> Self
    {
        MedianError::ConfigParse(format!("TOML error: {}", err))
    }
}
