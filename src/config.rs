//! TOML 配置。
//!
//! ```toml
//! [main]
//! input = "/data/input"
//! output = "/data/output"
//! filename_mask = ["trade", "level"]
//! threads = 4
//!
//! [log]
//! level = "info"
//! file = "logs/tick_median.log"
//! rotate = "day"
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::Deserialize;

use crate::{
    error::MedianError,
    tick_log::{
        appender::{FileAppender, Period},
        Builder, LevelFilter,
    },
};

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
pub const DEFAULT_OUTPUT_DIR: &str = "output";

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AppConfig
{
    pub main: MainConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct MainConfig
{
    /// 输入目录，必填
    pub input: PathBuf,
    /// 输出目录，缺省为 `<当前目录>/output`
    #[serde(default)]
    pub output: Option<PathBuf>,
    /// 文件名（不含扩展名）需包含其中任意一个子串，为空时接受所有 CSV 文件
    #[serde(default)]
    pub filename_mask: Vec<String>,
    /// 任务池线程数，缺省为可用并行度
    #[serde(default)]
    pub threads: Option<usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct LogConfig
{
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub rotate: Option<Period>,
}

impl AppConfig
{
    /// 读取配置文件，并返回 `AppConfig`。
    ///
    /// # 错误
    /// - `MedianError::ConfigMissing`: 配置文件不存在。
    /// - `MedianError::ConfigParse`: TOML 解析失败，或缺少 `[main].input`。
    /// - `MedianError::Io`: 读取文件时发生 IO 错误。
    pub fn from_file(path: &Path) -> Result<Self, MedianError>
    {
        if !path.exists() {
            return Err(MedianError::ConfigMissing(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        content.parse()
    }

    /// 输出目录，未配置时为当前工作目录下的 `output`。
    pub fn output_dir(&self) -> PathBuf
    {
        match &self.main.output {
            | Some(output) => output.clone(),
            | None => std::env::current_dir().unwrap_or_default().join(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl FromStr for AppConfig
{
    type Err = MedianError;

    fn from_str(content: &str) -> Result<Self, Self::Err>
    {
        let config: AppConfig = toml::from_str(content)?;
        if config.main.input.as_os_str().is_empty() {
            return Err(MedianError::ConfigParse("[main].input must not be empty".to_string()));
        }
        if config.main.threads == Some(0) {
            return Err(MedianError::ConfigParse("[main].threads must be at least 1".to_string()));
        }
        Ok(config)
    }
}

impl LogConfig
{
    /// 配置的日志级别，缺省为 INFO。
    pub fn level_filter(&self) -> Result<LevelFilter, MedianError>
    {
        match &self.level {
            | Some(level) => parse_level(level),
            | None => Ok(LevelFilter::Info),
        }
    }

    /// 按配置生成日志 `Builder`：`level_override` 优先于配置文件中的级别，
    /// 配置了 `file` 时输出到（可轮换的）日志文件，否则输出到 stderr。
    pub fn logger_builder(&self, level_override: Option<LevelFilter>) -> Result<Builder, MedianError>
    {
        let level = match level_override {
            | Some(level) => level,
            | None => self.level_filter()?,
        };
        let builder = Builder::new().max_log_level(level);

        match &self.file {
            | Some(path) => {
                let appender = FileAppender::builder().path(path).rotate(self.rotate).build().open().map_err(|e| MedianError::Logger(format!("cannot open log file {}: {}", path.display(), e)))?;
                Ok(builder.root(appender))
            }
            | None => Ok(builder),
        }
    }
}

pub fn parse_level(level: &str) -> Result<LevelFilter, MedianError>
{
    LevelFilter::from_str(level).map_err(|_| MedianError::ConfigParse(format!("unknown log level: {}", level)))
}

/// 可执行文件所在目录下的 `config.toml`，无法确定可执行文件路径时退回当前目录。
pub fn default_config_path() -> PathBuf
{
    std::env::current_exe().ok()
                           .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_CONFIG_FILE)))
                           .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

#[cfg(test)]
mod tests
{
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_read_full_config()
    {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path,
                  r#"
    [main]
    input = "/data/input"
    output = "/data/output"
    filename_mask = ["trade", "level"]
    threads = 4

    [log]
    level = "debug"
    file = "logs/tick_median.log"
    rotate = "hour"
    "#).unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.main.input, PathBuf::from("/data/input"));
        assert_eq!(config.output_dir(), PathBuf::from("/data/output"));
        assert_eq!(config.main.filename_mask, vec!["trade".to_string(), "level".to_string()]);
        assert_eq!(config.main.threads, Some(4));
        assert_eq!(config.log.level_filter().unwrap(), LevelFilter::Debug);
        assert_eq!(config.log.file, Some(PathBuf::from("logs/tick_median.log")));
        assert_eq!(config.log.rotate, Some(Period::Hour));
    }

    #[test]
    fn test_optional_keys_take_defaults()
    {
        let config: AppConfig = "[main]\ninput = \"in\"\n".parse().unwrap();
        assert!(config.main.filename_mask.is_empty());
        assert_eq!(config.main.threads, None);
        assert_eq!(config.log, LogConfig::default());
        assert_eq!(config.log.level_filter().unwrap(), LevelFilter::Info);
        assert_eq!(config.output_dir(), std::env::current_dir().unwrap().join("output"));
    }

    #[test]
    fn test_missing_file()
    {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let result = AppConfig::from_file(&path);
        assert!(matches!(result, Err(MedianError::ConfigMissing(ref p)) if *p == path), "unexpected: {:?}", result);
    }

    #[test]
    fn test_missing_input_is_parse_error()
    {
        let result = "[main]\noutput = \"out\"\n".parse::<AppConfig>();
        assert!(matches!(result, Err(MedianError::ConfigParse(_))), "unexpected: {:?}", result);

        let result = "[log]\nlevel = \"info\"\n".parse::<AppConfig>();
        assert!(matches!(result, Err(MedianError::ConfigParse(_))), "unexpected: {:?}", result);
    }

    #[test]
    fn test_invalid_values()
    {
        assert!(matches!("[main]\ninput = \"\"\n".parse::<AppConfig>(), Err(MedianError::ConfigParse(_))));
        assert!(matches!("[main]\ninput = \"in\"\nthreads = 0\n".parse::<AppConfig>(), Err(MedianError::ConfigParse(_))));
        assert!(matches!("[main]\ninput = \"in\"\n[log]\nrotate = \"week\"\n".parse::<AppConfig>(), Err(MedianError::ConfigParse(_))));

        let config: AppConfig = "[main]\ninput = \"in\"\n[log]\nlevel = \"loud\"\n".parse().unwrap();
        assert!(matches!(config.log.level_filter(), Err(MedianError::ConfigParse(_))));
    }

    #[test]
    fn test_level_override_wins()
    {
        let config = LogConfig { level: Some("loud".to_string()),
                                 ..Default::default() };
        assert!(config.logger_builder(Some(LevelFilter::Warn)).is_ok());
        assert!(config.logger_builder(None).is_err());
    }

    #[test]
    fn test_log_file_is_created()
    {
        let dir = tempdir().unwrap();
        let file = dir.path().join("logs").join("tick.log");
        let config = LogConfig { file: Some(file.clone()),
                                 ..Default::default() };
        assert!(config.logger_builder(None).is_ok());
        assert!(file.exists());
    }
}
