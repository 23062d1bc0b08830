use std::{
    borrow::Cow,
    fs::{File, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    time::Instant,
};

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime, Time, UtcOffset};
use typed_builder::TypedBuilder;

use crate::tick_log::{local_timezone, LogTimezone};

/// 日志文件轮换周期
#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Period
{
    Minute,
    Hour,
    Day,
}

struct Rotate
{
    start: Instant,
    wait: std::time::Duration,
    period: Period,
}

/// 文件 appender 的构建参数。
#[derive(TypedBuilder)]
pub struct FileAppenderConfig
{
    #[builder(setter(transform = |x: impl AsRef<Path>| x.as_ref().to_path_buf()))]
    path: PathBuf,
    #[builder(default, setter(into))]
    rotate: Option<Period>,
    #[builder(default = LogTimezone::Local)]
    timezone: LogTimezone,
}

impl FileAppenderConfig
{
    /// 创建父目录并以追加模式打开日志文件。
    pub fn open(self) -> io::Result<FileAppender>
    {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let offset = offset_from_timezone(self.timezone);
        let (file_path, rotate) = match self.rotate {
            | Some(period) => {
                let now = OffsetDateTime::now_utc().to_offset(offset);
                let wait = FileAppender::next(&now, period) - now;
                (FileAppender::file(&self.path, period, &now),
                 Some(Rotate { start: Instant::now(),
                               wait: wait.try_into().unwrap_or_default(),
                               period }))
            }
            | None => (self.path.clone(), None),
        };

        Ok(FileAppender { file: append(&file_path)?,
                          path: self.path,
                          rotate,
                          offset })
    }
}

fn append(path: &Path) -> io::Result<BufWriter<File>>
{
    OpenOptions::new().create(true).append(true).open(path).map(BufWriter::new)
}

fn offset_from_timezone(timezone: LogTimezone) -> UtcOffset
{
    match timezone {
        | LogTimezone::Local => local_timezone(),
        | LogTimezone::Utc => UtcOffset::UTC,
        | LogTimezone::Fixed(offset) => offset,
    }
}

/// 把日志写入本地文件，可按周期轮换到带时间后缀的新文件。
pub struct FileAppender
{
    file: BufWriter<File>,
    path: PathBuf,
    rotate: Option<Rotate>,
    offset: UtcOffset,
}

impl FileAppender
{
    pub fn builder() -> FileAppenderConfigBuilder
    {
        FileAppenderConfig::builder()
    }

    /// 单一文件，不轮换
    pub fn new<T: AsRef<Path>>(path: T) -> io::Result<Self>
    {
        Self::builder().path(path).build().open()
    }

    pub fn rotate<T: AsRef<Path>>(path: T, period: Period) -> io::Result<Self>
    {
        Self::builder().path(path).rotate(period).build().open()
    }

    /// `logs/app.log` -> `logs/app-20240527.log`
    fn file(path: &Path, period: Period, now: &OffsetDateTime) -> PathBuf
    {
        let ts = match period {
            | Period::Day => format!("{}{:02}{:02}", now.year(), now.month() as u8, now.day()),
            | Period::Hour => format!("{}{:02}{:02}T{:02}", now.year(), now.month() as u8, now.day(), now.hour()),
            | Period::Minute => format!("{}{:02}{:02}T{:02}{:02}", now.year(), now.month() as u8, now.day(), now.hour(), now.minute()),
        };

        match (path.file_stem(), path.extension()) {
            | (Some(stem), Some(ext)) => path.with_file_name(format!("{}-{}.{}", stem.to_string_lossy(), ts, ext.to_string_lossy())),
            | _ => path.with_file_name(format!("{}-{}", path.file_name().map(|x| x.to_string_lossy()).unwrap_or(Cow::from("log")), ts)),
        }
    }

    #[inline]
    fn next(now: &OffsetDateTime, period: Period) -> OffsetDateTime
    {
        let next = match period {
            | Period::Day => now.date().with_time(Time::MIDNIGHT) + Duration::DAY,
            | Period::Hour => now.date().with_time(Time::MIDNIGHT) + Duration::hours(now.hour() as i64 + 1),
            | Period::Minute => now.date().with_time(Time::MIDNIGHT) + Duration::minutes(now.hour() as i64 * 60 + now.minute() as i64 + 1),
        };
        next.assume_offset(now.offset())
    }

    /// 当前正在写入的文件路径
    pub fn current_path(&self) -> PathBuf
    {
        match &self.rotate {
            | Some(rotate) => Self::file(&self.path, rotate.period, &OffsetDateTime::now_utc().to_offset(self.offset)),
            | None => self.path.clone(),
        }
    }
}

impl Write for FileAppender
{
    fn write(&mut self, record: &[u8]) -> io::Result<usize>
    {
        if let Some(Rotate { start, wait, period }) = &mut self.rotate {
            if start.elapsed() > *wait {
                self.file.flush()?;
                let now = OffsetDateTime::now_utc().to_offset(self.offset);
                self.file = append(&Self::file(&self.path, *period, &now))?;
                *start = Instant::now();
                *wait = (Self::next(&now, *period) - now).try_into().unwrap_or_default();
            }
        }
        self.file.write_all(record).map(|_| record.len())
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()>
    {
        self.file.flush()
    }
}
