//! 异步日志：日志宏只负责把消息打包送入有界通道，由独立的 `logger` 线程格式化并写出。
//!
//! 通过 `log` facade 接入，crate 内统一使用 `crate::tick_log::{info, warn, ...}`。
//! 支持按调用点限流：`warn!(limit = 1000; "...")` 表示同一调用点 1000ms 内最多输出一次，
//! 被省略的条数会在下一次输出时以 `[n]` 的形式给出。

use std::{
    borrow::Cow,
    collections::hash_map::DefaultHasher,
    fmt::Display,
    hash::{Hash, Hasher},
    io,
    io::{stderr, Error as IoError, Write},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::{Duration, Instant},
};

use arc_swap::ArcSwap;
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use hashbrown::HashMap;
pub use log::{debug, error, info, log_enabled, trace, warn, Level, LevelFilter, Record};
use log::{kv::Key, set_boxed_logger, set_max_level, Log, Metadata, SetLoggerError};
use time::{format_description::OwnedFormatItem, OffsetDateTime, UtcOffset};

use tm::{now, to_utc, Time};

pub mod appender;

mod tm
{
    use super::*;

    pub type Time = std::time::SystemTime;

    #[inline]
    pub fn now() -> Time
    {
        std::time::SystemTime::now()
    }

    #[inline]
    pub fn to_utc(time: Time) -> OffsetDateTime
    {
        time.into()
    }
}

/// 本地时区偏移。`time` 在多线程进程中可能拿不到本地偏移，此时退回到 tz 数据库。
#[cfg(target_family = "unix")]
pub(crate) fn local_timezone() -> UtcOffset
{
    UtcOffset::current_local_offset().unwrap_or_else(|_| {
                                         tz::TimeZone::local().ok()
                                                              .and_then(|tz| tz.find_current_local_time_type().ok().map(|t| t.ut_offset()))
                                                              .and_then(|secs| UtcOffset::from_whole_seconds(secs).ok())
                                                              .unwrap_or(UtcOffset::UTC)
                                     })
}

#[cfg(not(target_family = "unix"))]
pub(crate) fn local_timezone() -> UtcOffset
{
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

type NoHashMap<V> = HashMap<u64, V, nohash_hasher::BuildNoHashHasher<u64>>;

struct LogMsg
{
    time: Time,
    msg: Box<dyn Sync + Send + Display>,
    level: Level,
    target: String,
    /// 限流调用点自上次输出以来被省略的条数，未限流时为 `None`
    missed: Option<u64>,
}

/// 日志线程独占的输出状态
struct Sink
{
    root: Box<dyn Write + Send>,
    filters: Vec<Directive>,
    root_level: LevelFilter,
    offset: Option<UtcOffset>,
    time_format: OwnedFormatItem,
}

impl Sink
{
    fn write(&mut self, log_msg: LogMsg)
    {
        let level = self.filters
                        .iter()
                        .find(|directive| log_msg.target.starts_with(directive.path))
                        .map(|directive| directive.level)
                        .unwrap_or(self.root_level);
        if level < log_msg.level {
            return;
        }

        let msg = log_msg.msg.to_string();
        if msg.is_empty() {
            return;
        }

        let utc_datetime = to_utc(log_msg.time);
        let datetime = self.offset.map(|o| utc_datetime.to_offset(o)).unwrap_or(utc_datetime);
        let stamp = datetime.format(&self.time_format).unwrap_or_else(|_| datetime.to_string());

        let line = match log_msg.missed {
            | Some(missed) => format!("[{}]-[{}]{}\n", stamp, missed, msg),
            | None => format!("[{}]-{}\n", stamp, msg),
        };

        if let Err(e) = self.root.write_all(line.as_bytes()) {
            eprintln!("[TickLog] : failed to write log message: {}", e);
        }
    }

    fn flush(&mut self) -> io::Result<()>
    {
        self.root.flush()
    }
}

enum LoggerInput
{
    LogMsg(LogMsg),
    Flush,
}

#[derive(Debug)]
enum LoggerOutput
{
    Flushed,
    FlushError(io::Error),
}

pub trait LogFormat: Send + Sync
{
    /// 把 record 转成可跨线程发送的对象，真正的字符串格式化在日志线程中完成。
    fn msg(&self, record: &Record) -> Box<dyn Send + Sync + Display>;
}

pub struct TickLogFormatter;

impl LogFormat for TickLogFormatter
{
    #[inline]
    fn msg(&self, record: &Record) -> Box<dyn Send + Sync + Display>
    {
        Box::new(Message { level: record.level(),
                           thread: std::thread::current().name().map(|n| n.to_string()),
                           file: record.file_static()
                                       .map(Cow::Borrowed)
                                       .or_else(|| record.file().map(|s| Cow::Owned(s.to_owned())))
                                       .unwrap_or(Cow::Borrowed("")),
                           line: record.line(),
                           args: record.args().as_str().map(Cow::Borrowed).unwrap_or_else(|| Cow::Owned(format!("{}", record.args()))) })
    }
}

struct Message
{
    level: Level,
    thread: Option<String>,
    file: Cow<'static, str>,
    line: Option<u32>,
    args: Cow<'static, str>,
}

impl Display for Message
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        write!(f,
               "{} {} [{}:{}] {}",
               self.level,
               self.thread.as_deref().unwrap_or(""),
               self.file,
               self.line.unwrap_or(0),
               self.args)
    }
}

/// 限流调用点的状态：上次放行的时间和之后被省略的条数
struct Throttle
{
    last: Instant,
    missed: u64,
}

struct DiscardState
{
    last: ArcSwap<Instant>,
    count: AtomicUsize,
}

/// 在 drop 时刷新所有排队日志的守卫，持有到进程退出前即可保证日志落盘。
pub struct LoggerGuard
{
    queue: Sender<LoggerInput>,
    notification: Receiver<LoggerOutput>,
}

impl Drop for LoggerGuard
{
    fn drop(&mut self)
    {
        if self.queue.send(LoggerInput::Flush).is_ok() {
            if let Ok(LoggerOutput::FlushError(e)) = self.notification.recv() {
                eprintln!("[TickLog] : flush on shutdown failed: {}", e);
            }
        }
    }
}

pub struct Logger
{
    format: Box<dyn LogFormat>,
    level: LevelFilter,
    queue: Sender<LoggerInput>,
    notification: Receiver<LoggerOutput>,
    block: bool,
    discard_state: Option<DiscardState>,
    throttles: Mutex<NoHashMap<Throttle>>,
    stopped: AtomicBool,
}

impl Logger
{
    pub fn init(self) -> Result<LoggerGuard, SetLoggerError>
    {
        let guard = LoggerGuard { queue: self.queue.clone(),
                                  notification: self.notification.clone() };
        set_max_level(self.level);
        set_boxed_logger(Box::new(self)).map(|_| guard)
    }

    /// 在入队之前按调用点限流：窗口内的消息直接丢弃并计数，
    /// 放行时返回此前被省略的条数。
    fn throttle(&self, limit_key: u64, limit: Duration) -> Option<u64>
    {
        let mut throttles = self.throttles.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        match throttles.get_mut(&limit_key) {
            | Some(throttle) if now.duration_since(throttle.last) < limit => {
                throttle.missed += 1;
                None
            }
            | Some(throttle) => {
                throttle.last = now;
                Some(std::mem::take(&mut throttle.missed))
            }
            | None => {
                throttles.insert(limit_key, Throttle { last: now, missed: 0 });
                Some(0)
            }
        }
    }

    fn report_closed(&self)
    {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            eprintln!("[TickLog] : log queue closed while logging");
        }
    }
}

impl Log for Logger
{
    #[inline]
    fn enabled(&self, metadata: &Metadata) -> bool
    {
        self.level >= metadata.level()
    }

    fn log(&self, record: &Record)
    {
        let limit = record.key_values().get(Key::from_str("limit")).and_then(|x| x.to_u64()).unwrap_or(0);
        let missed = if limit == 0 {
            None
        }
        else {
            // 固定种子的哈希，保证同一调用点每次得到相同的 key
            let mut hasher = DefaultHasher::new();
            record.module_path().or(record.file()).unwrap_or("").as_bytes().hash(&mut hasher);
            record.line().unwrap_or(0).hash(&mut hasher);
            match self.throttle(hasher.finish(), Duration::from_millis(limit)) {
                | Some(missed) => Some(missed),
                | None => return,
            }
        };

        let msg = LoggerInput::LogMsg(LogMsg { time: now(),
                                               msg: self.format.msg(record),
                                               target: record.target().to_owned(),
                                               level: record.level(),
                                               missed });
        if self.block {
            if self.queue.send(msg).is_err() {
                self.report_closed();
            }
            return;
        }

        match self.queue.try_send(msg) {
            | Err(TrySendError::Full(_)) => {
                if let Some(state) = &self.discard_state {
                    let count = state.count.fetch_add(1, Ordering::SeqCst);
                    if state.last.load().elapsed().as_secs() >= 5 {
                        eprintln!("[TickLog] : too many log messages, omitted: {}", count);
                        state.last.store(Arc::new(Instant::now()));
                    }
                }
            }
            | Err(TrySendError::Disconnected(_)) => self.report_closed(),
            | Ok(()) => (),
        }
    }

    fn flush(&self)
    {
        if self.queue.send(LoggerInput::Flush).is_ok() {
            let _ = self.notification.recv();
        }
    }
}

struct BoundedChannelOption
{
    size: usize,
    block: bool,
    print: bool,
}

struct Directive
{
    path: &'static str,
    level: LevelFilter,
}

#[derive(Copy, Clone, Debug)]
pub enum LogTimezone
{
    /// 本地时区，在构建时解析一次，之后固定不变
    Local,
    Utc,
    Fixed(UtcOffset),
}

pub struct Builder
{
    format: Box<dyn LogFormat>,
    time_format: Option<OwnedFormatItem>,
    level: Option<LevelFilter>,
    root: Box<dyn Write + Send>,
    filters: Vec<Directive>,
    bounded_channel_option: Option<BoundedChannelOption>,
    timezone: LogTimezone,
}

#[inline]
pub fn builder() -> Builder
{
    Builder::new()
}

impl Builder
{
    /// 默认设置：
    /// - 日志级别 INFO
    /// - `TickLogFormatter`
    /// - 输出到 stderr
    /// - 有界通道，容量 100_000，满时丢弃
    /// - 本地时区时间戳
    #[inline]
    pub fn new() -> Builder
    {
        Builder { format: Box::new(TickLogFormatter),
                  time_format: None,
                  level: None,
                  root: Box::new(stderr()),
                  filters: Vec::new(),
                  bounded_channel_option: Some(BoundedChannelOption { size: 100_000,
                                                                      block: false,
                                                                      print: false }),
                  timezone: LogTimezone::Local }
    }

    #[inline]
    pub fn format<F: LogFormat + 'static>(mut self, format: F) -> Builder
    {
        self.format = Box::new(format);
        self
    }

    #[inline]
    pub fn time_format(mut self, format: OwnedFormatItem) -> Builder
    {
        self.time_format = Some(format);
        self
    }

    /// 有界通道。`block_when_full` 为真时日志调用方会阻塞直到日志线程腾出空间，否则丢弃多余消息。
    #[inline]
    pub fn bounded(mut self, size: usize, block_when_full: bool) -> Builder
    {
        self.bounded_channel_option = Some(BoundedChannelOption { size,
                                                                  block: block_when_full,
                                                                  print: false });
        self
    }

    /// 丢弃消息时是否打印被省略的条数
    #[inline]
    pub fn print_omitted_count(mut self, print: bool) -> Builder
    {
        if let Some(option) = self.bounded_channel_option.as_mut() {
            option.print = print;
        }
        self
    }

    #[inline]
    pub fn unbounded(mut self) -> Builder
    {
        self.bounded_channel_option = None;
        self
    }

    /// 为某个模块路径前缀单独设置级别，最长前缀优先。
    #[inline]
    pub fn filter(mut self, module_path: &'static str, level: LevelFilter) -> Builder
    {
        self.filters.push(Directive { path: module_path, level });
        self
    }

    /// 默认输出目标，省略时为 stderr。
    #[inline]
    pub fn root(mut self, writer: impl Write + Send + 'static) -> Builder
    {
        self.root = Box::new(writer);
        self
    }

    #[inline]
    pub fn max_log_level(mut self, level: LevelFilter) -> Builder
    {
        self.level = Some(level);
        self
    }

    #[inline]
    pub fn timezone(mut self, timezone: LogTimezone) -> Builder
    {
        self.timezone = timezone;
        self
    }

    #[inline]
    pub fn utc(self) -> Builder
    {
        self.timezone(LogTimezone::Utc)
    }

    /// 启动 `logger` 线程并返回尚未注册为全局 logger 的 `Logger`。
    pub fn build(self) -> Result<Logger, IoError>
    {
        let offset = match self.timezone {
            | LogTimezone::Local => Some(local_timezone()),
            | LogTimezone::Utc => None,
            | LogTimezone::Fixed(offset) => Some(offset),
        };
        let time_format = match self.time_format {
            | Some(format) => format,
            | None => time::format_description::parse_owned::<1>("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]+[offset_hour]").map_err(|e| IoError::new(io::ErrorKind::InvalidInput, e))?,
        };

        let mut filters = self.filters;
        filters.sort_by(|a, b| b.path.len().cmp(&a.path.len()));

        let global_level = self.level.unwrap_or(LevelFilter::Info);
        let (sender, receiver) = match &self.bounded_channel_option {
            | None => unbounded(),
            | Some(option) => bounded(option.size),
        };
        let (notification_sender, notification_receiver) = bounded(1);

        let mut sink = Sink { root: self.root,
                              filters,
                              root_level: global_level,
                              offset,
                              time_format };

        std::thread::Builder::new().name("logger".to_string()).spawn(move || {
                                                                   let mut last_flush = Instant::now();
                                                                   let timeout = Duration::from_millis(200);
                                                                   loop {
                                                                       match receiver.recv_timeout(timeout) {
                                                                           | Ok(LoggerInput::LogMsg(log_msg)) => sink.write(log_msg),
                                                                           | Ok(LoggerInput::Flush) => {
                                                                               while let Ok(LoggerInput::LogMsg(log_msg)) = receiver.try_recv() {
                                                                                   sink.write(log_msg);
                                                                               }
                                                                               let output = match sink.flush() {
                                                                                   | Ok(()) => LoggerOutput::Flushed,
                                                                                   | Err(e) => LoggerOutput::FlushError(e),
                                                                               };
                                                                               if notification_sender.send(output).is_err() {
                                                                                   break;
                                                                               }
                                                                           }
                                                                           | Err(RecvTimeoutError::Timeout) => {
                                                                               if last_flush.elapsed() > Duration::from_millis(1000) {
                                                                                   if let Err(e) = sink.flush() {
                                                                                       eprintln!("[TickLog] : flush error: {}", e);
                                                                                   }
                                                                                   last_flush = Instant::now();
                                                                               }
                                                                           }
                                                                           | Err(RecvTimeoutError::Disconnected) => {
                                                                               let _ = sink.flush();
                                                                               break;
                                                                           }
                                                                       }
                                                                   }
                                                               })?;

        let block = self.bounded_channel_option.as_ref().map(|x| x.block).unwrap_or(false);
        let print = self.bounded_channel_option.as_ref().map(|x| x.print).unwrap_or(false);
        Ok(Logger { format: self.format,
                    level: global_level,
                    queue: sender,
                    notification: notification_receiver,
                    block,
                    discard_state: if block || !print {
                        None
                    }
                    else {
                        Some(DiscardState { last: ArcSwap::new(Arc::new(Instant::now())),
                                            count: AtomicUsize::new(0) })
                    },
                    throttles: Mutex::new(HashMap::default()),
                    stopped: AtomicBool::new(false) })
    }

    /// 构建并注册为全局 logger。
    pub fn try_init(self) -> Result<LoggerGuard, Box<dyn std::error::Error>>
    {
        let logger = self.build()?;
        Ok(logger.init()?)
    }
}

impl Default for Builder
{
    #[inline]
    fn default() -> Self
    {
        Builder::new()
    }
}
