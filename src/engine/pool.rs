use std::{
    any::Any,
    num::NonZeroUsize,
    panic::{self, AssertUnwindSafe},
};

use crossbeam_channel::{bounded, Receiver};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::MedianError;

/// 固定线程数的任务池。
///
/// 线程在构造时一次性创建；提交的任务彼此独立、不共享可变状态，
/// 调用方通过 `TaskHandle::get` 阻塞等待各自的结果（fork-join）。
pub struct TaskPool
{
    pool: ThreadPool,
}

impl TaskPool
{
    /// 创建 `threads` 个工作线程的池，0 视为 1。
    pub fn new(threads: usize) -> Result<Self, MedianError>
    {
        let pool = ThreadPoolBuilder::new().num_threads(threads.max(1))
                                           .thread_name(|idx| format!("task-pool-{}", idx))
                                           .build()
                                           .map_err(|e| MedianError::TaskPool(e.to_string()))?;
        Ok(Self { pool })
    }

    /// 线程数取可用并行度
    pub fn with_available_parallelism() -> Result<Self, MedianError>
    {
        Self::new(default_thread_count())
    }

    pub fn thread_count(&self) -> usize
    {
        self.pool.current_num_threads()
    }

    /// 提交任务并返回结果句柄。任务内的 panic 会被捕获，并在 `get` 时以 `TaskFailed` 返回。
    pub fn submit<F, T>(&self, job: F) -> TaskHandle<T>
        where F: FnOnce() -> T + Send + 'static,
              T: Send + 'static
    {
        let (result_tx, result_rx) = bounded(1);
        self.pool.spawn(move || {
                     let result = panic::catch_unwind(AssertUnwindSafe(job)).map_err(panic_message);
                     // 句柄可能已被丢弃，此时结果无人接收
                     let _ = result_tx.send(result);
                 });
        TaskHandle { result_rx }
    }
}

/// 已提交任务的结果句柄
pub struct TaskHandle<T>
{
    result_rx: Receiver<Result<T, String>>,
}

impl<T> TaskHandle<T>
{
    /// 阻塞直到任务完成。
    pub fn get(self) -> Result<T, MedianError>
    {
        match self.result_rx.recv() {
            | Ok(Ok(value)) => Ok(value),
            | Ok(Err(message)) => Err(MedianError::TaskFailed(message)),
            | Err(_) => Err(MedianError::TaskFailed("worker exited before reporting a result".to_string())),
        }
    }
}

pub fn default_thread_count() -> usize
{
    std::thread::available_parallelism().map(NonZeroUsize::get).unwrap_or(1)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String
{
    match payload.downcast::<String>() {
        | Ok(message) => *message,
        | Err(payload) => match payload.downcast::<&'static str>() {
            | Ok(message) => message.to_string(),
            | Err(_) => "task panicked".to_string(),
        },
    }
}
