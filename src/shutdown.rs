use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// 显式的取消令牌。
///
/// 信号处理方调用 `cancel`，运行循环在每条记录之前检查 `is_cancelled`；
/// 所有克隆共享同一个标志。
#[derive(Clone, Debug, Default)]
pub struct ShutdownToken
{
    cancelled: Arc<AtomicBool>,
}

impl ShutdownToken
{
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn cancel(&self)
    {
        self.cancelled.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool
    {
        self.cancelled.load(Ordering::Acquire)
    }
}
