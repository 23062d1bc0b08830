use serde::{Deserialize, Serialize};

use crate::common::Record;

pub mod cursor;
pub mod discovery;
pub mod parser;

pub use cursor::SourceCursor;

/// 单个数据源游标的生命周期状态。
#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub enum CursorState
{
    Opening,   // 正在打开并解析表头
    Ready,     // 持有一条可读取的当前记录
    Exhausted, // 数据已读完，或读取时发生 IO 错误
    Invalid,   // 无法打开、文件为空或缺少必需列，整个数据源被跳过
}

/// 按时间有序的记录流："当前记录 + 前进" 两个操作外加就绪查询。
///
/// NOTE 归并引擎只依赖这个能力；所有数据源格式相同，所以目前只有 `SourceCursor` 一个实现。
pub trait RecordFeed
{
    /// 当前记录，仅在 `Ready` 状态下为 `Some`。
    fn current(&self) -> Option<Record>;

    /// 前进到下一条有效记录，返回之后是否仍处于 `Ready`。
    fn advance(&mut self) -> bool;

    fn state(&self) -> CursorState;

    fn is_ready(&self) -> bool
    {
        self.state() == CursorState::Ready
    }
}
