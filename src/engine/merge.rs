//! 多数据源 k 路归并。
//!
//! 每个数据源各自按时间有序，引擎用一个以当前时间戳为键的小顶堆挑选下一条记录。
//! 内存只与数据源数量 k 成正比，每条记录的额外开销为 O(log k)。

use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
    io::BufRead,
    path::{Path, PathBuf},
};

use crate::{
    common::Record,
    datafeed::{discovery::scan_directory, CursorState, RecordFeed, SourceCursor},
    engine::pool::TaskPool,
    error::MedianError,
    tick_log::{debug, info, warn},
};

/// 堆中的排序键，只引用游标下标，游标本身始终由引擎持有。
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
struct HeapEntry
{
    timestamp: u64,
    source_index: usize,
}

impl PartialOrd for HeapEntry
{
    fn partial_cmp(&self, other: &Self) -> Option<Ordering>
    {
        Some(self.cmp(other))
    }
}

// 时间戳相同时按数据源下标排序，消费方不应依赖这个顺序
impl Ord for HeapEntry
{
    fn cmp(&self, other: &Self) -> Ordering
    {
        self.timestamp.cmp(&other.timestamp).then(self.source_index.cmp(&other.source_index))
    }
}

/// k 路归并引擎，按时间戳非递减的顺序产出所有有效数据源的记录。
///
/// 通过 `Iterator` 拉取，或用 `for_each_record` 回调消费。
pub struct MergeEngine<F = SourceCursor>
{
    sources: Vec<F>,
    heap: BinaryHeap<Reverse<HeapEntry>>,
    discovered: usize,
    emitted: u64,
}

impl MergeEngine<SourceCursor>
{
    /// 扫描目录、并行初始化所有游标，并建立初始堆。
    ///
    /// 目录不存在或不是目录时返回错误；单个文件的问题只会让该文件被排除。
    /// 没有任何可用数据源时得到一个空的引擎，这不是错误。
    pub fn open(input_dir: &Path, masks: &[String], pool: &TaskPool) -> Result<Self, MedianError>
    {
        let paths = scan_directory(input_dir, masks)?;
        if paths.is_empty() {
            warn!("[TickMedian] : no CSV files found in: {}", input_dir.display());
        }
        else {
            info!("[TickMedian] : files found: {}", paths.len());
        }

        let discovered = paths.len();
        let cursors = open_cursors(paths, pool);
        let mut engine = Self::from_cursors(cursors);
        engine.discovered = discovered;

        if engine.heap.is_empty() {
            warn!("[TickMedian] : no data to process");
        }
        Ok(engine)
    }
}

/// 通过任务池并行打开所有文件，等待全部完成后只保留 `Ready` 的游标。
fn open_cursors(paths: Vec<PathBuf>, pool: &TaskPool) -> Vec<SourceCursor>
{
    let handles: Vec<_> = paths.into_iter()
                               .map(|path| {
                                   let handle = pool.submit({
                                                    let path = path.clone();
                                                    move || SourceCursor::open(&path)
                                                });
                                   (path, handle)
                               })
                               .collect();

    let mut cursors = Vec::with_capacity(handles.len());
    for (path, handle) in handles {
        match handle.get() {
            | Ok(cursor) if cursor.state() == CursorState::Ready => {
                info!("[TickMedian] :   - {}", cursor.name());
                cursors.push(cursor);
            }
            | Ok(cursor) => {
                warn!("[TickMedian] : source {} excluded from merge ({:?})", cursor.name(), cursor.state());
            }
            | Err(e) => {
                warn!("[TickMedian] : source {} excluded from merge: {}", path.display(), e);
            }
        }
    }
    cursors
}

impl<F> MergeEngine<F> where F: RecordFeed
{
    /// 用已经初始化好的数据源构建引擎，非 `Ready` 的数据源直接丢弃。
    pub fn from_cursors(cursors: Vec<F>) -> Self
    {
        let discovered = cursors.len();
        let sources: Vec<F> = cursors.into_iter().filter(|cursor| cursor.is_ready()).collect();

        let heap = sources.iter()
                          .enumerate()
                          .filter_map(|(source_index, cursor)| cursor.current().map(|record| Reverse(HeapEntry { timestamp: record.timestamp, source_index })))
                          .collect();

        Self { sources,
               heap,
               discovered,
               emitted: 0 }
    }

    /// 发现的数据源数量（含被排除的）
    pub fn source_count(&self) -> usize
    {
        self.discovered
    }

    /// 参与归并的数据源数量
    pub fn merged_source_count(&self) -> usize
    {
        self.sources.len()
    }

    /// 尚未读完的数据源数量，等于堆中的条目数。
    pub fn live_sources(&self) -> usize
    {
        self.heap.len()
    }

    /// 已产出的记录数
    pub fn emitted(&self) -> u64
    {
        self.emitted
    }

    pub fn is_finished(&self) -> bool
    {
        self.heap.is_empty()
    }

    /// 取出下一条记录：弹出最小键，读取对应游标的当前记录，然后推进该游标；
    /// 游标仍就绪则以新时间戳重新入堆，否则永久移除。
    pub fn next_record(&mut self) -> Option<Record>
    {
        let Reverse(entry) = self.heap.pop()?;
        let cursor = &mut self.sources[entry.source_index];
        let record = cursor.current()?;

        if cursor.advance() {
            if let Some(next) = cursor.current() {
                self.heap.push(Reverse(HeapEntry { timestamp: next.timestamp,
                                                   source_index: entry.source_index }));
            }
        }
        else {
            debug!("[TickMedian] : source #{} finished ({:?})", entry.source_index, cursor.state());
        }

        self.emitted += 1;
        Some(record)
    }

    /// 把剩余记录逐条交给回调，返回本次产出的记录数。
    pub fn for_each_record(&mut self, mut on_record: impl FnMut(Record)) -> u64
    {
        let mut count = 0;
        while let Some(record) = self.next_record() {
            on_record(record);
            count += 1;
        }
        count
    }
}

impl<F> Iterator for MergeEngine<F> where F: RecordFeed
{
    type Item = Record;

    fn next(&mut self) -> Option<Record>
    {
        self.next_record()
    }
}

/// 基于任意 `BufRead` 的数据源构建引擎，主要用于内存数据源。
pub fn merge_readers<R>(sources: Vec<(String, R)>) -> MergeEngine<SourceCursor<R>>
    where R: BufRead
{
    MergeEngine::from_cursors(sources.into_iter().map(|(name, reader)| SourceCursor::from_reader(name, reader)).collect())
}
