use std::{
    fmt::{Debug, Formatter},
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use crate::{
    common::Record,
    datafeed::{
        parser::{trim_line_end, ColumnLayout},
        CursorState, RecordFeed,
    },
    tick_log::{debug, error, warn},
};

/// 读缓冲区大小，在内存占用和系统调用次数之间折中。
pub const READ_BUFFER_SIZE: usize = 64 * 1024;

/// 逐行读取单个数据源的游标。
///
/// 游标独占底层 reader，任意时刻只在内存中保留一条已解析记录；
/// 表头只在打开时解析一次，列下标此后固定。
pub struct SourceCursor<R = BufReader<File>>
{
    name: String,
    reader: Option<R>,
    buffer: Vec<u8>,
    layout: Option<ColumnLayout>,
    current: Option<Record>,
    state: CursorState,
    line_number: usize,
}

impl SourceCursor<BufReader<File>>
{
    /// 打开文件并解析表头与第一条记录。
    ///
    /// 打开失败、空文件或缺少必需列时返回 `Invalid` 状态的游标，而不是错误：
    /// 单个数据源的问题只会让该数据源被跳过。
    pub fn open(path: &Path) -> Self
    {
        let name = path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_else(|| path.to_string_lossy().into_owned());

        match File::open(path) {
            | Ok(file) => Self::from_reader(name, BufReader::with_capacity(READ_BUFFER_SIZE, file)),
            | Err(e) => {
                error!("[TickMedian] : failed to open file {}: {}", path.display(), e);
                Self::invalid(name)
            }
        }
    }
}

impl<R> SourceCursor<R> where R: BufRead
{
    /// 基于任意 `BufRead` 构建游标，`name` 仅用于日志。
    pub fn from_reader(name: impl Into<String>, reader: R) -> Self
    {
        let mut cursor = Self { name: name.into(),
                                reader: Some(reader),
                                buffer: Vec::with_capacity(256),
                                layout: None,
                                current: None,
                                state: CursorState::Opening,
                                line_number: 0 };
        cursor.read_header();
        if cursor.state == CursorState::Opening {
            cursor.advance();
        }
        cursor
    }

    fn read_header(&mut self)
    {
        match self.next_line() {
            | Ok(Some(())) => {}
            | Ok(None) => {
                warn!("[TickMedian] : file is empty: {}", self.name);
                self.invalidate();
                return;
            }
            | Err(e) => {
                error!("[TickMedian] : failed to read header of {}: {}", self.name, e);
                self.invalidate();
                return;
            }
        }

        let header = match std::str::from_utf8(&self.buffer) {
            | Ok(header) => header,
            | Err(_) => {
                error!("[TickMedian] : header of {} is not valid UTF-8", self.name);
                self.invalidate();
                return;
            }
        };

        match ColumnLayout::resolve(header) {
            | Ok(layout) => {
                debug!("[TickMedian] : {} columns: receive_ts={} price={}", self.name, layout.timestamp, layout.price);
                self.layout = Some(layout);
            }
            | Err(missing) => {
                error!("[TickMedian] : file {} skipped: {}", self.name, missing);
                self.invalidate();
            }
        }
    }

    /// 读取下一物理行到缓冲区，`Ok(None)` 表示读到末尾。
    fn next_line(&mut self) -> std::io::Result<Option<()>>
    {
        self.buffer.clear();
        let Some(reader) = self.reader.as_mut()
        else {
            return Ok(None);
        };
        match reader.read_until(b'\n', &mut self.buffer)? {
            | 0 => Ok(None),
            | _ => {
                self.line_number += 1;
                Ok(Some(()))
            }
        }
    }

    fn invalidate(&mut self)
    {
        self.current = None;
        self.reader = None;
        self.state = CursorState::Invalid;
    }

    /// 读完或出错后立即释放底层句柄。
    fn exhaust(&mut self)
    {
        self.current = None;
        self.reader = None;
        self.state = CursorState::Exhausted;
    }
}

impl<R> SourceCursor<R>
{
    fn invalid(name: String) -> Self
    {
        Self { name,
               reader: None,
               buffer: Vec::new(),
               layout: None,
               current: None,
               state: CursorState::Invalid,
               line_number: 0 }
    }

    /// 数据源名称（文件名）
    pub fn name(&self) -> &str
    {
        &self.name
    }

    /// 最近读取的物理行号，表头为第 1 行。
    pub fn line_number(&self) -> usize
    {
        self.line_number
    }

    pub fn layout(&self) -> Option<ColumnLayout>
    {
        self.layout
    }
}

impl<R> RecordFeed for SourceCursor<R> where R: BufRead
{
    fn current(&self) -> Option<Record>
    {
        match self.state {
            | CursorState::Ready => self.current,
            | _ => None,
        }
    }

    /// 跳过空行和无法解析的行，直到读到有效记录、文件结束或发生 IO 错误。
    fn advance(&mut self) -> bool
    {
        let layout = match (self.state, self.layout) {
            | (CursorState::Opening | CursorState::Ready, Some(layout)) => layout,
            | _ => return false,
        };

        loop {
            match self.next_line() {
                | Ok(Some(())) => {}
                | Ok(None) => {
                    self.exhaust();
                    return false;
                }
                | Err(e) => {
                    error!("[TickMedian] : {}:{} read error, source closed: {}", self.name, self.line_number + 1, e);
                    self.exhaust();
                    return false;
                }
            }

            let line = match std::str::from_utf8(&self.buffer) {
                | Ok(line) => trim_line_end(line),
                | Err(_) => {
                    warn!("[TickMedian] : {}:{} - invalid UTF-8, skipping", self.name, self.line_number);
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }

            match layout.parse_line(line) {
                | Ok(record) => {
                    self.current = Some(record);
                    self.state = CursorState::Ready;
                    return true;
                }
                | Err(e) => {
                    warn!("[TickMedian] : {}:{} - {}, skipping", self.name, self.line_number, e);
                }
            }
        }
    }

    fn state(&self) -> CursorState
    {
        self.state
    }
}

impl<R> Debug for SourceCursor<R>
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("SourceCursor")
         .field("name", &self.name)
         .field("state", &self.state)
         .field("current", &self.current)
         .field("line_number", &self.line_number)
         .finish()
    }
}

#[cfg(test)]
mod tests
{
    use std::io::{Cursor, Read};

    use super::*;

    fn cursor(content: &str) -> SourceCursor<Cursor<Vec<u8>>>
    {
        SourceCursor::from_reader("test.csv", Cursor::new(content.as_bytes().to_vec()))
    }

    fn drain<R: BufRead>(cursor: &mut SourceCursor<R>) -> Vec<Record>
    {
        let mut records = Vec::new();
        while let Some(record) = cursor.current() {
            records.push(record);
            cursor.advance();
        }
        records
    }

    #[test]
    fn malformed_row_between_valid_rows_is_skipped()
    {
        let mut cursor = cursor("receive_ts;exchange_ts;price;quantity;side\n\
                                 1000;990;100.0;1.0;bid\n\
                                 not_a_number;990;101.0;1.0;bid\n\
                                 3000;2990;102.0;1.0;ask\n");
        assert_eq!(cursor.state(), CursorState::Ready);
        assert_eq!(drain(&mut cursor), vec![Record::new(1000, 100.0), Record::new(3000, 102.0)]);
        assert_eq!(cursor.state(), CursorState::Exhausted);
        assert!(!cursor.advance());
    }

    #[test]
    fn missing_required_column_invalidates_source()
    {
        let mut cursor = cursor("receive_ts;exchange_ts;quantity\n1000;990;1.0\n");
        assert_eq!(cursor.state(), CursorState::Invalid);
        assert_eq!(cursor.current(), None);
        assert!(!cursor.advance());
        assert_eq!(cursor.state(), CursorState::Invalid);
    }

    #[test]
    fn empty_source_is_invalid_and_header_only_is_exhausted()
    {
        assert_eq!(cursor("").state(), CursorState::Invalid);

        let header_only = cursor("receive_ts;price\n");
        assert_eq!(header_only.state(), CursorState::Exhausted);
        assert_eq!(header_only.current(), None);
        assert_eq!(header_only.layout(), Some(ColumnLayout { timestamp: 0, price: 1 }));
    }

    #[test]
    fn blank_lines_short_rows_and_crlf_are_handled()
    {
        let mut cursor = cursor("price;side;receive_ts\r\n\
                                 \r\n\
                                 100.5;bid\r\n\
                                 100.5;bid;2000\r\n\
                                 \n\
                                 101.25;ask;2500");
        assert_eq!(drain(&mut cursor), vec![Record::new(2000, 100.5), Record::new(2500, 101.25)]);
        assert_eq!(cursor.line_number(), 6);
    }

    #[test]
    fn unopenable_path_yields_invalid_cursor()
    {
        let cursor = SourceCursor::open(Path::new("/definitely/not/here/trade.csv"));
        assert_eq!(cursor.state(), CursorState::Invalid);
        assert_eq!(cursor.name(), "trade.csv");
        assert_eq!(cursor.current(), None);
    }

    /// 先返回给定内容，之后每次读取都失败。
    struct FailingReader
    {
        content: Cursor<Vec<u8>>,
    }

    impl Read for FailingReader
    {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>
        {
            match self.content.read(buf)? {
                | 0 => Err(std::io::Error::new(std::io::ErrorKind::Other, "disk gone")),
                | n => Ok(n),
            }
        }
    }

    #[test]
    fn io_error_exhausts_cursor_without_failing()
    {
        let reader = FailingReader { content: Cursor::new(b"receive_ts;price\n1000;100.0\n".to_vec()) };
        let mut cursor = SourceCursor::from_reader("failing.csv", BufReader::new(reader));
        assert_eq!(cursor.current(), Some(Record::new(1000, 100.0)));
        assert!(!cursor.advance());
        assert_eq!(cursor.state(), CursorState::Exhausted);
    }
}
