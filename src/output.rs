//! 中位数结果文件。

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::error::MedianError;

pub const RESULT_FILE_NAME: &str = "median_result.csv";
pub const RESULT_HEADER: &str = "receive_ts;price_median";

/// 把中位数变化写入 `median_result.csv`，每行 `receive_ts;price_median`，价格固定 8 位小数。
pub struct ResultWriter
{
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl ResultWriter
{
    /// 创建输出目录，截断（或新建）结果文件并写入表头。
    pub fn open(output_dir: &Path) -> Result<Self, MedianError>
    {
        let path = output_dir.join(RESULT_FILE_NAME);
        fs::create_dir_all(output_dir).map_err(|source| MedianError::Output { path: output_dir.to_path_buf(), source })?;

        let file = File::create(&path).map_err(|source| MedianError::Output { path: path.clone(), source })?;
        let mut writer = Self { path,
                                writer: BufWriter::new(file),
                                written: 0 };
        writer.write_line(format_args!("{}", RESULT_HEADER))?;
        Ok(writer)
    }

    pub fn write(&mut self, timestamp: u64, median: f64) -> Result<(), MedianError>
    {
        self.write_line(format_args!("{};{:.8}", timestamp, median))?;
        self.written += 1;
        Ok(())
    }

    /// 已写入的数据行数，不含表头
    pub fn written_count(&self) -> u64
    {
        self.written
    }

    pub fn path(&self) -> &Path
    {
        &self.path
    }

    /// 刷新缓冲区并返回结果文件路径。
    pub fn finish(mut self) -> Result<PathBuf, MedianError>
    {
        match self.writer.flush() {
            | Ok(()) => Ok(self.path),
            | Err(source) => Err(MedianError::Output { path: self.path, source }),
        }
    }

    fn write_line(&mut self, line: std::fmt::Arguments<'_>) -> Result<(), MedianError>
    {
        writeln!(self.writer, "{}", line).map_err(|source| MedianError::Output { path: self.path.clone(), source })
    }
}
