use std::{path::PathBuf, time::Duration};

use prettytable::{row, Cell, Row, Table};

/// 生成表格的接口：标题行加一行数据。
pub trait TableBuilder
{
    fn titles(&self) -> Row;

    fn row(&self) -> Row;

    /// 生成带有 ID 列的完整表格。
    fn table(&self, id_cell: &str) -> Table
    {
        let mut table = Table::new();

        let mut titles = self.titles();
        titles.insert_cell(0, Cell::new(""));
        table.set_titles(titles);

        let mut row = self.row();
        row.insert_cell(0, Cell::new(id_cell));
        table.add_row(row);

        table
    }
}

/// 一次运行的汇总信息。
#[derive(Clone, PartialEq, Debug)]
pub struct RunSummary
{
    /// 扫描到的 CSV 文件数
    pub sources_found: usize,
    /// 实际参与归并的文件数
    pub sources_merged: usize,
    /// 归并产出的记录数
    pub records: u64,
    /// 写入结果文件的行数（不含表头）
    pub medians_written: u64,
    pub last_median: Option<f64>,
    pub output_path: PathBuf,
    /// 是否因取消而提前结束
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl RunSummary
{
    /// 每秒处理的记录数
    pub fn throughput(&self) -> f64
    {
        let seconds = self.elapsed.as_secs_f64();
        if seconds > 0.0 {
            self.records as f64 / seconds
        }
        else {
            0.0
        }
    }
}

impl TableBuilder for RunSummary
{
    fn titles(&self) -> Row
    {
        row!["Files", "Merged", "Records", "Medians", "Last Median", "Elapsed", "Records/s", "Interrupted", "Output",]
    }

    fn row(&self) -> Row
    {
        row![self.sources_found,
             self.sources_merged,
             self.records,
             self.medians_written,
             self.last_median.map(|median| format!("{:.8}", median)).unwrap_or_else(|| "-".to_string()),
             format!("{:.3}s", self.elapsed.as_secs_f64()),
             format!("{:.0}", self.throughput()),
             self.interrupted,
             self.output_path.display(),]
    }
}
