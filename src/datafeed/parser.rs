//! 行情 CSV 的行级解析：表头列定位、字段切分以及严格的数值解析。

use thiserror::Error;

use crate::common::Record;

/// 字段分隔符
pub const DELIMITER: char = ';';
/// 时间戳列名
pub const TIMESTAMP_COLUMN: &str = "receive_ts";
/// 价格列名
pub const PRICE_COLUMN: &str = "price";

/// 一行数据被跳过的原因。
#[derive(Error, Copy, Clone, PartialEq, Eq, Debug)]
pub enum LineError
{
    #[error("too few fields, expected at least {0}")]
    TooFewFields(usize),

    #[error("invalid receive_ts")]
    InvalidTimestamp,

    #[error("invalid price")]
    InvalidPrice,
}

/// 表头中缺少必需列。
#[derive(Error, Copy, Clone, PartialEq, Eq, Debug)]
#[error("missing required column `{0}`")]
pub struct MissingColumn(pub &'static str);

/// 从表头解析出的两列下标，每个数据源独立确定，之后不再改变。
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ColumnLayout
{
    pub timestamp: usize,
    pub price: usize,
}

impl ColumnLayout
{
    /// 按列名精确匹配定位 `receive_ts` 与 `price`，列的顺序不做任何假设。
    pub fn resolve(header: &str) -> Result<Self, MissingColumn>
    {
        let header = trim_line_end(header);
        let timestamp = find_column(header, TIMESTAMP_COLUMN).ok_or(MissingColumn(TIMESTAMP_COLUMN))?;
        let price = find_column(header, PRICE_COLUMN).ok_or(MissingColumn(PRICE_COLUMN))?;
        Ok(Self { timestamp, price })
    }

    /// 解析一行需要的最少字段数
    pub fn min_fields(&self) -> usize
    {
        self.timestamp.max(self.price) + 1
    }

    /// 解析一行数据。只切分到两列中靠后的那一列为止，其余字段忽略。
    pub fn parse_line(&self, line: &str) -> Result<Record, LineError>
    {
        let line = trim_line_end(line);
        let last = self.timestamp.max(self.price);

        let mut timestamp_field = None;
        let mut price_field = None;
        for (idx, field) in line.split(DELIMITER).enumerate().take(last + 1) {
            if idx == self.timestamp {
                timestamp_field = Some(field);
            }
            if idx == self.price {
                price_field = Some(field);
            }
        }

        let (Some(timestamp_field), Some(price_field)) = (timestamp_field, price_field)
        else {
            return Err(LineError::TooFewFields(self.min_fields()));
        };

        let timestamp = parse_timestamp(timestamp_field).ok_or(LineError::InvalidTimestamp)?;
        let price = parse_price(price_field).ok_or(LineError::InvalidPrice)?;
        Ok(Record { timestamp, price })
    }
}

/// 返回列名在表头中的零基下标。
pub fn find_column(header: &str, column: &str) -> Option<usize>
{
    header.split(DELIMITER).position(|name| name == column)
}

/// 去掉行尾的 `\n` / `\r\n`
pub fn trim_line_end(line: &str) -> &str
{
    line.trim_end_matches(&['\n', '\r'][..])
}

/// 时间戳只接受非空的十进制数字串，且必须落在 u64 范围内。
pub fn parse_timestamp(field: &str) -> Option<u64>
{
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse::<u64>().ok()
}

/// 价格只接受 `-?digits(.digits)?` 形式的十进制文本。
/// 指数、`inf`、`nan`、前导 `+`、字段内空白或尾随字符一律拒绝。
pub fn parse_price(field: &str) -> Option<f64>
{
    let digits = field.strip_prefix('-').unwrap_or(field);
    let (integer, fraction) = match digits.split_once('.') {
        | Some((integer, fraction)) => (integer, Some(fraction)),
        | None => (digits, None),
    };

    let is_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !is_digits(integer) {
        return None;
    }
    if let Some(fraction) = fraction {
        if !is_digits(fraction) {
            return None;
        }
    }

    field.parse::<f64>().ok().filter(|price| price.is_finite())
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn resolve_finds_columns_in_any_order()
    {
        let trade = ColumnLayout::resolve("receive_ts;exchange_ts;price;quantity;side").unwrap();
        assert_eq!(trade, ColumnLayout { timestamp: 0, price: 2 });

        let shuffled = ColumnLayout::resolve("side;price;quantity;receive_ts\r\n").unwrap();
        assert_eq!(shuffled, ColumnLayout { timestamp: 3, price: 1 });
        assert_eq!(shuffled.min_fields(), 4);
    }

    #[test]
    fn resolve_requires_exact_names()
    {
        assert_eq!(ColumnLayout::resolve("receive_ts;exchange_ts;quantity"), Err(MissingColumn(PRICE_COLUMN)));
        assert_eq!(ColumnLayout::resolve("receive_ts_ms;price"), Err(MissingColumn(TIMESTAMP_COLUMN)));
        assert_eq!(ColumnLayout::resolve("Receive_ts;Price"), Err(MissingColumn(TIMESTAMP_COLUMN)));
        assert_eq!(ColumnLayout::resolve(""), Err(MissingColumn(TIMESTAMP_COLUMN)));
    }

    #[test]
    fn parse_line_extracts_record()
    {
        let layout = ColumnLayout { timestamp: 0, price: 2 };
        let record = layout.parse_line("1716810808663260;1716810808661000;68480.10000000;0.01100000;bid\n").unwrap();
        assert_eq!(record, Record::new(1716810808663260, 68480.1));
    }

    #[test]
    fn parse_line_reports_each_failure()
    {
        let layout = ColumnLayout { timestamp: 0, price: 2 };
        assert_eq!(layout.parse_line("1000;999"), Err(LineError::TooFewFields(3)));
        assert_eq!(layout.parse_line("not_a_number;999;100.0"), Err(LineError::InvalidTimestamp));
        assert_eq!(layout.parse_line("1000;999;abc"), Err(LineError::InvalidPrice));
        assert_eq!(layout.parse_line("1000;999;"), Err(LineError::InvalidPrice));
    }

    #[test]
    fn timestamp_parsing_is_strict()
    {
        assert_eq!(parse_timestamp("0"), Some(0));
        assert_eq!(parse_timestamp("18446744073709551615"), Some(u64::MAX));
        assert_eq!(parse_timestamp("18446744073709551616"), None);
        assert_eq!(parse_timestamp("-1"), None);
        assert_eq!(parse_timestamp("+1"), None);
        assert_eq!(parse_timestamp("12a"), None);
        assert_eq!(parse_timestamp(" 12"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn price_parsing_is_strict()
    {
        assert_eq!(parse_price("100"), Some(100.0));
        assert_eq!(parse_price("68480.10000000"), Some(68480.1));
        assert_eq!(parse_price("-0.5"), Some(-0.5));
        assert_eq!(parse_price("0.123456789012"), Some(0.123456789012));
        assert_eq!(parse_price("1e5"), None);
        assert_eq!(parse_price("inf"), None);
        assert_eq!(parse_price("NaN"), None);
        assert_eq!(parse_price("+1.0"), None);
        assert_eq!(parse_price("1."), None);
        assert_eq!(parse_price(".5"), None);
        assert_eq!(parse_price("1.0.0"), None);
        assert_eq!(parse_price("1.0 "), None);
        assert_eq!(parse_price("-"), None);
    }
}
