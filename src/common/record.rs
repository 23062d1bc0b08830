use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// 单条行情观测：接收时间戳与价格。
///
/// 生成后不可变，只按值比较；相同时间戳的多条记录都是合法的。
#[derive(Copy, Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct Record
{
    pub timestamp: u64, // receive_ts 列
    pub price: f64,     // price 列
}

impl Record
{
    pub fn new(timestamp: u64, price: f64) -> Self
    {
        Self { timestamp, price }
    }
}

impl From<(u64, f64)> for Record
{
    fn from((timestamp, price): (u64, f64)) -> Self
    {
        Self { timestamp, price }
    }
}

impl Display for Record
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result
    {
        write!(f, "({}, {})", self.timestamp, self.price)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn record_from_tuple_keeps_fields()
    {
        let record = Record::from((1000, 100.5));
        assert_eq!(record, Record::new(1000, 100.5));
        assert_eq!(format!("{}", record), "(1000, 100.5)");
    }
}
