//! 基于双堆的增量中位数。
//!
//! - `lower`：较小的一半，大顶堆；
//! - `upper`：较大的一半，小顶堆。
//!
//! 每次插入后保持 `lower.len() == upper.len()` 或 `lower.len() == upper.len() + 1`，
//! 且 `lower` 中每个元素都不大于 `upper` 中的任意元素，插入与取中位数均为 O(log n)。

use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
};

/// 以 `f64::total_cmp` 定义全序的价格，使其可以放入 `BinaryHeap`。
#[derive(Copy, Clone, Debug)]
struct Price(f64);

impl PartialEq for Price
{
    fn eq(&self, other: &Self) -> bool
    {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Price {}

impl PartialOrd for Price
{
    fn partial_cmp(&self, other: &Self) -> Option<Ordering>
    {
        Some(self.cmp(other))
    }
}

impl Ord for Price
{
    fn cmp(&self, other: &Self) -> Ordering
    {
        self.0.total_cmp(&other.0)
    }
}

/// 增量中位数计算器，并记录最近一次插入是否改变了中位数。
#[derive(Clone, Debug, Default)]
pub struct MedianCalculator
{
    lower: BinaryHeap<Price>,
    upper: BinaryHeap<Reverse<Price>>,
    last_median: Option<f64>,
    changed: bool,
}

impl MedianCalculator
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// 插入一个新值并重新计算中位数。
    ///
    /// `is_changed()` 随后反映新中位数是否与插入前的值不同（精确比较，无容差）；
    /// 第一次插入总是视为变化，与插入的值无关。
    pub fn add(&mut self, value: f64)
    {
        let value = Price(value);
        match self.lower.peek() {
            | Some(top) if value > *top => self.upper.push(Reverse(value)),
            | _ => self.lower.push(value),
        }

        self.balance();

        let median = self.compute_median();
        self.changed = self.last_median.map(|previous| previous != median).unwrap_or(true);
        self.last_median = Some(median);
    }

    /// 当前中位数，尚未插入任何值时为 `None`。
    pub fn median(&self) -> Option<f64>
    {
        self.last_median
    }

    /// 最近一次 `add` 是否改变了中位数
    pub fn is_changed(&self) -> bool
    {
        self.changed
    }

    /// 已插入的值的总数
    pub fn count(&self) -> usize
    {
        self.lower.len() + self.upper.len()
    }

    pub fn has_values(&self) -> bool
    {
        !self.lower.is_empty()
    }

    /// `(lower.len(), upper.len())`
    pub fn halves(&self) -> (usize, usize)
    {
        (self.lower.len(), self.upper.len())
    }

    // 路由之后两边大小最多相差 2，一次移动即可恢复平衡
    fn balance(&mut self)
    {
        if self.lower.len() > self.upper.len() + 1 {
            if let Some(top) = self.lower.pop() {
                self.upper.push(Reverse(top));
            }
        }
        else if self.upper.len() > self.lower.len() {
            if let Some(Reverse(bottom)) = self.upper.pop() {
                self.lower.push(bottom);
            }
        }
    }

    fn compute_median(&self) -> f64
    {
        match (self.lower.peek(), self.upper.peek()) {
            | (Some(low), Some(Reverse(high))) if self.lower.len() == self.upper.len() => (low.0 + high.0) / 2.0,
            | (Some(low), _) => low.0,
            | (None, _) => f64::NAN,
        }
    }
}

#[cfg(test)]
mod tests
{
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    fn brute_force_median(values: &[f64]) -> f64
    {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        match sorted.len() % 2 {
            | 0 => (sorted[mid - 1] + sorted[mid]) / 2.0,
            | _ => sorted[mid],
        }
    }

    #[test]
    fn initial_state_is_empty()
    {
        let calc = MedianCalculator::new();
        assert!(!calc.has_values());
        assert_eq!(calc.count(), 0);
        assert_eq!(calc.median(), None);
        assert!(!calc.is_changed());
    }

    #[test]
    fn basic_medians()
    {
        let mut calc = MedianCalculator::new();

        calc.add(100.0);
        assert!(calc.has_values());
        assert_eq!(calc.count(), 1);
        assert_eq!(calc.median(), Some(100.0));
        assert!(calc.is_changed());

        calc.add(102.0);
        assert_eq!(calc.median(), Some(101.0));
        assert!(calc.is_changed());

        // [99, 100, 102]
        calc.add(99.0);
        assert_eq!(calc.median(), Some(100.0));
        assert!(calc.is_changed());
    }

    #[test]
    fn repeated_prices_report_change_only_when_value_moves()
    {
        let mut calc = MedianCalculator::new();
        let mut changes = Vec::new();
        for price in [5.0, 5.0, 5.0, 10.0, 10.0, 10.0] {
            calc.add(price);
            changes.push(calc.is_changed());
        }
        assert_eq!(changes, vec![true, false, false, false, false, true]);
        assert_eq!(calc.median(), Some(7.5));
    }

    #[test]
    fn market_prices_sequence()
    {
        let mut calc = MedianCalculator::new();
        let steps = [(68480.10, 68480.10, true), (68480.00, 68480.05, true), (68480.10, 68480.10, true), (68480.10, 68480.10, false)];
        for (price, expected, changed) in steps {
            calc.add(price);
            assert!((calc.median().unwrap() - expected).abs() < 1e-9);
            assert_eq!(calc.is_changed(), changed);
        }
    }

    #[test]
    fn first_value_of_zero_is_still_a_change()
    {
        let mut calc = MedianCalculator::new();
        calc.add(0.0);
        assert!(calc.is_changed());
        assert_eq!(calc.median(), Some(0.0));

        calc.add(0.0);
        assert!(!calc.is_changed());
    }

    #[test]
    fn random_sequences_match_brute_force_and_keep_invariants()
    {
        let mut rng = StdRng::seed_from_u64(20240527);
        for _ in 0..50 {
            let len = rng.gen_range(1..200);
            let mut calc = MedianCalculator::new();
            let mut seen = Vec::with_capacity(len);
            let mut previous: Option<f64> = None;

            for _ in 0..len {
                // 少量离散价格，保证大量重复值
                let value = rng.gen_range(0..20) as f64 * 0.5 + 68000.0;
                calc.add(value);
                seen.push(value);

                let (lower, upper) = calc.halves();
                assert!(lower == upper || lower == upper + 1, "lower={} upper={}", lower, upper);
                assert_eq!(calc.count(), seen.len());

                let median = calc.median().unwrap();
                assert_eq!(median, brute_force_median(&seen));
                assert_eq!(calc.is_changed(), previous.map(|p| p != median).unwrap_or(true));
                previous = Some(median);
            }
        }
    }

    #[test]
    fn lower_half_never_exceeds_upper_half()
    {
        let mut calc = MedianCalculator::new();
        for value in [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0, 5.0, 3.0, 5.0] {
            calc.add(value);
            if let (Some(low), Some(Reverse(high))) = (calc.lower.peek(), calc.upper.peek()) {
                assert!(low.0 <= high.0);
            }
        }
        assert_eq!(calc.median(), Some(4.0));
    }
}
