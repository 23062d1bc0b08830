pub mod median;

pub use median::MedianCalculator;
