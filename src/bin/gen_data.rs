//! 生成测试用的成交与盘口 CSV 文件。
//!
//! 每对文件包含一个 `trade_<n>.csv`（`receive_ts;exchange_ts;price;quantity;side`）
//! 和一个 `level_<n>.csv`（额外的 `rebuild` 列，同一时间戳下有 1..=5 个价位），
//! 价格以随机游走方式生成，时间戳严格递增。

use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;
use rand::{rngs::StdRng, Rng, SeedableRng};

const BASE_PRICE: f64 = 68_000.0;
const PRICE_VOLATILITY: f64 = 0.0005;
const START_TS: u64 = 1_716_810_808_000_000;
const TS_STEP_MIN: u64 = 100;
const TS_STEP_MAX: u64 = 5_000;
const SIDES: [&str; 2] = ["bid", "ask"];

#[derive(Parser, Debug)]
#[command(name = "gen_data", about = "Generate trade/level CSV files for tick_median")]
struct Args
{
    /// Output directory
    #[arg(default_value = "input")]
    output: PathBuf,

    /// Target size of each file in megabytes
    #[arg(long, default_value_t = 50)]
    megabytes: u64,

    /// Number of trade/level file pairs
    #[arg(long, default_value_t = 1)]
    pairs: usize,

    /// RNG seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

struct Walk
{
    rng: StdRng,
    timestamp: u64,
    price: f64,
}

impl Walk
{
    fn new(rng: StdRng, start: u64) -> Self
    {
        Self { rng, timestamp: start, price: BASE_PRICE }
    }

    fn step(&mut self) -> (u64, u64, f64)
    {
        self.price *= 1.0 + self.rng.gen_range(-PRICE_VOLATILITY..=PRICE_VOLATILITY);
        self.timestamp += self.rng.gen_range(TS_STEP_MIN..=TS_STEP_MAX);
        let exchange_ts = self.timestamp - self.rng.gen_range(500..=3_000);
        (self.timestamp, exchange_ts, self.price)
    }
}

fn generate_trade(path: &Path, target_bytes: u64, seed: u64) -> io::Result<u64>
{
    let mut out = BufWriter::with_capacity(1 << 20, File::create(path)?);
    let mut walk = Walk::new(StdRng::seed_from_u64(seed), START_TS);
    let mut written = 0;

    writeln!(out, "receive_ts;exchange_ts;price;quantity;side")?;
    while written < target_bytes {
        let (ts, exchange_ts, price) = walk.step();
        let quantity = walk.rng.gen_range(0.001..5.0);
        let side = SIDES[walk.rng.gen_range(0..SIDES.len())];

        let line = format!("{};{};{:.8};{:.8};{}\n", ts, exchange_ts, price, quantity, side);
        out.write_all(line.as_bytes())?;
        written += line.len() as u64;
    }
    out.flush()?;
    Ok(written)
}

fn generate_level(path: &Path, target_bytes: u64, seed: u64) -> io::Result<u64>
{
    let mut out = BufWriter::with_capacity(1 << 20, File::create(path)?);
    let mut rng = StdRng::seed_from_u64(seed);
    let start = START_TS + rng.gen_range(0..=10_000);
    let mut walk = Walk::new(rng, start);
    let mut written = 0;

    writeln!(out, "receive_ts;exchange_ts;price;quantity;side;rebuild")?;
    while written < target_bytes {
        let (ts, exchange_ts, price) = walk.step();
        let levels = walk.rng.gen_range(1..=5);

        for level in 0..levels {
            let level_price = price + walk.rng.gen_range(-50.0..=50.0);
            let quantity = walk.rng.gen_range(0.001..20.0);
            let side = SIDES[walk.rng.gen_range(0..SIDES.len())];
            let rebuild = u8::from(level == 0);

            let line = format!("{};{};{:.8};{:.8};{};{}\n", ts, exchange_ts, level_price, quantity, side, rebuild);
            out.write_all(line.as_bytes())?;
            written += line.len() as u64;
        }
    }
    out.flush()?;
    Ok(written)
}

fn run(args: &Args) -> io::Result<()>
{
    fs::create_dir_all(&args.output)?;
    let target_bytes = args.megabytes * 1024 * 1024;

    let mut total = 0;
    for pair in 0..args.pairs {
        let seed = args.seed.wrapping_add(pair as u64 * 2);
        let trade = args.output.join(format!("trade_{}.csv", pair));
        let level = args.output.join(format!("level_{}.csv", pair));

        total += generate_trade(&trade, target_bytes, seed)?;
        println!("  -> {}", trade.display());
        total += generate_level(&level, target_bytes, seed + 1)?;
        println!("  -> {}", level.display());
    }

    println!("done: {:.1} MB in {}", total as f64 / 1024.0 / 1024.0, args.output.display());
    Ok(())
}

fn main() -> ExitCode
{
    let args = Args::parse();
    match run(&args) {
        | Ok(()) => ExitCode::SUCCESS,
        | Err(e) => {
            eprintln!("gen_data failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
