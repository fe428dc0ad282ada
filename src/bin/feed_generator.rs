use clap::Parser;
use lob_mirror::interfaces::tools::FeedGenerator;
use rust_decimal::Decimal;
use std::io::{self, BufWriter, Write};

/// 生成合成订单簿行情（JSON lines），可直接交给 lob-mirror 回放
#[derive(Parser, Debug)]
#[command(name = "feed_generator", version, about = "Synthetic orderbook feed generator")]
struct Args {
    /// 交易对
    #[arg(short, long, default_value = "BTCUSDT")]
    symbol: String,

    /// 最小价格变动
    #[arg(short, long, default_value = "0.1")]
    tick_size: Decimal,

    /// 中间价
    #[arg(short, long, default_value = "50000")]
    mid: Decimal,

    /// 快照每侧档位数
    #[arg(short, long, default_value_t = 50)]
    depth: usize,

    /// 增量条数
    #[arg(short = 'n', long, default_value_t = 10_000)]
    deltas: usize,

    /// 每多少条增量插入一次乱序增量和重新快照（0 = 不插入）
    #[arg(long, default_value_t = 0)]
    stale_every: usize,

    #[arg(long, default_value_t = 1)]
    seed: u64,
}

fn main() -> io::Result<()> {
    let args = Args::parse();
    let mid_ticks = (args.mid / args.tick_size).trunc();
    let mid_ticks = i64::try_from(mid_ticks).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let mut gen = FeedGenerator::new(args.symbol, args.tick_size, mid_ticks, args.depth, args.seed);
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    writeln!(out, "{}", FeedGenerator::frame_text(&gen.snapshot()))?;
    for i in 1..=args.deltas {
        writeln!(out, "{}", FeedGenerator::frame_text(&gen.delta()))?;
        if args.stale_every > 0 && i % args.stale_every == 0 {
            writeln!(out, "{}", FeedGenerator::frame_text(&gen.stale_delta()))?;
            writeln!(out, "{}", FeedGenerator::frame_text(&gen.snapshot()))?;
        }
    }
    out.flush()
}
