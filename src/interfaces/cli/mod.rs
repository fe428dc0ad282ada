/// CLI Interface Module
///
/// Replays a recorded feed (one JSON frame per line) into a `BookStore` and
/// prints the resulting top of book. With `--metrics-port` set, the
/// observability server stays up after the replay until Ctrl-C.
///
/// ## Responsibilities
/// - Parse command-line arguments
/// - Load the instrument catalog
/// - Feed every line through `FeedRouter`
/// - Serve `/metrics` and `/health` while running

use crate::application::{BookStore, FeedRouter, Routed, StoreContext};
use crate::domain::instrument::StaticCatalog;
use crate::domain::orderbook::{BookKind, Quote};
use crate::domain::replica::BookConfig;
use crate::infrastructure::ObservabilityServer;
use crate::shared::error::StoreError;
use clap::Parser;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

/// 订单簿副本命令行配置
#[derive(Parser, Debug, Clone)]
#[command(name = "lob-mirror")]
#[command(version)]
#[command(about = "本地订单簿副本：回放行情并维护买卖盘", long_about = None)]
pub struct CliConfig {
    /// 行情文件（JSON lines），"-" 表示标准输入
    #[arg(short, long, default_value = "-")]
    pub input: String,

    /// 合约元数据（JSON 数组，含 tickSize）
    #[arg(short, long)]
    pub catalog: Option<PathBuf>,

    /// 订单簿实现
    #[arg(short, long, default_value = "windowed")]
    pub book: BookKind,

    /// 价格窗口在快照范围外的扩展比例
    #[arg(long, default_value = "0.01", value_parser = parse_window_offset)]
    pub window_offset: Decimal,

    /// 发布视图每侧保留的档位数（0表示全部）
    #[arg(long, default_value_t = 0)]
    pub view_depth: usize,

    /// tokio 工作线程数（0表示自动检测CPU核心数）
    #[arg(short = 'w', long, default_value_t = 0)]
    pub worker_threads: usize,

    /// 可观测性HTTP端口（0表示不启动）
    #[arg(short = 'm', long, default_value_t = 0)]
    pub metrics_port: u16,

    /// 日志级别
    #[arg(short = 'l', long, default_value = "info", value_parser = ["trace", "debug", "info", "warn", "error"])]
    pub log_level: String,

    /// 仅显示配置不回放
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

fn parse_window_offset(s: &str) -> Result<Decimal, String> {
    let offset: Decimal = s.parse().map_err(|e| format!("{e}"))?;
    let config = BookConfig {
        window_offset: offset,
        ..BookConfig::default()
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(offset)
}

impl CliConfig {
    pub fn book_config(&self) -> BookConfig {
        BookConfig {
            kind: self.book,
            window_offset: self.window_offset,
            view_depth: (self.view_depth > 0).then_some(self.view_depth),
            ..BookConfig::default()
        }
    }

    pub fn worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            num_cpus::get()
        } else {
            self.worker_threads
        }
    }
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid catalog: {0}")]
    Catalog(#[from] serde_json::Error),

    #[error("no instrument catalog given (use --catalog)")]
    MissingCatalog,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// 回放统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub lines: u64,
    pub orderbook: u64,
    pub klines: u64,
    pub acks: u64,
    pub errors: u64,
}

pub async fn load_catalog(path: &Path) -> Result<StaticCatalog, CliError> {
    let json = tokio::fs::read_to_string(path).await?;
    Ok(StaticCatalog::from_json(&json)?)
}

/// Build an empty store on the current runtime from the catalog and book flags.
pub async fn build_store(config: &CliConfig) -> Result<BookStore, CliError> {
    let path = config.catalog.as_ref().ok_or(CliError::MissingCatalog)?;
    let catalog = load_catalog(path).await?;
    info!(instruments = catalog.len(), path = %path.display(), "catalog loaded");

    let context = StoreContext::current(catalog.into_shared(), config.book_config())?;
    Ok(BookStore::new(context))
}

/// Feed every line of `--input` through a router on `store`, then wait for
/// all lanes to drain.
///
/// Bad frames are logged and counted; they never stop the replay.
pub async fn replay(store: &BookStore, config: &CliConfig) -> Result<ReplaySummary, CliError> {
    let reader: Box<dyn AsyncBufRead + Unpin + Send> = if config.input == "-" {
        Box::new(BufReader::new(tokio::io::stdin()))
    } else {
        Box::new(BufReader::new(File::open(&config.input).await?))
    };

    let router = FeedRouter::new(store.clone());
    let mut summary = ReplaySummary::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        summary.lines += 1;

        match router.handle_text(line) {
            Ok(Routed::Orderbook) => summary.orderbook += 1,
            Ok(Routed::Kline) => summary.klines += 1,
            Ok(Routed::Ack) => summary.acks += 1,
            Err(e) => {
                summary.errors += 1;
                warn!(line = summary.lines, error = %e, "frame skipped");
            }
        }
    }

    store.flush_all().await?;
    info!(?summary, "replay finished");
    Ok(summary)
}

/// Runs the CLI application
pub async fn run(config: CliConfig) -> Result<(), CliError> {
    info!("订单簿副本启动");
    info!("配置: {:?}", config);

    println!("========================================");
    println!("  本地订单簿副本 v{}", env!("CARGO_PKG_VERSION"));
    println!("========================================");
    println!("行情输入:     {}", config.input);
    println!("订单簿实现:   {:?}", config.book);
    println!("窗口扩展:     {}", config.window_offset);
    println!("工作线程:     {}", config.worker_threads());
    println!("指标端口:     {}", if config.metrics_port == 0 { "禁用".to_string() } else { config.metrics_port.to_string() });
    println!("日志级别:     {}", config.log_level);
    println!("========================================");

    if config.dry_run {
        println!("\nDry-run 模式 - 不回放行情");
        return Ok(());
    }

    let store = build_store(&config).await?;

    if config.metrics_port != 0 {
        let server = ObservabilityServer::new(config.metrics_port, store.clone());
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!(error = %e, "observability server stopped");
            }
        });
    }

    let summary = replay(&store, &config).await?;
    print_summary(&store, &summary);

    if config.metrics_port != 0 {
        info!("回放完成，按 Ctrl-C 退出");
        tokio::signal::ctrl_c().await?;
    }

    store.shutdown();
    Ok(())
}

fn print_summary(store: &BookStore, summary: &ReplaySummary) {
    println!(
        "\n行数 {}  订单簿 {}  K线 {}  应答 {}  错误 {}",
        summary.lines, summary.orderbook, summary.klines, summary.acks, summary.errors
    );

    let fmt_quote = |q: Option<Quote>| {
        q.map(|q| format!("{} x {}", q.price, q.size))
            .unwrap_or_else(|| "-".to_string())
    };
    for symbol in store.symbols() {
        let Some(view) = store.view(&symbol) else {
            continue;
        };
        println!(
            "{:<12} valid={:<5} u={:<10} bid {:<24} ask {:<24} delay {}ms",
            symbol,
            view.valid,
            view.last_update_id,
            fmt_quote(view.best_bid),
            fmt_quote(view.best_ask),
            view.delay_ms,
        );
    }
}

/// 初始化日志系统
pub fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
