//! CLI definition, tracing setup and the screening run.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use valuerank::{Market, NaverConfig, RankedRow, Screener, write_ranked, write_raw};

/// Rank a market segment's securities by book-to-price and earnings yield.
#[derive(Debug, Parser)]
#[command(
    name = "valuerank",
    version,
    about = "Scrape a market listing and rank securities by composite value.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Market segment: primary (kospi, 0) or secondary (kosdaq, 1).
    #[arg(env = "VALUERANK_MARKET", default_value = "primary")]
    pub(crate) market: Market,

    /// Ranked output file; the extension selects csv, parquet or json.
    #[arg(short, long, env = "VALUERANK_OUTPUT", default_value = "result_data.csv")]
    pub(crate) output: PathBuf,

    /// Also write the unranked concatenated listing to this file.
    #[arg(long, env = "VALUERANK_RAW_OUTPUT")]
    pub(crate) raw_output: Option<PathBuf>,

    /// Number of best-ranked names to print.
    #[arg(long, env = "VALUERANK_TOP", default_value_t = 20)]
    pub(crate) top: usize,

    /// Crawl at most this many listing pages.
    #[arg(long, env = "VALUERANK_MAX_PAGES")]
    pub(crate) max_pages: Option<u32>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "VALUERANK_TIMEOUT", default_value_t = 30)]
    pub(crate) timeout: u64,

    /// Minimum delay between requests in milliseconds.
    #[arg(long, env = "VALUERANK_RATE_LIMIT_MS", default_value_t = 500)]
    pub(crate) rate_limit_ms: u64,

    /// Retries after a transport error or server error response.
    #[arg(long, env = "VALUERANK_RETRIES", default_value_t = 2)]
    pub(crate) retries: u32,

    /// Override the listing site's base URL.
    #[arg(long, env = "VALUERANK_BASE_URL")]
    pub(crate) base_url: Option<String>,

    /// Log format: text (default) or json.
    #[arg(long, env = "VALUERANK_LOG_FORMAT", default_value = "text")]
    pub(crate) log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub(crate) verbose: u8,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "valuerank=info",
        1 => "valuerank=debug,valuerank_naver=debug",
        _ => "valuerank=trace,valuerank_naver=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

impl Cli {
    fn naver_config(&self) -> NaverConfig {
        let defaults = NaverConfig::default();
        let backoff = defaults.retry_backoff;
        let config = defaults
            .with_timeout(Duration::from_secs(self.timeout))
            .with_rate_limit(Duration::from_millis(self.rate_limit_ms))
            .with_retries(self.retries, backoff);

        match &self.base_url {
            Some(url) => config.with_base_url(url.as_str()),
            None => config,
        }
    }
}

/// Run a screen and write its results.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let mut screener =
        Screener::with_naver(cli.naver_config()).context("failed to set up the listing client")?;
    if let Some(max_pages) = cli.max_pages {
        screener = screener.with_page_limit(max_pages);
    }

    let report = screener
        .screen(cli.market)
        .await
        .with_context(|| format!("screening the {} market failed", cli.market))?;

    let format = write_ranked(&report.ranked, &cli.output)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;
    info!(
        path = %cli.output.display(),
        ?format,
        rows = report.ranked.len(),
        "Saved ranked table"
    );

    if let Some(raw_output) = &cli.raw_output {
        write_raw(&report.raw, raw_output)
            .with_context(|| format!("failed to write {}", raw_output.display()))?;
    }

    println!(
        "{} market, {} of {} pages, generated {}",
        report.market,
        report.pages_crawled,
        report.page_count,
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    for (position, row) in report.ranked.top(cli.top).iter().enumerate() {
        println!("{}", summary_line(position + 1, row));
    }

    Ok(())
}

fn summary_line(position: usize, row: &RankedRow) -> String {
    format!(
        "{position:>3}. {} (rank {:.1}, BPR #{}, 1/PER #{})",
        row.security.name, row.rank_value, row.rank_bpr, row.rank_earnings_yield
    )
}
