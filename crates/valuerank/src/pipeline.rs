//! Screening pipeline: discovery, crawl, aggregation and ranking.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use valuerank_core::{
    FieldSet, ListingSource, Market, Result, ScreenError, SiteAdapter, Table,
};

use crate::valuation::{RankedTable, rank_table};

/// What the first listing page reveals about a market segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Discovery {
    /// Total number of listing pages.
    pub page_count: u32,
    /// Optional fields offered by the filter form, in page order.
    pub fields: FieldSet,
}

/// Result of a complete screening run.
#[derive(Clone, Debug)]
pub struct ScreenReport {
    /// Market segment that was screened.
    pub market: Market,
    /// Total number of listing pages the site reported.
    pub page_count: u32,
    /// Number of pages actually crawled.
    pub pages_crawled: u32,
    /// Fields requested for every page.
    pub fields: FieldSet,
    /// Concatenated page tables, before ranking.
    pub raw: Table,
    /// Ranked securities, best composite rank first.
    pub ranked: RankedTable,
    /// When the run finished.
    pub generated_at: DateTime<Utc>,
}

/// Runs the four-stage screen against a listing source.
///
/// The source performs network I/O and the adapter interprets the markup it
/// returns. Pages are fetched one at a time, in order.
///
/// # Example
///
/// ```rust,ignore
/// use valuerank::{Market, Screener};
///
/// let screener = Screener::naver()?.with_page_limit(2);
/// let report = screener.screen(Market::Primary).await?;
/// for row in report.ranked.top(5) {
///     println!("{} {}", row.security.name, row.rank_value);
/// }
/// ```
pub struct Screener {
    source: Arc<dyn ListingSource>,
    adapter: Arc<dyn SiteAdapter>,
    page_limit: Option<u32>,
}

impl std::fmt::Debug for Screener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Screener")
            .field("source", &self.source.name())
            .field("adapter", &self.adapter.name())
            .field("page_limit", &self.page_limit)
            .finish()
    }
}

impl Screener {
    /// Creates a screener from a listing source and a markup adapter.
    #[must_use]
    pub fn new(source: Arc<dyn ListingSource>, adapter: Arc<dyn SiteAdapter>) -> Self {
        Self {
            source,
            adapter,
            page_limit: None,
        }
    }

    /// Creates a screener for Naver Finance with default settings.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    #[cfg(feature = "naver")]
    pub fn naver() -> Result<Self> {
        Self::with_naver(valuerank_naver::NaverConfig::default())
    }

    /// Creates a screener for Naver Finance with the given settings.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    #[cfg(feature = "naver")]
    pub fn with_naver(config: valuerank_naver::NaverConfig) -> Result<Self> {
        let provider = valuerank_naver::NaverProvider::with_config(config)?;
        Ok(Self::new(
            Arc::new(provider),
            Arc::new(valuerank_naver::NaverAdapter::new()),
        ))
    }

    /// Crawls at most `limit` pages (at least one).
    #[must_use]
    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = Some(limit.max(1));
        self
    }

    /// Returns the page cap, if any.
    #[must_use]
    pub fn page_limit(&self) -> Option<u32> {
        self.page_limit
    }

    fn ensure_supported(&self, market: Market) -> Result<()> {
        if self.source.supported_markets().contains(&market) {
            Ok(())
        } else {
            Err(ScreenError::InvalidParameter(format!(
                "{} does not list the {market} market",
                self.source.name()
            )))
        }
    }

    /// Reads the page count and the available fields from the first page.
    ///
    /// # Errors
    /// Returns an error if the first page cannot be fetched or parsed.
    #[instrument(skip(self))]
    pub async fn discover(&self, market: Market) -> Result<Discovery> {
        self.ensure_supported(market)?;

        let first = self.source.fetch_listing(market, 1).await?;
        let page_count = self.adapter.discover_page_count(&first)?;
        let fields = self.adapter.discover_fields(&first)?;

        if fields.is_empty() {
            warn!(%market, "Filter form offered no recognized fields");
        }
        info!(%market, page_count, %fields, "Discovered listing layout");

        Ok(Discovery { page_count, fields })
    }

    /// Fetches and parses a single page with the given fields selected.
    ///
    /// # Errors
    /// Returns an error naming the page if fetching or parsing fails.
    #[instrument(skip(self, fields))]
    pub async fn crawl_page(&self, market: Market, page: u32, fields: &FieldSet) -> Result<Table> {
        let listing = self.source.fetch_table_page(market, page, fields).await?;
        let table = self.adapter.parse_table(&listing)?;
        debug!(page, rows = table.height(), "Parsed listing page");
        Ok(table)
    }

    /// Runs discovery, crawls every page in order and ranks the result.
    ///
    /// Any failing page aborts the run.
    ///
    /// # Errors
    /// Returns the first fetch, parse or data error encountered.
    #[instrument(skip(self))]
    pub async fn screen(&self, market: Market) -> Result<ScreenReport> {
        let Discovery { page_count, fields } = self.discover(market).await?;

        let pages = self
            .page_limit
            .map_or(page_count, |limit| limit.min(page_count));
        if pages < page_count {
            info!(page_count, pages, "Page limit caps the crawl");
        }

        let mut tables = Vec::with_capacity(pages as usize);
        for page in 1..=pages {
            tables.push(self.crawl_page(market, page, &fields).await?);
        }

        let raw = Table::concat(tables)?;
        info!(rows = raw.height(), pages, "Aggregated listing pages");

        let ranked = rank_table(&raw, &self.adapter.column_map())?;

        Ok(ScreenReport {
            market,
            page_count,
            pages_crawled: pages,
            fields,
            raw,
            ranked,
            generated_at: Utc::now(),
        })
    }
}
