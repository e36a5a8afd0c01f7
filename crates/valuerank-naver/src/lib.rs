#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/valuerank/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Naver Finance market summary source.
//!
//! This crate provides [`NaverProvider`], which implements the
//! [`ListingSource`] trait from `valuerank-core`, and [`NaverAdapter`], which
//! implements [`SiteAdapter`](valuerank_core::SiteAdapter) for the market
//! summary markup.
//!
//! # Features
//!
//! - Listing and field-submit requests for both market segments
//! - Per-request timeout and rate limiting (500ms between requests by default)
//! - Retry with exponential backoff on transport errors and 5xx responses
//! - EUC-KR response decoding
//!
//! # Example
//!
//! ```no_run
//! use valuerank_core::{ListingSource, Market, SiteAdapter};
//! use valuerank_naver::{NaverAdapter, NaverProvider};
//!
//! # async fn example() -> valuerank_core::Result<()> {
//! let provider = NaverProvider::new()?;
//! let first = provider.fetch_listing(Market::Primary, 1).await?;
//! let pages = NaverAdapter.discover_page_count(&first)?;
//! println!("{} pages", pages);
//! # Ok(())
//! # }
//! ```

mod adapter;

pub use adapter::NaverAdapter;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use encoding_rs::EUC_KR;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};
use url::Url;
use valuerank_core::{
    FieldSet, ListingPage, ListingSource, Market, Result, ScreenError, Site, Stage,
};

/// Naver Finance base URL.
const BASE_URL: &str = "https://finance.naver.com";

/// Market summary listing path.
const LISTING_PATH: &str = "/sise/sise_market_sum.nhn";

/// Field selection form endpoint.
const FIELD_SUBMIT_PATH: &str = "/sise/field_submit.nhn";

/// Menu identifier of the market summary listing.
const MENU: &str = "market_sum";

/// Default rate limit delay in milliseconds.
const DEFAULT_RATE_LIMIT_MS: u64 = 500;

/// Default per-request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of retries after a failed request.
const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default delay before the first retry; doubles on each further retry.
const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;

/// User agent for HTTP requests.
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

/// Settings for [`NaverProvider`].
#[derive(Clone, Debug)]
pub struct NaverConfig {
    /// Scheme and host requests are sent to.
    pub base_url: String,
    /// Timeout applied to every request.
    pub timeout: Duration,
    /// Minimum spacing between requests.
    pub rate_limit: Duration,
    /// Retries after a transport error or 5xx response.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub retry_backoff: Duration,
    /// User agent header.
    pub user_agent: String,
}

impl Default for NaverConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            rate_limit: Duration::from_millis(DEFAULT_RATE_LIMIT_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl NaverConfig {
    /// Sets the base URL, e.g. to point at a mirror or a mock server.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the minimum spacing between requests.
    #[must_use]
    pub const fn with_rate_limit(mut self, rate_limit: Duration) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Sets the retry count and the initial backoff delay.
    #[must_use]
    pub const fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = backoff;
        self
    }
}

/// Rate limiter spacing consecutive requests
#[derive(Debug)]
struct RateLimiter {
    last_request: Option<Instant>,
    min_interval: Duration,
}

impl RateLimiter {
    const fn new(min_interval: Duration) -> Self {
        Self {
            last_request: None,
            min_interval,
        }
    }

    async fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                debug!("Rate limiting: waiting {}ms", wait_time.as_millis());
                sleep(wait_time).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}

/// Naver Finance market summary provider.
///
/// Implements [`ListingSource`]. Pair it with [`NaverAdapter`] to parse the
/// pages it returns.
#[derive(Debug)]
pub struct NaverProvider {
    client: reqwest::Client,
    config: NaverConfig,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl NaverProvider {
    /// Create a new provider with default settings.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Self::with_config(NaverConfig::default())
    }

    /// Create a new provider with custom settings.
    ///
    /// The client keeps cookies, which the field-submit endpoint uses to carry
    /// the selected fields across its redirect back to the listing.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_config(config: NaverConfig) -> Result<Self> {
        parse_base(&config.base_url)?;

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .cookie_store(true)
            .build()
            .map_err(|e| {
                ScreenError::InvalidParameter(format!("failed to create HTTP client: {e}"))
            })?;

        Ok(Self::with_client(client, config))
    }

    /// Create a new provider with a custom HTTP client.
    ///
    /// The client's own timeout and cookie settings apply; rate limiting and
    /// retries still follow `config`.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: NaverConfig) -> Self {
        let rate_limiter = Arc::new(Mutex::new(RateLimiter::new(config.rate_limit)));
        Self {
            client,
            config,
            rate_limiter,
        }
    }

    /// Returns the provider settings.
    #[must_use]
    pub const fn config(&self) -> &NaverConfig {
        &self.config
    }

    /// Resolve an endpoint path against the configured base URL.
    fn endpoint(&self, path: &str) -> Result<Url> {
        parse_base(&self.config.base_url)?.join(path).map_err(|e| {
            ScreenError::InvalidParameter(format!("invalid endpoint path '{path}': {e}"))
        })
    }

    /// Build the listing URL for a market and page.
    fn listing_url(&self, market: Market, page: u32) -> Result<Url> {
        let mut url = self.endpoint(LISTING_PATH)?;
        url.query_pairs_mut()
            .append_pair("sosok", &market.code().to_string())
            .append_pair("page", &page.to_string());
        Ok(url)
    }

    /// Build the form body selecting `fields` for a listing page.
    fn field_form(
        &self,
        market: Market,
        page: u32,
        fields: &FieldSet,
    ) -> Result<Vec<(&'static str, String)>> {
        let mut form = vec![
            ("menu", MENU.to_string()),
            ("returnUrl", self.listing_url(market, page)?.into()),
        ];
        form.extend(fields.ids().map(|id| ("fieldIds", id.to_string())));
        Ok(form)
    }

    /// Send a request, retrying transport errors and 5xx responses, and
    /// return the EUC-KR decoded body.
    async fn send(
        &self,
        stage: Stage,
        request: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<String> {
        let mut attempt = 0;
        loop {
            self.rate_limiter.lock().await.wait().await;

            let retryable = match request().send().await {
                Ok(response) if response.status().is_success() => {
                    let bytes = response
                        .bytes()
                        .await
                        .map_err(|e| ScreenError::fetch(stage, e.to_string()))?;
                    return Ok(decode(&bytes, stage));
                }
                Ok(response) if response.status().is_server_error() => {
                    format!("HTTP {}", response.status())
                }
                Ok(response) => {
                    return Err(ScreenError::fetch(
                        stage,
                        format!("HTTP {}", response.status()),
                    ));
                }
                Err(e) if e.is_timeout() || e.is_connect() || e.is_request() => e.to_string(),
                Err(e) => return Err(ScreenError::fetch(stage, e.to_string())),
            };

            if attempt >= self.config.max_retries {
                return Err(ScreenError::fetch(
                    stage,
                    format!("{} (after {} attempts)", retryable, attempt + 1),
                ));
            }

            let backoff = self.config.retry_backoff * 2u32.saturating_pow(attempt);
            warn!(
                %stage,
                attempt = attempt + 1,
                error = %retryable,
                "Request failed, retrying in {}ms",
                backoff.as_millis()
            );
            sleep(backoff).await;
            attempt += 1;
        }
    }
}

fn parse_base(base_url: &str) -> Result<Url> {
    Url::parse(base_url)
        .map_err(|e| ScreenError::InvalidParameter(format!("invalid base URL '{base_url}': {e}")))
}

/// Decode an EUC-KR response body.
fn decode(bytes: &[u8], stage: Stage) -> String {
    let (text, _, had_errors) = EUC_KR.decode(bytes);
    if had_errors {
        warn!(%stage, "Malformed EUC-KR sequences replaced while decoding response");
    }
    text.into_owned()
}

impl Site for NaverProvider {
    fn name(&self) -> &str {
        "Naver Finance"
    }

    fn description(&self) -> &str {
        "Naver Finance market summary listings for KOSPI and KOSDAQ"
    }

    fn supported_markets(&self) -> &[Market] {
        &[Market::Primary, Market::Secondary]
    }
}

#[async_trait]
impl ListingSource for NaverProvider {
    async fn fetch_listing(&self, market: Market, page: u32) -> Result<ListingPage> {
        let stage = if page == 1 {
            Stage::PageCount
        } else {
            Stage::Page(page)
        };
        let url = self.listing_url(market, page)?;
        debug!("Fetching listing: {}", url);

        let markup = self.send(stage, || self.client.get(url.clone())).await?;
        Ok(ListingPage::new(market, page, markup))
    }

    async fn fetch_table_page(
        &self,
        market: Market,
        page: u32,
        fields: &FieldSet,
    ) -> Result<ListingPage> {
        if page == 0 {
            return Err(ScreenError::InvalidParameter(
                "page numbers start at 1".to_string(),
            ));
        }

        let url = self.endpoint(FIELD_SUBMIT_PATH)?;
        let form = self.field_form(market, page, fields)?;
        debug!(%market, page, fields = %fields, "Submitting field selection");

        let markup = self
            .send(Stage::Page(page), || self.client.post(url.clone()).form(&form))
            .await?;
        Ok(ListingPage::new(market, page, markup))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use valuerank_core::MetricField;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> NaverConfig {
        NaverConfig::default()
            .with_base_url(server.uri())
            .with_rate_limit(Duration::ZERO)
            .with_retries(2, Duration::from_millis(1))
    }

    fn euc_kr(text: &str) -> Vec<u8> {
        let (bytes, _, _) = EUC_KR.encode(text);
        bytes.into_owned()
    }

    #[test]
    fn test_listing_url() {
        let provider = NaverProvider::new().unwrap();
        assert_eq!(
            provider.listing_url(Market::Secondary, 3).unwrap().as_str(),
            "https://finance.naver.com/sise/sise_market_sum.nhn?sosok=1&page=3"
        );
    }

    #[test]
    fn test_listing_url_under_mock_base() {
        let config = NaverConfig::default().with_base_url("http://127.0.0.1:8080/");
        let provider = NaverProvider::with_config(config).unwrap();
        assert_eq!(
            provider.listing_url(Market::Primary, 12).unwrap().as_str(),
            "http://127.0.0.1:8080/sise/sise_market_sum.nhn?sosok=0&page=12"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let config = NaverConfig::default().with_base_url("finance.naver.com");
        let err = NaverProvider::with_config(config).unwrap_err();
        assert!(matches!(err, ScreenError::InvalidParameter(_)));
    }

    #[test]
    fn test_field_form() {
        let provider = NaverProvider::new().unwrap();
        let fields: FieldSet = [MetricField::Per, MetricField::DebtTotal].into_iter().collect();

        let form = provider.field_form(Market::Primary, 2, &fields).unwrap();

        assert_eq!(form[0], ("menu", "market_sum".to_string()));
        assert_eq!(
            form[1],
            (
                "returnUrl",
                "https://finance.naver.com/sise/sise_market_sum.nhn?sosok=0&page=2".to_string()
            )
        );
        assert_eq!(form[2], ("fieldIds", "per".to_string()));
        assert_eq!(form[3], ("fieldIds", "debt_total".to_string()));
    }

    #[test]
    fn test_provider_info() {
        let provider = NaverProvider::new().unwrap();
        assert_eq!(provider.name(), "Naver Finance");
        assert!(provider.supported_markets().contains(&Market::Secondary));
        assert_eq!(provider.config().max_retries, DEFAULT_MAX_RETRIES);
    }

    #[tokio::test]
    async fn test_fetch_listing_decodes_euc_kr() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(LISTING_PATH))
            .and(query_param("sosok", "1"))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(euc_kr("<html><body><p>코스닥 시가총액</p></body></html>")),
            )
            .mount(&server)
            .await;

        let provider = NaverProvider::with_config(test_config(&server)).unwrap();
        let page = provider.fetch_listing(Market::Secondary, 1).await.unwrap();

        assert_eq!(page.page, 1);
        assert_eq!(page.market, Market::Secondary);
        assert!(page.markup.contains("코스닥 시가총액"));
    }

    #[tokio::test]
    async fn test_fetch_listing_not_found_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(LISTING_PATH))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let provider = NaverProvider::with_config(test_config(&server)).unwrap();
        let err = provider.fetch_listing(Market::Primary, 1).await.unwrap_err();

        assert!(matches!(
            err,
            ScreenError::Fetch {
                stage: Stage::PageCount,
                ..
            }
        ));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(LISTING_PATH))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(LISTING_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(euc_kr("<p>ok</p>")))
            .mount(&server)
            .await;

        let provider = NaverProvider::with_config(test_config(&server)).unwrap();
        let page = provider.fetch_listing(Market::Primary, 1).await.unwrap();

        assert!(page.markup.contains("ok"));
    }

    #[tokio::test]
    async fn test_timeouts_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(LISTING_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(euc_kr("<p>늦음</p>"))
                    .set_delay(Duration::from_millis(500)),
            )
            .expect(2)
            .mount(&server)
            .await;

        let config = test_config(&server)
            .with_timeout(Duration::from_millis(50))
            .with_retries(1, Duration::from_millis(1));
        let provider = NaverProvider::with_config(config).unwrap();
        let err = provider.fetch_listing(Market::Primary, 1).await.unwrap_err();

        assert!(matches!(
            err,
            ScreenError::Fetch {
                stage: Stage::PageCount,
                ..
            }
        ));
        assert!(err.to_string().contains("after 2 attempts"));
    }

    #[tokio::test]
    async fn test_requests_are_spaced_by_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(LISTING_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(euc_kr("<p>ok</p>")))
            .expect(2)
            .mount(&server)
            .await;

        let config = test_config(&server).with_rate_limit(Duration::from_millis(50));
        let provider = NaverProvider::with_config(config).unwrap();

        let start = Instant::now();
        provider.fetch_listing(Market::Primary, 1).await.unwrap();
        provider.fetch_listing(Market::Primary, 2).await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(FIELD_SUBMIT_PATH))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let provider = NaverProvider::with_config(test_config(&server)).unwrap();
        let err = provider
            .fetch_table_page(Market::Primary, 5, &FieldSet::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ScreenError::Fetch {
                stage: Stage::Page(5),
                ..
            }
        ));
        assert!(err.to_string().contains("after 3 attempts"));
    }

    #[tokio::test]
    async fn test_fetch_table_page_submits_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(FIELD_SUBMIT_PATH))
            .and(body_string_contains("menu=market_sum"))
            .and(body_string_contains("fieldIds=per"))
            .and(body_string_contains("fieldIds=pbr"))
            .and(body_string_contains("page%3D2"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(euc_kr("<p>종목명</p>")))
            .expect(1)
            .mount(&server)
            .await;

        let provider = NaverProvider::with_config(test_config(&server)).unwrap();
        let fields: FieldSet = [MetricField::Per, MetricField::Pbr].into_iter().collect();
        let page = provider
            .fetch_table_page(Market::Primary, 2, &fields)
            .await
            .unwrap();

        assert_eq!(page.page, 2);
        assert!(page.markup.contains("종목명"));
    }

    #[tokio::test]
    async fn test_fetch_table_page_rejects_page_zero() {
        let provider = NaverProvider::new().unwrap();
        let result = provider
            .fetch_table_page(Market::Primary, 0, &FieldSet::new())
            .await;
        assert!(matches!(result, Err(ScreenError::InvalidParameter(_))));
    }
}
