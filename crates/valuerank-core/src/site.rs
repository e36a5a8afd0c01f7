//! Site traits for fetching and parsing listing pages.
//!
//! This module defines the seams between the screening pipeline and a
//! concrete listing website:
//!
//! - [`Site`] - Base trait for all listing sites
//! - [`ListingSource`] - Fetches listing pages over the network
//! - [`SiteAdapter`] - Extracts page counts, fields and tables from markup
//!
//! Keeping markup parsing behind [`SiteAdapter`] means a site redesign only
//! touches the adapter, never the ranking logic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::{
    error::Result,
    market::{FieldSet, Market},
    table::{ListingPage, Table},
};

/// Base trait for all listing sites.
pub trait Site: Send + Sync + Debug {
    /// Returns the name of this site (e.g., "Naver Finance").
    fn name(&self) -> &str;

    /// Returns a description of this site.
    fn description(&self) -> &str;

    /// Returns the market segments this site lists.
    fn supported_markets(&self) -> &[Market];
}

/// Fetches listing pages.
#[async_trait]
pub trait ListingSource: Site {
    /// Fetches a listing page with the site's default columns.
    ///
    /// Used to read the pagination and the filter form.
    async fn fetch_listing(&self, market: Market, page: u32) -> Result<ListingPage>;

    /// Fetches a listing page with the given optional fields selected.
    async fn fetch_table_page(
        &self,
        market: Market,
        page: u32,
        fields: &FieldSet,
    ) -> Result<ListingPage>;
}

/// Header names under which a site publishes the columns ranking depends on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMap {
    /// Security name.
    pub name: String,
    /// Current price.
    pub price: String,
    /// Price-to-earnings ratio.
    pub per: String,
    /// Price-to-book ratio.
    pub pbr: String,
    /// Total liabilities.
    pub debt_total: String,
    /// Total assets.
    pub asset_total: String,
}

/// Extracts structure from listing markup.
///
/// Implementations are pure: they never perform I/O.
pub trait SiteAdapter: Site {
    /// Returns the total number of listing pages (at least 1).
    fn discover_page_count(&self, page: &ListingPage) -> Result<u32>;

    /// Returns the recognized optional fields offered by the filter form.
    fn discover_fields(&self, page: &ListingPage) -> Result<FieldSet>;

    /// Parses the listing table of a page fetched with selected fields.
    fn parse_table(&self, page: &ListingPage) -> Result<Table>;

    /// Returns the headers carrying the columns ranking requires.
    fn column_map(&self) -> ColumnMap;
}
