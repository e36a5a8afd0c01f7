#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/valuerank/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for the valuerank market screener.
//!
//! This crate provides the foundational abstractions shared by site providers
//! and the screening pipeline:
//!
//! - [`Market`](market::Market) - Listing market segment
//! - [`MetricField`](market::MetricField) / [`FieldSet`](market::FieldSet) - Optional metric columns
//! - [`Table`](table::Table) - Uniform table of scraped text values
//! - [`ListingSource`](site::ListingSource) - Fetches listing pages over HTTP
//! - [`SiteAdapter`](site::SiteAdapter) - Parses listing markup

/// Error types for screening operations.
pub mod error;
/// Market segment and metric field definitions.
pub mod market;
/// Site traits for fetching and parsing listing pages.
pub mod site;
/// Scraped table model.
pub mod table;

// Re-export commonly used items at crate root
pub use error::{Result, ScreenError, Stage};
pub use market::{FieldSet, Market, MetricField};
pub use site::{ColumnMap, ListingSource, Site, SiteAdapter};
pub use table::{ListingPage, Row, Table};
