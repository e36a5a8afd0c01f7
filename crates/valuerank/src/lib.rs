#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/valuerank/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Value screening over scraped market listings.
//!
//! This crate re-exports the core types and the site implementations, and
//! provides a [`Screener`] that runs discovery, crawling and ranking in
//! sequence, plus [`export`] helpers for writing the results.
//!
//! # Features
//!
//! - `naver` - Naver Finance listing source and markup adapter
//!
//! # Example
//!
//! ```rust,ignore
//! use std::path::Path;
//! use valuerank::{Market, NaverConfig, Screener};
//!
//! #[tokio::main]
//! async fn main() -> valuerank::Result<()> {
//!     let screener = Screener::with_naver(NaverConfig::default())?;
//!     let report = screener.screen(Market::Secondary).await?;
//!
//!     for row in report.ranked.top(20) {
//!         println!("{}", row.security.name);
//!     }
//!     valuerank::export::write_ranked(&report.ranked, Path::new("result_data.csv"))?;
//!
//!     Ok(())
//! }
//! ```

// Core types and traits
pub use valuerank_core::*;

// Sites
#[cfg(feature = "naver")]
pub use valuerank_naver::{NaverAdapter, NaverConfig, NaverProvider};

pub mod export;
pub mod valuation;

mod pipeline;
pub use export::{OutputFormat, read_output, write_ranked, write_raw};
pub use pipeline::{Discovery, ScreenReport, Screener};
pub use valuation::{RankedRow, RankedTable, Security, rank_table};
