//! Valuation ratios and composite value ranking.
//!
//! Rows of the aggregated listing are converted to [`Security`] records,
//! enriched with derived ratios and ranked by book-to-price and earnings
//! yield. The composite rank is the mean of the two ranks; lower is cheaper.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use valuerank_core::{ColumnMap, Result, Row, ScreenError, Table};

/// Book value per share column.
pub const BPS: &str = "BPS";
/// Debt ratio (%) column.
pub const DEBT_RATIO: &str = "부채비율";
/// PER × PBR column.
pub const PER_X_PBR: &str = "PER x PBR";
/// Earnings yield (1/PER) column.
pub const EARNINGS_YIELD: &str = "1/PER";
/// Book-to-price (1/PBR) column.
pub const BOOK_TO_PRICE: &str = "BPR";
/// Rank by book-to-price column.
pub const RANK_BPR: &str = "RANK_BPR";
/// Rank by earnings yield column.
pub const RANK_EARNINGS_YIELD: &str = "RANK_1/PER";
/// Composite rank column.
pub const RANK_VALUE: &str = "RANK_VALUE";

/// Derived columns appended after the source columns, in output order.
pub const DERIVED_COLUMNS: [&str; 8] = [
    BPS,
    DEBT_RATIO,
    PER_X_PBR,
    EARNINGS_YIELD,
    BOOK_TO_PRICE,
    RANK_BPR,
    RANK_EARNINGS_YIELD,
    RANK_VALUE,
];

/// Cell texts the listing uses for a missing value.
const MISSING_VALUES: [&str; 3] = ["", "N/A", "-"];

/// One security with the values ranking requires.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Security {
    /// Security name.
    pub name: String,
    /// Current price.
    pub price: f64,
    /// Price-to-earnings ratio.
    pub per: f64,
    /// Price-to-book ratio.
    pub pbr: f64,
    /// Total liabilities.
    pub debt_total: f64,
    /// Total assets.
    pub asset_total: f64,
    /// Remaining scraped columns, keyed by header.
    pub other: BTreeMap<String, String>,
}

impl Security {
    /// Book value per share: price / PBR.
    #[must_use]
    pub fn bps(&self) -> f64 {
        self.price / self.pbr
    }

    /// Debt ratio in percent: debt total / asset total × 100.
    #[must_use]
    pub fn debt_ratio(&self) -> f64 {
        self.debt_total / self.asset_total * 100.0
    }

    /// PER × PBR.
    #[must_use]
    pub fn per_x_pbr(&self) -> f64 {
        self.per * self.pbr
    }

    /// Earnings yield: 1 / PER.
    #[must_use]
    pub fn earnings_yield(&self) -> f64 {
        1.0 / self.per
    }

    /// Book-to-price: 1 / PBR.
    #[must_use]
    pub fn book_to_price(&self) -> f64 {
        1.0 / self.pbr
    }
}

/// A security with its derived ratios and ranks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedRow {
    /// The underlying security.
    pub security: Security,
    /// Book value per share.
    pub bps: f64,
    /// Debt ratio in percent.
    pub debt_ratio: f64,
    /// PER × PBR.
    pub per_x_pbr: f64,
    /// 1 / PER.
    pub earnings_yield: f64,
    /// 1 / PBR.
    pub book_to_price: f64,
    /// Rank by book-to-price, descending (1 = highest).
    pub rank_bpr: u32,
    /// Rank by earnings yield, descending (1 = highest).
    pub rank_earnings_yield: u32,
    /// Mean of the two ranks.
    pub rank_value: f64,
}

impl RankedRow {
    fn new(security: Security, rank_bpr: u32, rank_earnings_yield: u32) -> Self {
        Self {
            bps: security.bps(),
            debt_ratio: security.debt_ratio(),
            per_x_pbr: security.per_x_pbr(),
            earnings_yield: security.earnings_yield(),
            book_to_price: security.book_to_price(),
            rank_bpr,
            rank_earnings_yield,
            rank_value: f64::from(rank_bpr + rank_earnings_yield) / 2.0,
            security,
        }
    }
}

/// Ranked securities, sorted ascending by composite rank.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedTable {
    columns: Vec<String>,
    column_map: ColumnMap,
    rows: Vec<RankedRow>,
}

impl RankedTable {
    /// Returns the source column names, in source order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the headers of the required columns.
    #[must_use]
    pub const fn column_map(&self) -> &ColumnMap {
        &self.column_map
    }

    /// Returns the ranked rows, best first.
    #[must_use]
    pub fn rows(&self) -> &[RankedRow] {
        &self.rows
    }

    /// Returns the `n` best-ranked rows.
    #[must_use]
    pub fn top(&self, n: usize) -> &[RankedRow] {
        &self.rows[..n.min(self.rows.len())]
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if no rows survived aggregation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Parses a scraped cell as a number, or `None` if it is missing.
fn parse_number(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if MISSING_VALUES.contains(&raw) {
        return None;
    }
    raw.replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Column positions of the required headers.
#[derive(Debug)]
struct RequiredIndices {
    name: usize,
    price: usize,
    per: usize,
    pbr: usize,
    debt_total: usize,
    asset_total: usize,
}

impl RequiredIndices {
    fn locate(table: &Table, columns: &ColumnMap) -> Result<Self> {
        let index = |header: &str| {
            table.column_index(header).ok_or_else(|| {
                ScreenError::Data(format!(
                    "required column '{header}' missing; table has {:?}",
                    table.columns()
                ))
            })
        };

        Ok(Self {
            name: index(columns.name.as_str())?,
            price: index(columns.price.as_str())?,
            per: index(columns.per.as_str())?,
            pbr: index(columns.pbr.as_str())?,
            debt_total: index(columns.debt_total.as_str())?,
            asset_total: index(columns.asset_total.as_str())?,
        })
    }

    fn is_required(&self, idx: usize) -> bool {
        [
            self.name,
            self.price,
            self.per,
            self.pbr,
            self.debt_total,
            self.asset_total,
        ]
        .contains(&idx)
    }

    fn security(&self, row: &Row, columns: &[String]) -> Option<Security> {
        let name = row.get(self.name)?.trim();
        if MISSING_VALUES.contains(&name) {
            return None;
        }
        let number = |idx: usize| row.get(idx).and_then(parse_number);

        let other = columns
            .iter()
            .enumerate()
            .filter(|(idx, _)| !self.is_required(*idx))
            .filter_map(|(idx, header)| Some((header.clone(), row.get(idx)?.to_string())))
            .collect();

        Some(Security {
            name: name.to_string(),
            price: number(self.price)?,
            per: number(self.per)?,
            pbr: number(self.pbr)?,
            debt_total: number(self.debt_total)?,
            asset_total: number(self.asset_total)?,
            other,
        })
    }
}

/// Ranks `values` in descending order; tied values all take the highest
/// (worst) rank of their group.
///
/// Distinct values receive ranks `1..=values.len()`.
#[must_use]
pub fn rank_descending_max(values: &[f64]) -> Vec<u32> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));

    let mut ranks = vec![0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        let rank = u32::try_from(end).unwrap_or(u32::MAX);
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}

/// Converts an aggregated listing into a ranked table.
///
/// Rows missing any required value are dropped. The result is sorted by
/// composite rank with a stable sort, so equal scores keep listing order.
///
/// # Errors
/// Returns [`ScreenError::Data`] if a required column is absent.
pub fn rank_table(table: &Table, columns: &ColumnMap) -> Result<RankedTable> {
    let indices = RequiredIndices::locate(table, columns)?;

    let mut securities = Vec::with_capacity(table.height());
    for (idx, row) in table.rows().iter().enumerate() {
        match indices.security(row, table.columns()) {
            Some(security) => securities.push(security),
            None => debug!(row = idx, "Dropping row with missing required values"),
        }
    }

    let dropped = table.height() - securities.len();
    if dropped > 0 {
        warn!(
            dropped,
            kept = securities.len(),
            "Dropped rows with missing required values"
        );
    }

    let book_to_price: Vec<f64> = securities.iter().map(Security::book_to_price).collect();
    let earnings_yield: Vec<f64> = securities.iter().map(Security::earnings_yield).collect();
    let rank_bpr = rank_descending_max(&book_to_price);
    let rank_earnings_yield = rank_descending_max(&earnings_yield);

    let mut rows: Vec<RankedRow> = securities
        .into_iter()
        .zip(rank_bpr)
        .zip(rank_earnings_yield)
        .map(|((security, bpr), ey)| RankedRow::new(security, bpr, ey))
        .collect();
    rows.sort_by(|a, b| a.rank_value.total_cmp(&b.rank_value));

    info!(ranked = rows.len(), "Ranked securities by composite value");

    Ok(RankedTable {
        columns: table.columns().to_vec(),
        column_map: columns.clone(),
        rows,
    })
}
