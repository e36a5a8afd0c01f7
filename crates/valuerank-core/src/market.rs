//! Market segment and metric field definitions.
//!
//! This module defines [`Market`] for selecting the listing segment to screen
//! and [`MetricField`] / [`FieldSet`] for the optional metric columns a listing
//! can be asked to include.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ScreenError;

/// Listing market segment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Market {
    /// Primary market (KOSPI).
    #[default]
    Primary,
    /// Secondary market (KOSDAQ).
    Secondary,
}

impl Market {
    /// Returns the segment code used by listing sites.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::Primary => 0,
            Self::Secondary => 1,
        }
    }

    /// Returns the exchange name of this segment.
    #[must_use]
    pub const fn exchange(&self) -> &'static str {
        match self {
            Self::Primary => "KOSPI",
            Self::Secondary => "KOSDAQ",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.exchange())
    }
}

impl FromStr for Market {
    type Err = ScreenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "primary" | "kospi" => Ok(Self::Primary),
            "1" | "secondary" | "kosdaq" => Ok(Self::Secondary),
            other => Err(ScreenError::InvalidParameter(format!(
                "unknown market '{other}' (expected primary/kospi/0 or secondary/kosdaq/1)"
            ))),
        }
    }
}

/// Optional metric columns a listing can include.
///
/// This is the fixed allow-list of field identifiers the screener recognizes
/// in a listing's filter form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetricField {
    /// Price-to-earnings ratio.
    Per,
    /// Price-to-book ratio.
    Pbr,
    /// Return on equity.
    Roe,
    /// Market capitalization.
    MarketSum,
    /// Total assets.
    PropertyTotal,
    /// Total liabilities.
    DebtTotal,
    /// Revenue.
    Sales,
    /// Reserve ratio.
    ReserveRatio,
    /// Number of listed shares.
    ListedStockCnt,
}

impl MetricField {
    /// Every recognized field, in allow-list order.
    pub const ALL: [Self; 9] = [
        Self::Per,
        Self::Pbr,
        Self::Roe,
        Self::MarketSum,
        Self::PropertyTotal,
        Self::DebtTotal,
        Self::Sales,
        Self::ReserveRatio,
        Self::ListedStockCnt,
    ];

    /// Returns the form identifier of this field.
    #[must_use]
    pub const fn id(&self) -> &'static str {
        match self {
            Self::Per => "per",
            Self::Pbr => "pbr",
            Self::Roe => "roe",
            Self::MarketSum => "market_sum",
            Self::PropertyTotal => "property_total",
            Self::DebtTotal => "debt_total",
            Self::Sales => "sales",
            Self::ReserveRatio => "reserve_ratio",
            Self::ListedStockCnt => "listed_stock_cnt",
        }
    }

    /// Looks up a field by its form identifier.
    ///
    /// Returns `None` for identifiers outside the allow-list.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.id() == id)
    }
}

impl fmt::Display for MetricField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Ordered, duplicate-free set of metric fields to request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSet(Vec<MetricField>);

impl FieldSet {
    /// Creates an empty field set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Adds a field, ignoring duplicates. Returns `true` if it was added.
    pub fn insert(&mut self, field: MetricField) -> bool {
        if self.0.contains(&field) {
            return false;
        }
        self.0.push(field);
        true
    }

    /// Returns true if the set contains `field`.
    #[must_use]
    pub fn contains(&self, field: MetricField) -> bool {
        self.0.contains(&field)
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no fields are selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns an iterator over the fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = MetricField> + '_ {
        self.0.iter().copied()
    }

    /// Returns the form identifiers of the fields in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.iter().map(|field| field.id())
    }
}

impl FromIterator<MetricField> for FieldSet {
    fn from_iter<I: IntoIterator<Item = MetricField>>(iter: I) -> Self {
        let mut set = Self::new();
        for field in iter {
            set.insert(field);
        }
        set
    }
}

impl fmt::Display for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.ids().collect();
        write!(f, "[{}]", ids.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_codes() {
        assert_eq!(Market::Primary.code(), 0);
        assert_eq!(Market::Secondary.code(), 1);
        assert_eq!(Market::default(), Market::Primary);
    }

    #[test]
    fn test_market_from_str() {
        assert_eq!("kospi".parse::<Market>().unwrap(), Market::Primary);
        assert_eq!("KOSDAQ".parse::<Market>().unwrap(), Market::Secondary);
        assert_eq!("1".parse::<Market>().unwrap(), Market::Secondary);
        assert!("nyse".parse::<Market>().is_err());
    }

    #[test]
    fn test_metric_field_ids() {
        for field in MetricField::ALL {
            assert_eq!(MetricField::from_id(field.id()), Some(field));
        }
        assert_eq!(MetricField::from_id("quant"), None);
    }

    #[test]
    fn test_field_set_dedup_keeps_order() {
        let set: FieldSet = [MetricField::Pbr, MetricField::Per, MetricField::Pbr]
            .into_iter()
            .collect();

        assert_eq!(set.len(), 2);
        assert_eq!(set.ids().collect::<Vec<_>>(), vec!["pbr", "per"]);
        assert_eq!(set.to_string(), "[pbr, per]");
    }
}
