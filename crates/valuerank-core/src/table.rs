//! Scraped table model.
//!
//! - [`ListingPage`] - One fetched page of raw markup
//! - [`Row`] - One security's scraped text values
//! - [`Table`] - Rows sharing a column schema

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, ScreenError, Stage},
    market::Market,
};

/// One fetched listing page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingPage {
    /// Market segment the page belongs to.
    pub market: Market,
    /// 1-based page number.
    pub page: u32,
    /// Decoded page markup.
    pub markup: String,
}

impl ListingPage {
    /// Creates a new listing page.
    #[must_use]
    pub fn new(market: Market, page: u32, markup: impl Into<String>) -> Self {
        Self {
            market,
            page,
            markup: markup.into(),
        }
    }
}

/// One security's scraped values, aligned with its table's columns.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row(Vec<String>);

impl Row {
    /// Creates a row from its values.
    #[must_use]
    pub const fn new(values: Vec<String>) -> Self {
        Self(values)
    }

    /// Returns the values of this row.
    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.0
    }

    /// Returns the value at column index `idx`.
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.0.get(idx).map(String::as_str)
    }

    /// Returns the number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the row has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for Row {
    fn from(values: Vec<String>) -> Self {
        Self(values)
    }
}

/// Rows of text values sharing one column schema.
///
/// Every row holds exactly one value per column.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Creates an empty table with the given columns.
    #[must_use]
    pub const fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Reshapes a flat, row-major list of values into a table.
    ///
    /// `expected_rows` is the number of rows the page declared; the flat list
    /// must hold exactly `expected_rows * columns.len()` values.
    ///
    /// # Errors
    /// Returns [`ScreenError::Parse`] attributed to `stage` if the table has no
    /// columns or the value count does not match.
    pub fn from_flat(
        columns: Vec<String>,
        values: Vec<String>,
        expected_rows: usize,
        stage: Stage,
    ) -> Result<Self> {
        let width = columns.len();
        if width == 0 {
            return Err(ScreenError::parse(stage, "table has no columns"));
        }
        if values.len() % width != 0 {
            return Err(ScreenError::parse(
                stage,
                format!(
                    "{} values do not divide into rows of {} columns",
                    values.len(),
                    width
                ),
            ));
        }
        if values.len() / width != expected_rows {
            return Err(ScreenError::parse(
                stage,
                format!(
                    "{} rows of {} columns extracted but {} sequence numbers found",
                    values.len() / width,
                    width,
                    expected_rows
                ),
            ));
        }

        let mut rows = Vec::with_capacity(expected_rows);
        let mut values = values.into_iter();
        for _ in 0..expected_rows {
            rows.push(Row::new(values.by_ref().take(width).collect()));
        }

        Ok(Self { columns, rows })
    }

    /// Appends a row.
    ///
    /// # Errors
    /// Returns [`ScreenError::Data`] if the row width differs from the schema.
    pub fn push(&mut self, row: impl Into<Row>) -> Result<()> {
        let row = row.into();
        if row.len() != self.columns.len() {
            return Err(ScreenError::Data(format!(
                "row has {} values but the table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Concatenates tables, preserving table order then row order.
    ///
    /// # Errors
    /// Returns [`ScreenError::Data`] if the tables do not share one schema.
    pub fn concat(tables: impl IntoIterator<Item = Self>) -> Result<Self> {
        let mut tables = tables.into_iter();
        let Some(mut combined) = tables.next() else {
            return Ok(Self::default());
        };

        for table in tables {
            if table.columns != combined.columns {
                return Err(ScreenError::Data(format!(
                    "cannot concatenate tables with columns {:?} and {:?}",
                    combined.columns, table.columns
                )));
            }
            combined.rows.extend(table.rows);
        }

        Ok(combined)
    }

    /// Returns the column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the index of the column named `name`.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Returns the rows.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Returns the value of column `name` in row `row`.
    #[must_use]
    pub fn get(&self, row: usize, name: &str) -> Option<&str> {
        let idx = self.column_index(name)?;
        self.rows.get(row)?.get(idx)
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
