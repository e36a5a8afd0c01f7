//! Writing ranked and raw listings to disk.
//!
//! The output format follows the file extension: `.csv` and `.parquet` go
//! through polars writers, `.json` is a serde_json array of records. Existing
//! files are overwritten.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use polars::prelude::*;
use tracing::{debug, info, instrument};
use valuerank_core::{ColumnMap, Result, ScreenError, Table};

use crate::valuation::{
    BOOK_TO_PRICE, BPS, DEBT_RATIO, DERIVED_COLUMNS, EARNINGS_YIELD, PER_X_PBR, RANK_BPR,
    RANK_EARNINGS_YIELD, RANK_VALUE, RankedRow, RankedTable, Security,
};

/// Output file format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// Comma-separated values with a header row.
    Csv,
    /// Apache Parquet.
    Parquet,
    /// JSON array of records.
    Json,
}

impl OutputFormat {
    /// Infers the format from a path's extension.
    ///
    /// # Errors
    /// Returns [`ScreenError::InvalidParameter`] for unknown extensions.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("parquet") => Ok(Self::Parquet),
            Some("json") => Ok(Self::Json),
            _ => Err(ScreenError::InvalidParameter(format!(
                "unsupported output file '{}' (expected .csv, .parquet or .json)",
                path.display()
            ))),
        }
    }
}

fn export_error(e: impl std::fmt::Display) -> ScreenError {
    ScreenError::Export(e.to_string())
}

/// Selects the required numeric field published under `header`.
fn numeric_field(map: &ColumnMap, header: &str) -> Option<fn(&Security) -> f64> {
    let field: fn(&Security) -> f64 = if header == map.price {
        |s| s.price
    } else if header == map.per {
        |s| s.per
    } else if header == map.pbr {
        |s| s.pbr
    } else if header == map.debt_total {
        |s| s.debt_total
    } else if header == map.asset_total {
        |s| s.asset_total
    } else {
        return None;
    };
    Some(field)
}

fn derived<'a, T>(rows: &'a [RankedRow], value: impl Fn(&'a RankedRow) -> T) -> Vec<T> {
    rows.iter().map(value).collect()
}

/// Converts a ranked table into a DataFrame.
///
/// Source columns keep their order, with required numeric columns as `f64`
/// and the rest as text, followed by the derived ratio and rank columns.
///
/// # Errors
/// Returns [`ScreenError::Export`] if the frame cannot be assembled.
pub fn ranked_frame(table: &RankedTable) -> Result<DataFrame> {
    let map = table.column_map();
    let rows = table.rows();

    let mut columns = Vec::with_capacity(table.columns().len() + DERIVED_COLUMNS.len());
    for header in table.columns() {
        let name = PlSmallStr::from(header.as_str());
        let column = if *header == map.name {
            Column::new(name, derived(rows, |r| r.security.name.as_str()))
        } else if let Some(field) = numeric_field(map, header) {
            Column::new(name, derived(rows, |r| field(&r.security)))
        } else {
            Column::new(
                name,
                derived(rows, |r| {
                    r.security
                        .other
                        .get(header)
                        .map_or("", String::as_str)
                }),
            )
        };
        columns.push(column);
    }

    columns.extend([
        Column::new(BPS.into(), derived(rows, |r| r.bps)),
        Column::new(DEBT_RATIO.into(), derived(rows, |r| r.debt_ratio)),
        Column::new(PER_X_PBR.into(), derived(rows, |r| r.per_x_pbr)),
        Column::new(EARNINGS_YIELD.into(), derived(rows, |r| r.earnings_yield)),
        Column::new(BOOK_TO_PRICE.into(), derived(rows, |r| r.book_to_price)),
        Column::new(RANK_BPR.into(), derived(rows, |r| r.rank_bpr)),
        Column::new(
            RANK_EARNINGS_YIELD.into(),
            derived(rows, |r| r.rank_earnings_yield),
        ),
        Column::new(RANK_VALUE.into(), derived(rows, |r| r.rank_value)),
    ]);

    DataFrame::new(columns).map_err(export_error)
}

/// Converts a raw scraped table into a DataFrame of text columns.
///
/// # Errors
/// Returns [`ScreenError::Export`] if the frame cannot be assembled.
pub fn raw_frame(table: &Table) -> Result<DataFrame> {
    let columns = table
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            let values: Vec<&str> = table
                .rows()
                .iter()
                .map(|row| row.get(idx).unwrap_or_default())
                .collect();
            Column::new(PlSmallStr::from(header.as_str()), values)
        })
        .collect();

    DataFrame::new(columns).map_err(export_error)
}

fn write_frame(df: &mut DataFrame, path: &Path, format: OutputFormat) -> Result<()> {
    let mut file = File::create(path).map_err(export_error)?;
    match format {
        OutputFormat::Csv => {
            CsvWriter::new(&mut file)
                .include_header(true)
                .finish(df)
                .map_err(export_error)?;
        }
        OutputFormat::Parquet => {
            ParquetWriter::new(&mut file)
                .finish(df)
                .map_err(export_error)?;
        }
        OutputFormat::Json => {
            return Err(ScreenError::Other(
                "JSON output is written from records, not frames".to_string(),
            ));
        }
    }
    Ok(())
}

fn write_json<T: serde::Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(export_error)?;
    serde_json::to_writer_pretty(BufWriter::new(file), value).map_err(export_error)
}

/// Writes a ranked table, choosing the format from the file extension.
///
/// # Errors
/// Returns an error for unknown extensions or if writing fails.
#[instrument(skip(table), fields(rows = table.len()))]
pub fn write_ranked(table: &RankedTable, path: &Path) -> Result<OutputFormat> {
    let format = OutputFormat::from_path(path)?;
    match format {
        OutputFormat::Json => write_json(table.rows(), path)?,
        _ => write_frame(&mut ranked_frame(table)?, path, format)?,
    }
    info!(path = %path.display(), ?format, "Wrote ranked table");
    Ok(format)
}

/// Writes the raw concatenated listing, choosing the format from the file
/// extension.
///
/// # Errors
/// Returns an error for unknown extensions or if writing fails.
#[instrument(skip(table), fields(rows = table.height()))]
pub fn write_raw(table: &Table, path: &Path) -> Result<OutputFormat> {
    let format = OutputFormat::from_path(path)?;
    match format {
        OutputFormat::Json => write_json(table, path)?,
        _ => write_frame(&mut raw_frame(table)?, path, format)?,
    }
    info!(path = %path.display(), ?format, "Wrote raw listing");
    Ok(format)
}

/// Reads a CSV or Parquet output file back into a DataFrame.
///
/// # Errors
/// Returns an error for JSON or unknown extensions, or if reading fails.
pub fn read_output(path: &Path) -> Result<DataFrame> {
    let df = match OutputFormat::from_path(path)? {
        OutputFormat::Csv => CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .and_then(|reader| reader.finish())
            .map_err(export_error)?,
        OutputFormat::Parquet => {
            let file = File::open(path).map_err(export_error)?;
            ParquetReader::new(file).finish().map_err(export_error)?
        }
        OutputFormat::Json => {
            return Err(ScreenError::InvalidParameter(
                "reading JSON output is not supported".to_string(),
            ));
        }
    };
    debug!(path = %path.display(), rows = df.height(), "Read output file");
    Ok(df)
}
