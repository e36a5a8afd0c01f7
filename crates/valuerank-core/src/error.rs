//! Error types for screening operations.
//!
//! This module defines [`ScreenError`] which covers every failure that can
//! occur while fetching listing pages, parsing their markup, ranking the
//! aggregated table or writing the result.

use std::fmt;

use thiserror::Error;

/// Pipeline stage an error was raised in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Discovering the total number of listing pages.
    PageCount,
    /// Discovering the optional metric fields offered by the filter form.
    FieldSelection,
    /// Crawling the table of a single listing page.
    Page(u32),
    /// Concatenating and ranking the crawled tables.
    Aggregation,
    /// Writing or reading an output file.
    Export,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PageCount => write!(f, "page count discovery"),
            Self::FieldSelection => write!(f, "field selection"),
            Self::Page(page) => write!(f, "page {page}"),
            Self::Aggregation => write!(f, "aggregation"),
            Self::Export => write!(f, "export"),
        }
    }
}

/// Errors that can occur during screening.
#[derive(Error, Debug)]
pub enum ScreenError {
    /// Transport failure or non-success HTTP status.
    #[error("Fetch error during {stage}: {message}")]
    Fetch {
        /// The stage that issued the request.
        stage: Stage,
        /// Description of the failure.
        message: String,
    },

    /// Expected markup was absent or the scraped table was inconsistent.
    #[error("Parse error during {stage}: {message}")]
    Parse {
        /// The stage whose markup failed to parse.
        stage: Stage,
        /// Description of the failure.
        message: String,
    },

    /// The aggregated table lacks data needed for ranking.
    #[error("Data error: {0}")]
    Data(String),

    /// Error writing or reading an output file.
    #[error("Export error: {0}")]
    Export(String),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl ScreenError {
    /// Creates a [`ScreenError::Fetch`] for the given stage.
    pub fn fetch(stage: Stage, message: impl Into<String>) -> Self {
        Self::Fetch {
            stage,
            message: message.into(),
        }
    }

    /// Creates a [`ScreenError::Parse`] for the given stage.
    pub fn parse(stage: Stage, message: impl Into<String>) -> Self {
        Self::Parse {
            stage,
            message: message.into(),
        }
    }

    /// Returns the stage this error is attributed to, if any.
    #[must_use]
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::Fetch { stage, .. } | Self::Parse { stage, .. } => Some(*stage),
            Self::Data(_) => Some(Stage::Aggregation),
            Self::Export(_) => Some(Stage::Export),
            Self::InvalidParameter(_) | Self::Other(_) => None,
        }
    }
}

/// Result type alias using [`ScreenError`].
pub type Result<T> = std::result::Result<T, ScreenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_names_failing_page() {
        let err = ScreenError::parse(Stage::Page(7), "row count mismatch");
        assert_eq!(
            err.to_string(),
            "Parse error during page 7: row count mismatch"
        );
        assert_eq!(err.stage(), Some(Stage::Page(7)));
    }

    #[test]
    fn test_stage_of_data_error() {
        let err = ScreenError::Data("missing column PBR".to_string());
        assert_eq!(err.stage(), Some(Stage::Aggregation));
        assert!(ScreenError::Other("x".into()).stage().is_none());
    }
}
