use crate::models::{Axis, FailureReason};
use thiserror::Error;

/// Why a single coordinate value could not be normalized.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinateError {
    #[error("{axis} '{input}' is not a decimal number")]
    Unparseable { axis: Axis, input: String },
    #[error("{axis} {value} is outside {min} to {max} degrees")]
    OutOfRange { axis: Axis, value: f64, min: f64, max: f64 },
}

impl CoordinateError {
    pub fn reason(&self) -> FailureReason {
        match self {
            CoordinateError::Unparseable { .. } => FailureReason::Unparseable,
            CoordinateError::OutOfRange { .. } => FailureReason::OutOfRange,
        }
    }

    pub fn axis(&self) -> Axis {
        match self {
            CoordinateError::Unparseable { axis, .. } | CoordinateError::OutOfRange { axis, .. } => *axis,
        }
    }
}

/// A line of input that could not be decoded into a record at all.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("line {line}: {source}")]
    Json { line: usize, source: serde_json::Error },
    #[error("line {line}: {source}")]
    Csv { line: usize, source: csv::Error },
    #[error("line {line}: expected {expected} columns, found {found}")]
    ColumnCount { line: usize, expected: usize, found: usize },
    #[error("element {index}: not a record: {source}")]
    Element { index: usize, source: serde_json::Error },
    #[error("expected an array of points or an object with 'gps_points'")]
    NotAnArray,
    #[error("line {line}: not valid UTF-8")]
    Utf8 { line: usize },
    #[error("line {line}: empty id")]
    MissingId { line: usize },
    #[error("csv header is missing the '{0}' column")]
    MissingColumn(&'static str),
    #[error("input is empty")]
    EmptyInput,
    #[error("unknown format: {0}")]
    UnknownFormat(String),
}
