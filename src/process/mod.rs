// src/process/mod.rs
use serde::Serialize;

pub mod breakpoints;
pub mod dat;
pub mod date_parser;
pub mod international;
pub mod split;
pub mod tables;

/// An untyped table segment cut out of one raw archive member, before any
/// date parsing or column reconciliation has happened.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    /// Free-text line(s) preceding the table. Carries the frequency hint
    /// ("Monthly" / "Annual"), the measure hint ("Value Weighted"), and for
    /// international files the currency hint ("US Dollars" / "Local").
    pub metadata: String,
    /// Dash-and-label line grouping runs of columns under one top-level
    /// label. Empty for the US single-country format.
    pub spanners: String,
    /// Column names as the file claims them, first always "Date".
    pub headers: Vec<String>,
    /// One Vec<String> per data row; may be ragged against `headers`.
    pub rows: Vec<Vec<String>>,
    /// Derived from `metadata` at segmentation time.
    pub is_annual: bool,
}

/// A single cell after materialization.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Num(f64),
    Text(String),
    Null,
}

impl Cell {
    /// Trim and type a raw cell. Anything that parses as f64 becomes a
    /// number, empty strings become Null, the rest stays text.
    pub fn parse(raw: &str) -> Cell {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Null;
        }
        match trimmed.parse::<f64>() {
            Ok(n) => Cell::Num(n),
            Err(_) => Cell::Text(trimmed.to_string()),
        }
    }
}

/// Column labels, flat or grouped under spanner labels as
/// `(group, sub-column)` pairs.
#[derive(Debug, Clone, PartialEq)]
pub enum Columns {
    Flat(Vec<String>),
    Grouped(Vec<(String, String)>),
}

impl Columns {
    pub fn len(&self) -> usize {
        match self {
            Columns::Flat(cols) => cols.len(),
            Columns::Grouped(cols) => cols.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bottom-level labels regardless of grouping.
    pub fn labels(&self) -> Vec<String> {
        match self {
            Columns::Flat(cols) => cols.clone(),
            Columns::Grouped(cols) => cols.iter().map(|(_, c)| c.clone()).collect(),
        }
    }
}

/// The typed output of materialization: an indexed value grid.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedTable {
    /// "Date", or ["Date", "Mkt"] for international tables indexed jointly.
    pub index_names: Vec<String>,
    /// One key tuple per value row, sorted ascending.
    pub index: Vec<Vec<String>>,
    pub columns: Columns,
    /// Row-major, aligned to (index, columns).
    pub values: Vec<Vec<Cell>>,
}

/// Caller-facing metadata record, zipped 1:1 with its MaterializedTable
/// through every filtering stage.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TableMeta {
    pub description: String,
    pub frequency: String,
    pub formations: Vec<String>,
}

pub const MONTHLY: &str = "monthly";
pub const ANNUAL: &str = "annual";
