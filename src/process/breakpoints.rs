// src/process/breakpoints.rs
use anyhow::{bail, Result};
use csv::ReaderBuilder;
use tracing::{instrument, warn};

use crate::process::date_parser::{month_end_date, DateParse};
use crate::process::{Cell, Columns, MaterializedTable};

/// Breakpoint types published by the data library. "me" sorts on market
/// equity; the rest sort on financial ratios and carry split firm counts.
pub const BREAKPOINT_TYPES: &[&str] = &["me", "be-me", "e-p", "cf-p", "d-p"];

const RATIO_TYPES: &[&str] = &["be-me", "e-p", "cf-p", "d-p"];

/// Parse one NYSE breakpoint CSV member: strip the fixed header/footer
/// lines, apply the hardcoded percentile columns and snap 6-digit dates to
/// month-end (unlike the general pipeline, which uses first-of-month).
#[instrument(level = "debug", skip(text), fields(breakpoint_type))]
pub fn parse_breakpoint_file(
    text: &str,
    breakpoint_type: &str,
) -> Result<(MaterializedTable, String)> {
    if !BREAKPOINT_TYPES.contains(&breakpoint_type) {
        bail!(
            "unsupported breakpoint type '{breakpoint_type}', expected one of {BREAKPOINT_TYPES:?}"
        );
    }
    let header_count = if breakpoint_type == "me" { 1 } else { 3 };

    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= header_count + 1 {
        bail!("breakpoint file too short: {} lines", lines.len());
    }

    // descriptive lines up to 3, stopping at the first 19xx-dated row
    let metadata = lines[..header_count]
        .iter()
        .map(|l| l.trim())
        .take_while(|l| !l.starts_with("19"))
        .take(3)
        .collect::<Vec<_>>()
        .join("\n");

    let columns = breakpoint_columns(breakpoint_type);
    let body = lines[header_count..lines.len() - 1].join("\n");

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut raw_dates = Vec::new();
    let mut parsed_dates = Vec::new();
    let mut values = Vec::new();
    for record in reader.records() {
        let record = record?;
        let token = record.get(0).unwrap_or("").to_string();
        if token.is_empty() {
            continue;
        }
        parsed_dates.push(month_end_date(&token));
        raw_dates.push(token);
        let mut cells: Vec<Cell> = record.iter().skip(1).map(Cell::parse).collect();
        cells.resize(columns.len(), Cell::Null);
        values.push(cells);
    }

    let dates_ok = parsed_dates.iter().all(DateParse::is_parsed);
    if !dates_ok {
        warn!(breakpoint_type, "date parsing failed, keeping raw string index");
    }
    let keys: Vec<String> = if dates_ok {
        parsed_dates
            .into_iter()
            .map(DateParse::into_inner)
            .collect()
    } else {
        raw_dates
    };

    let mut rows: Vec<(String, Vec<Cell>)> = keys.into_iter().zip(values).collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    let (index, values): (Vec<_>, Vec<_>) = rows
        .into_iter()
        .map(|(key, cells)| (vec![key], cells))
        .unzip();

    Ok((
        MaterializedTable {
            index_names: vec!["Date".to_string()],
            index,
            columns: Columns::Flat(columns),
            values,
        },
        metadata,
    ))
}

/// Fixed percentile column set: a firm count (split into below/above zero
/// for the ratio-sorted types) followed by the 5th through 100th
/// percentile cutoffs.
fn breakpoint_columns(breakpoint_type: &str) -> Vec<String> {
    let mut columns: Vec<String> = if RATIO_TYPES.contains(&breakpoint_type) {
        vec![
            "num_firms_less_than_0".to_string(),
            "num_firms_greater_than_0".to_string(),
        ]
    } else {
        vec!["num_firms".to_string()]
    };
    columns.extend((1..=20).map(|i| format!("p{}", i * 5)));
    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn me_breakpoints_snap_to_month_end() {
        let text = "\
ME Breakpoints for NYSE firms
202003,1200,1.0,2.0,3.0
202004,1210,1.5,2.5,3.5
Copyright footer line
";
        let (table, metadata) = parse_breakpoint_file(text, "me").unwrap();
        assert_eq!(metadata, "ME Breakpoints for NYSE firms");
        assert_eq!(table.index[0], vec!["2020-03-31".to_string()]);
        assert_eq!(table.index[1], vec!["2020-04-30".to_string()]);
        assert_eq!(table.columns.len(), 21);
        assert_eq!(table.values[0][0], Cell::Num(1200.0));
        assert_eq!(table.values[0][20], Cell::Null);
    }

    #[test]
    fn ratio_types_split_the_firm_count() {
        let text = "\
BE/ME Breakpoints
Line two of the description
Line three
196312,12,340,0.1,0.2
Copyright footer line
";
        let (table, metadata) = parse_breakpoint_file(text, "be-me").unwrap();
        assert_eq!(
            metadata,
            "BE/ME Breakpoints\nLine two of the description\nLine three"
        );
        let labels = table.columns.labels();
        assert_eq!(labels[0], "num_firms_less_than_0");
        assert_eq!(labels[1], "num_firms_greater_than_0");
        assert_eq!(labels.len(), 22);
        assert_eq!(table.index[0], vec!["1963-12-31".to_string()]);
    }

    #[test]
    fn metadata_stops_at_a_dated_row() {
        let text = "\
Description line
1963 annual header already data-like
third line
196312,12,340,0.1
footer
";
        let (_, metadata) = parse_breakpoint_file(text, "be-me").unwrap();
        assert_eq!(metadata, "Description line");
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(parse_breakpoint_file("x\ny\nz\n196312,1\nf\n", "prior").is_err());
    }
}
