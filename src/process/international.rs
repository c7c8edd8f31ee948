// src/process/international.rs
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument, warn};

use crate::process::date_parser::{apply_date, DateParse};
use crate::process::{Cell, Columns, MaterializedTable, RawTable, TableMeta, ANNUAL, MONTHLY};

static MULTI_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s{2,}").expect("whitespace regex is valid"));

/// Materialize international-format tables, building two-level column
/// headers from the spanner line where the group counts work out. "Firms"
/// tables never get a hierarchy. Structural mismatches fall back to flat
/// columns; they never abort the decode.
#[instrument(level = "debug", skip(tables), fields(tables = tables.len()))]
pub fn process_international_portfolio_data(
    tables: &[RawTable],
    ex_dividends: bool,
) -> (Vec<MaterializedTable>, Vec<TableMeta>) {
    let mut out_tables = Vec::with_capacity(tables.len());
    let mut out_meta = Vec::with_capacity(tables.len());

    for raw in tables {
        if raw.rows.is_empty() {
            continue;
        }

        // 1) column labels: the file's headers only when the counts line up
        let width = raw.rows.iter().map(Vec::len).max().unwrap_or(0);
        let labels: Vec<String> = if raw.headers.len() == width {
            raw.headers.clone()
        } else {
            std::iter::once("Date".to_string())
                .chain((1..width).map(|i| format!("Column_{i}")))
                .collect()
        };
        let is_firms = labels.iter().any(|l| l == "Firms");

        // 2) spanner group labels
        let groups: Vec<String> = raw
            .spanners
            .replace('-', " ")
            .split_whitespace()
            .map(|g| g.to_string())
            .collect();

        // 3) date normalization, degrading to raw strings on any failure
        let parsed: Vec<DateParse> = raw
            .rows
            .iter()
            .map(|r| apply_date(r.first().map(String::as_str).unwrap_or("")))
            .collect();
        let dates_ok = parsed.iter().all(DateParse::is_parsed);
        if !dates_ok {
            warn!(metadata = %raw.metadata, "date parsing failed, keeping raw string index");
        }
        let dates: Vec<String> = if dates_ok {
            parsed.into_iter().map(DateParse::into_inner).collect()
        } else {
            raw.rows
                .iter()
                .map(|r| r.first().cloned().unwrap_or_default())
                .collect()
        };

        // 4) composite (Date, Mkt) index when a market column repeats dates
        let mkt_pos = if is_firms {
            None
        } else {
            labels.iter().position(|l| l == "Mkt")
        };
        let index_names: Vec<String> = match mkt_pos {
            Some(_) => vec!["Date".to_string(), "Mkt".to_string()],
            None => vec!["Date".to_string()],
        };

        let value_labels: Vec<String> = labels
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != 0 && Some(*i) != mkt_pos)
            .map(|(_, l)| l.clone())
            .collect();

        let mut rows: Vec<(Vec<String>, Vec<Cell>)> = dates
            .into_iter()
            .zip(raw.rows.iter())
            .map(|(date, row)| {
                let mut key = vec![date];
                if let Some(pos) = mkt_pos {
                    key.push(row.get(pos).cloned().unwrap_or_default());
                }
                let mut cells: Vec<Cell> = row
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != 0 && Some(*i) != mkt_pos)
                    .map(|(_, v)| Cell::parse(v))
                    .collect();
                cells.resize(value_labels.len(), Cell::Null);
                (key, cells)
            })
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        let (index, values): (Vec<_>, Vec<_>) = rows.into_iter().unzip();

        // 5) two-level header from the spanner groups
        let columns = build_columns(&value_labels, &groups, is_firms);

        // 6) metadata record
        let frequency = if index
            .first()
            .and_then(|k| k.first())
            .map(|d| d.ends_with("31"))
            .unwrap_or(false)
        {
            ANNUAL
        } else {
            MONTHLY
        };
        let formations: Vec<String> = if is_firms {
            value_labels.iter().filter(|l| *l != "Firms").cloned().collect()
        } else {
            groups.clone()
        };

        out_tables.push(MaterializedTable {
            index_names,
            index,
            columns,
            values,
        });
        out_meta.push(TableMeta {
            description: describe(&raw.metadata, ex_dividends),
            frequency: frequency.to_string(),
            formations,
        });
    }

    (out_tables, out_meta)
}

/// Repeat each spanner label over an equal share of the value columns. A
/// trailing "Zero" column nests under the dividend-yield group when one is
/// present. Any length mismatch leaves the columns flat.
fn build_columns(value_labels: &[String], groups: &[String], is_firms: bool) -> Columns {
    if is_firms || groups.is_empty() || value_labels.is_empty() {
        return Columns::Flat(value_labels.to_vec());
    }

    let per_group = value_labels.len() / groups.len();
    let mut top: Vec<String> = groups
        .iter()
        .flat_map(|g| std::iter::repeat(g.clone()).take(per_group))
        .collect();

    if top.len() < value_labels.len() && value_labels.last().map(String::as_str) == Some("Zero") {
        // zero-dividend payers belong under the yield breakdown
        if let Some(yld) = groups.iter().find(|g| g.eq_ignore_ascii_case("Yld")) {
            top.push(yld.clone());
        }
    }

    if top.len() != value_labels.len() {
        debug!(
            columns = value_labels.len(),
            groups = groups.len(),
            "spanner groups do not divide the columns, keeping flat labels"
        );
        return Columns::Flat(value_labels.to_vec());
    }
    Columns::Grouped(top.into_iter().zip(value_labels.iter().cloned()).collect())
}

fn describe(metadata: &str, ex_dividends: bool) -> String {
    let mut description = metadata.replace('\n', " - ");
    if ex_dividends {
        description.push_str(" - Ex-Dividends");
    }
    MULTI_SPACE.replace_all(&description, " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(metadata: &str, spanners: &str, headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            metadata: metadata.to_string(),
            spanners: spanners.to_string(),
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
            is_annual: metadata.contains("Annual"),
        }
    }

    #[test]
    fn builds_two_level_columns_from_spanners() {
        let table = raw(
            "Value Weight Returns\nUS Dollars",
            "----- USA -----   ----- Japan -----",
            &["Date", "Lo", "Med", "Hi", "Lo", "Med", "Hi"],
            &[&["192607", "1", "2", "3", "4", "5", "6"]],
        );
        let (tables, metas) = process_international_portfolio_data(&[table], false);
        assert_eq!(
            tables[0].columns,
            Columns::Grouped(vec![
                ("USA".into(), "Lo".into()),
                ("USA".into(), "Med".into()),
                ("USA".into(), "Hi".into()),
                ("Japan".into(), "Lo".into()),
                ("Japan".into(), "Med".into()),
                ("Japan".into(), "Hi".into()),
            ])
        );
        assert_eq!(metas[0].formations, vec!["USA", "Japan"]);
        assert_eq!(metas[0].frequency, "monthly");
        assert_eq!(metas[0].description, "Value Weight Returns - US Dollars");
    }

    #[test]
    fn zero_column_nests_under_the_yield_group() {
        let table = raw(
            "Returns",
            "--- BE/ME ---  --- Yld ---",
            &["Date", "Lo", "Hi", "Lo", "Hi", "Zero"],
            &[&["192607", "1", "2", "3", "4", "5"]],
        );
        let (tables, _) = process_international_portfolio_data(&[table], false);
        match &tables[0].columns {
            Columns::Grouped(cols) => {
                assert_eq!(cols[4], ("Yld".to_string(), "Zero".to_string()));
            }
            other => panic!("expected grouped columns, got {other:?}"),
        }
    }

    #[test]
    fn uneven_groups_fall_back_to_flat_columns() {
        let table = raw(
            "Returns",
            "--- USA ---  --- Japan ---",
            &["Date", "A", "B", "C"],
            &[&["192607", "1", "2", "3"]],
        );
        let (tables, _) = process_international_portfolio_data(&[table], false);
        assert_eq!(
            tables[0].columns,
            Columns::Flat(vec!["A".into(), "B".into(), "C".into()])
        );
    }

    #[test]
    fn firms_tables_never_get_a_hierarchy() {
        let table = raw(
            "Number of Firms",
            "--- USA ---",
            &["Date", "Firms", "B/M", "E/P", "CE/P", "Yld"],
            &[&["192607", "100", "0.5", "0.1", "0.1", "2.0"]],
        );
        let (tables, metas) = process_international_portfolio_data(&[table], false);
        assert!(matches!(tables[0].columns, Columns::Flat(_)));
        assert_eq!(metas[0].formations, vec!["B/M", "E/P", "CE/P", "Yld"]);
    }

    #[test]
    fn mkt_column_joins_the_index() {
        let table = raw(
            "Country Returns",
            "",
            &["Date", "Mkt", "Lo", "Hi"],
            &[
                &["192607", "USA", "1.0", "2.0"],
                &["192607", "JPN", "3.0", "4.0"],
            ],
        );
        let (tables, _) = process_international_portfolio_data(&[table], false);
        assert_eq!(tables[0].index_names, vec!["Date", "Mkt"]);
        assert_eq!(
            tables[0].index,
            vec![
                vec!["1926-07-01".to_string(), "JPN".to_string()],
                vec!["1926-07-01".to_string(), "USA".to_string()],
            ]
        );
        assert_eq!(tables[0].columns, Columns::Flat(vec!["Lo".into(), "Hi".into()]));
    }

    #[test]
    fn annual_frequency_from_year_end_index() {
        let table = raw(
            "Annual Returns",
            "",
            &["Date", "A"],
            &[&["1927", "1.0"]],
        );
        let (_, metas) = process_international_portfolio_data(&[table], false);
        assert_eq!(metas[0].frequency, "annual");
    }

    #[test]
    fn ex_dividends_suffix_and_whitespace_collapse() {
        let table = raw(
            "Country   Returns\nLocal Currency",
            "",
            &["Date", "A"],
            &[&["192607", "1.0"]],
        );
        let (_, metas) = process_international_portfolio_data(&[table], true);
        assert_eq!(
            metas[0].description,
            "Country Returns - Local Currency - Ex-Dividends"
        );
    }
}
