// src/process/tables.rs
use tracing::{instrument, warn};

use crate::process::date_parser::{apply_date, DateParse};
use crate::process::{Cell, Columns, MaterializedTable, RawTable, TableMeta, ANNUAL, MONTHLY};

/// Materialize every segmented US-format table: reconcile ragged rows,
/// normalize the date index, sort ascending and derive the metadata record.
/// Per-table date failures degrade that table to string dates; they never
/// abort the sibling tables.
#[instrument(level = "debug", skip(tables, general_description), fields(tables = tables.len()))]
pub fn process_csv_tables(
    tables: &[RawTable],
    general_description: &str,
) -> (Vec<MaterializedTable>, Vec<TableMeta>) {
    let mut out_tables = Vec::with_capacity(tables.len());
    let mut out_meta = Vec::with_capacity(tables.len());

    for raw in tables {
        if raw.rows.is_empty() {
            continue;
        }

        // 1) reconcile headers with the widest row
        let width = raw.rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut headers = raw.headers.clone();
        for i in headers.len()..width {
            headers.push(format!("Column_{i}"));
        }
        headers.truncate(width);

        // 2) normalize the date column; one bad token reverts the whole
        //    table to raw string dates
        let parsed: Vec<DateParse> = raw
            .rows
            .iter()
            .map(|r| apply_date(r.first().map(String::as_str).unwrap_or("")))
            .collect();
        let dates_ok = parsed.iter().all(DateParse::is_parsed);
        if !dates_ok {
            warn!(
                metadata = %raw.metadata,
                "date parsing failed, keeping raw string index"
            );
        }
        let keys: Vec<String> = if dates_ok {
            parsed.into_iter().map(DateParse::into_inner).collect()
        } else {
            raw.rows
                .iter()
                .map(|r| r.first().cloned().unwrap_or_default())
                .collect()
        };

        // 3) pad short rows and type the cells
        let mut rows: Vec<(String, Vec<Cell>)> = keys
            .into_iter()
            .zip(raw.rows.iter())
            .map(|(key, row)| {
                let mut cells: Vec<Cell> =
                    row.iter().skip(1).map(|v| Cell::parse(v)).collect();
                cells.resize(width.saturating_sub(1), Cell::Null);
                (key, cells)
            })
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));

        let (index, values): (Vec<_>, Vec<_>) = rows
            .into_iter()
            .map(|(key, cells)| (vec![key], cells))
            .unzip();

        let formations: Vec<String> = headers[1..].to_vec();
        out_tables.push(MaterializedTable {
            index_names: vec!["Date".to_string()],
            index,
            columns: Columns::Flat(formations.clone()),
            values,
        });
        out_meta.push(TableMeta {
            description: describe(&raw.metadata, general_description),
            frequency: if raw.is_annual { ANNUAL } else { MONTHLY }.to_string(),
            formations,
        });
    }

    (out_tables, out_meta)
}

/// Markdown-styled header from the table's own metadata plus the shared
/// general description.
fn describe(metadata: &str, general_description: &str) -> String {
    let mut parts = Vec::new();
    if !metadata.is_empty() {
        parts.push(format!("### {metadata}"));
    }
    if !general_description.is_empty() {
        parts.push(general_description.to_string());
    }
    parts.join("\n")
}
