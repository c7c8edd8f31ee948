// src/process/split.rs
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument};

use crate::process::RawTable;

/// One segmented US-format archive member: the leading free-text block plus
/// every logical table found after it.
#[derive(Debug, Default)]
pub struct CsvDocument {
    pub general_description: String,
    pub tables: Vec<RawTable>,
}

/// A line whose first token is a 4-6 digit date marks the start of a data
/// section (and therefore the end of the description block).
static DATE_TOKEN_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4,6}([,\s]|$)").expect("date token regex is valid"));

static FREQUENCY_HINT: &[&str] = &["Daily", "Monthly", "Annual", "Weekly"];

/// Split one comma-separated archive member into logical tables.
///
/// The US files stack many tables back to back: a free-text description at
/// the top, then repeated [metadata line, header row starting with a comma,
/// data rows] groups separated by blank lines. Tables with zero data rows
/// are never emitted.
#[instrument(level = "debug", skip(text), fields(bytes = text.len()))]
pub fn read_csv_file(text: &str) -> CsvDocument {
    let lines: Vec<&str> = text.lines().collect();

    // 1) collect the general description: everything above the first blank
    //    line, header row (leading comma) or date-led line
    let mut desc_end = lines.len();
    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || line.starts_with(',') || DATE_TOKEN_LINE.is_match(trimmed) {
            desc_end = i;
            break;
        }
    }
    let mut description: Vec<String> = lines[..desc_end]
        .iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();

    // 2) a trailing frequency/measure line belongs to the first table, not
    //    to the description
    let mut carried: Option<String> = None;
    if let Some(last) = description.last() {
        if ["Monthly", "Annual", "Returns"].iter().any(|k| last.contains(k)) {
            carried = description.pop();
        }
    }
    let general_description = description.join("\n");

    // 3) scan the remainder for [metadata, header, rows] groups
    let mut tables = Vec::new();
    let mut last_nonblank: Option<String> = None;
    let mut i = desc_end;
    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();

        if trimmed.is_empty() {
            i += 1;
            continue;
        }

        if line.starts_with(',') {
            // header row: the nearest non-blank line above it is the
            // table's metadata, falling back to the carried-over hint
            let metadata = last_nonblank
                .take()
                .or_else(|| carried.clone())
                .unwrap_or_default();
            let mut headers: Vec<String> =
                line.split(',').map(|h| h.trim().to_string()).collect();
            headers[0] = "Date".to_string();
            i += 1;

            let mut rows: Vec<Vec<String>> = Vec::new();
            while i < lines.len() && !lines[i].trim().is_empty() {
                rows.push(
                    lines[i]
                        .split(',')
                        .map(|v| v.trim().to_string())
                        .collect(),
                );
                i += 1;
            }

            if rows.is_empty() {
                debug!(%metadata, "dropping table with no data rows");
                continue;
            }
            let is_annual = metadata.contains("Annual");
            tables.push(RawTable {
                metadata,
                spanners: String::new(),
                headers,
                rows,
                is_annual,
            });
            continue;
        }

        if trimmed.contains("--") && FREQUENCY_HINT.iter().any(|k| trimmed.contains(k)) {
            // standalone metadata line for the next table
            carried = Some(trimmed.to_string());
            last_nonblank = Some(trimmed.to_string());
            i += 1;
            continue;
        }

        last_nonblank = Some(trimmed.to_string());
        i += 1;
    }

    debug!(tables = tables.len(), "segmented csv member");
    CsvDocument {
        general_description,
        tables,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Some General Description
More description text
Value Weighted Returns -- Monthly
,SMALL LoBM,ME1 BM2
192607,  1.2, 3.4
192608,  2.1, 4.3

Value Weighted Returns -- Annual
,SMALL LoBM,ME1 BM2
1927,  10.0, 20.0
";

    #[test]
    fn segments_two_tables_with_description() {
        let doc = read_csv_file(SAMPLE);
        assert_eq!(
            doc.general_description,
            "Some General Description\nMore description text"
        );
        assert_eq!(doc.tables.len(), 2);

        let first = &doc.tables[0];
        assert_eq!(first.metadata, "Value Weighted Returns -- Monthly");
        assert_eq!(first.headers, vec!["Date", "SMALL LoBM", "ME1 BM2"]);
        assert_eq!(first.rows.len(), 2);
        assert_eq!(first.rows[0], vec!["192607", "1.2", "3.4"]);
        assert!(!first.is_annual);

        let second = &doc.tables[1];
        assert_eq!(second.metadata, "Value Weighted Returns -- Annual");
        assert_eq!(second.rows.len(), 1);
        assert!(second.is_annual);
    }

    #[test]
    fn header_with_no_rows_is_dropped() {
        let text = "Description\n\n,A,B\n\n,C,D\n2020,1,2\n";
        let doc = read_csv_file(text);
        assert_eq!(doc.tables.len(), 1);
        assert_eq!(doc.tables[0].headers, vec!["Date", "C", "D"]);
        assert!(doc
            .tables
            .iter()
            .all(|t| !t.rows.is_empty()), "segmentation must never emit empty tables");
    }

    #[test]
    fn metadata_falls_back_to_initial_hint() {
        // the only metadata is the popped description line; both tables
        // inherit it when nothing closer precedes their header rows
        let text = "\
Top description
Equal Weighted Returns -- Monthly
,A,B
192607,1,2
";
        let doc = read_csv_file(text);
        assert_eq!(doc.general_description, "Top description");
        assert_eq!(doc.tables[0].metadata, "Equal Weighted Returns -- Monthly");
    }

    #[test]
    fn date_led_description_boundary() {
        // no header row at all: description stops at the first date-led line
        let text = "Only description\n192607,1,2\n";
        let doc = read_csv_file(text);
        assert_eq!(doc.general_description, "Only description");
        assert!(doc.tables.is_empty());
    }
}
