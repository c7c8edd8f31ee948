// src/process/dat.rs
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument};

use crate::process::RawTable;

/// Explicit comma separator between tables ("," possibly indented).
static SEPARATOR_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*,").expect("separator regex is valid"));

/// Header used by "Firms" tables that carry no header row of their own.
const FIRMS_FALLBACK_HEADER: &[&str] = &["Date", "Firms", "B/M", "E/P", "CE/P", "Yld"];

/// Segmentation states for the whitespace-delimited international format.
/// Tables are delimited by a comma separator line or by a "Data" metadata
/// line once the current table already holds rows; headers may be implicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    SeekingTableStart,
    CollectingMetadata,
    CollectingSpanners,
    CollectingHeader,
    CollectingRows,
}

/// Segment one whitespace-delimited international archive member into
/// RawTables. Malformed tables (no resolvable header) are dropped, not
/// reported: decades of archive format drift make them expected.
#[instrument(level = "debug", skip(text), fields(bytes = text.len()))]
pub fn read_dat_file(text: &str) -> Vec<RawTable> {
    Segmenter::new(text).run()
}

struct Segmenter<'a> {
    lines: Vec<&'a str>,
    pos: usize,
    state: State,
    meta: Vec<String>,
    spanners: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    tables: Vec<RawTable>,
}

impl<'a> Segmenter<'a> {
    fn new(text: &'a str) -> Self {
        Segmenter {
            lines: text.lines().collect(),
            pos: 0,
            state: State::SeekingTableStart,
            meta: Vec::new(),
            spanners: String::new(),
            headers: Vec::new(),
            rows: Vec::new(),
            tables: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<RawTable> {
        while self.pos < self.lines.len() {
            match self.state {
                State::SeekingTableStart => self.seek_table_start(),
                State::CollectingMetadata => self.collect_metadata(),
                State::CollectingSpanners => self.collect_spanners(),
                State::CollectingHeader => self.collect_header(),
                State::CollectingRows => self.collect_rows(),
            }
        }
        // end of input flushes whatever accumulated
        self.flush();
        debug!(tables = self.tables.len(), "segmented dat member");
        self.tables
    }

    fn line(&self) -> &'a str {
        self.lines[self.pos]
    }

    fn seek_table_start(&mut self) {
        let line = self.line();
        if line.trim().is_empty() || SEPARATOR_LINE.is_match(line) {
            self.pos += 1;
        } else {
            self.state = State::CollectingMetadata;
        }
    }

    fn collect_metadata(&mut self) {
        let line = self.line();
        let trimmed = line.trim();

        if SEPARATOR_LINE.is_match(line) {
            // explicit boundary before any rows accumulated: discard
            self.flush();
            self.pos += 1;
            self.state = State::SeekingTableStart;
            return;
        }
        if trimmed.is_empty() {
            // blank separator between metadata and the table body
            while self.pos < self.lines.len() && self.line().trim().is_empty() {
                self.pos += 1;
            }
            self.state = State::CollectingSpanners;
            return;
        }
        if trimmed.contains("--")
            || self.is_firms_header(trimmed)
            || is_data_row(trimmed)
        {
            self.state = State::CollectingSpanners;
            return;
        }
        self.meta.push(trimmed.to_string());
        self.pos += 1;
    }

    fn collect_spanners(&mut self) {
        if self.pos < self.lines.len() && self.line().contains("--") {
            self.spanners = self.line().trim().to_string();
            self.pos += 1;
        }
        self.state = State::CollectingHeader;
    }

    fn collect_header(&mut self) {
        if self.pos >= self.lines.len() {
            return;
        }
        let trimmed = self.line().trim();
        let tokens: Vec<&str> = trimmed.split_whitespace().collect();

        if tokens.contains(&"Firms") || (!trimmed.is_empty() && !starts_with_digit(trimmed)) {
            self.headers = std::iter::once("Date".to_string())
                .chain(tokens.iter().map(|t| t.to_string()))
                .collect();
            self.pos += 1;
            self.state = State::CollectingRows;
        } else if self.meta.join("\n").contains("Firms") {
            // implicit header: the data rows start immediately
            self.headers = FIRMS_FALLBACK_HEADER.iter().map(|s| s.to_string()).collect();
            self.state = State::CollectingRows;
        } else {
            debug!(meta = %self.meta.join(" / "), "dropping table with unresolvable header");
            self.skip_to_boundary();
            self.reset();
            self.state = State::SeekingTableStart;
        }
    }

    fn collect_rows(&mut self) {
        let line = self.line();
        if SEPARATOR_LINE.is_match(line) {
            self.flush();
            self.pos += 1;
            self.state = State::SeekingTableStart;
            return;
        }
        if line.contains("Data") && !self.rows.is_empty() {
            // implicit boundary: this line opens the next table's metadata
            self.flush();
            self.state = State::SeekingTableStart;
            return;
        }
        let trimmed = line.trim();
        if trimmed.contains('©')
            || trimmed.contains("Copyright")
            || !trimmed.chars().any(|c| c.is_ascii_digit())
        {
            // noise, not data
            self.pos += 1;
            return;
        }
        self.rows
            .push(trimmed.split_whitespace().map(|t| t.to_string()).collect());
        self.pos += 1;
    }

    /// True when the line is a "Firms" header row followed by data.
    fn is_firms_header(&self, trimmed: &str) -> bool {
        trimmed.split_whitespace().any(|t| t == "Firms")
            && self
                .lines
                .get(self.pos + 1)
                .map(|next| starts_with_digit(next.trim()))
                .unwrap_or(false)
    }

    fn skip_to_boundary(&mut self) {
        // always make progress, even if the current line is itself a boundary
        self.pos += 1;
        while self.pos < self.lines.len() {
            let line = self.line();
            if SEPARATOR_LINE.is_match(line) || line.contains("Data") {
                return;
            }
            self.pos += 1;
        }
    }

    fn flush(&mut self) {
        if !self.rows.is_empty() {
            let metadata = self.meta.join("\n");
            let is_annual = metadata.contains("Annual");
            self.tables.push(RawTable {
                metadata,
                spanners: self.spanners.clone(),
                headers: std::mem::take(&mut self.headers),
                rows: std::mem::take(&mut self.rows),
                is_annual,
            });
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.meta.clear();
        self.spanners.clear();
        self.headers.clear();
        self.rows.clear();
    }
}

fn starts_with_digit(s: &str) -> bool {
    s.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false)
}

fn is_data_row(trimmed: &str) -> bool {
    starts_with_digit(trimmed) && trimmed.split_whitespace().count() > 2
}
