// src/process/date_parser.rs
use chrono::NaiveDate;

/// Outcome of normalizing one raw date token. A `Fallback` keeps the
/// original token so the caller can degrade the whole column to strings
/// instead of aborting the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateParse {
    Parsed(String),
    Fallback(String),
}

impl DateParse {
    pub fn into_inner(self) -> String {
        match self {
            DateParse::Parsed(s) | DateParse::Fallback(s) => s,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, DateParse::Parsed(_))
    }
}

/// Normalize a raw date token to ISO "YYYY-MM-DD".
///
/// - 4 digits (year) → "YYYY-12-31", fiscal year-end convention.
/// - 6 digits (YYYYMM) → first day of that month, "YYYY-MM-01". Month-end
///   snapping is reserved for breakpoint files ([`month_end_date`]);
///   downstream frequency classification relies on this asymmetry.
/// - 8 digits (YYYYMMDD) → dashes inserted, digit content unchanged.
/// - anything else passes through as a Fallback.
pub fn apply_date(token: &str) -> DateParse {
    let t = token.trim();
    if !t.chars().all(|c| c.is_ascii_digit()) {
        return DateParse::Fallback(t.to_string());
    }
    match t.len() {
        4 => DateParse::Parsed(format!("{t}-12-31")),
        6 => match ymd(&t[0..4], &t[4..6], "01") {
            Some(_) => DateParse::Parsed(format!("{}-{}-01", &t[0..4], &t[4..6])),
            None => DateParse::Fallback(t.to_string()),
        },
        8 => match ymd(&t[0..4], &t[4..6], &t[6..8]) {
            Some(_) => DateParse::Parsed(format!("{}-{}-{}", &t[0..4], &t[4..6], &t[6..8])),
            None => DateParse::Fallback(t.to_string()),
        },
        _ => DateParse::Fallback(t.to_string()),
    }
}

/// Breakpoint-file date handling: 6-digit tokens snap to the *last*
/// calendar day of the month, 4-digit tokens to Dec 31.
pub fn month_end_date(token: &str) -> DateParse {
    let t = token.trim();
    if !t.chars().all(|c| c.is_ascii_digit()) {
        return DateParse::Fallback(t.to_string());
    }
    match t.len() {
        4 => DateParse::Parsed(format!("{t}-12-31")),
        6 => match ymd(&t[0..4], &t[4..6], "01") {
            Some(first) => {
                let last = last_day_of_month(first);
                DateParse::Parsed(last.format("%Y-%m-%d").to_string())
            }
            None => DateParse::Fallback(t.to_string()),
        },
        _ => DateParse::Fallback(t.to_string()),
    }
}

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

fn last_day_of_month(first: NaiveDate) -> NaiveDate {
    let (y, m) = (chrono::Datelike::year(&first), chrono::Datelike::month(&first));
    let next_first = if m == 12 {
        NaiveDate::from_ymd_opt(y + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(y, m + 1, 1)
    };
    // both branches are valid calendar dates by construction
    next_first.unwrap().pred_opt().unwrap()
}
