// src/select/mod.rs
use anyhow::{bail, Result};
use reqwest::Client;
use tracing::instrument;

use crate::fetch;
use crate::process::{
    dat, international, split, tables, MaterializedTable, TableMeta, ANNUAL, MONTHLY,
};

pub mod choices;

const US_MEASURES: &[&str] = &["value", "equal", "number_of_firms", "firm_size"];
const INTERNATIONAL_MEASURES: &[&str] = &["usd", "local", "ratios"];

/// Parameters for an international portfolio request. Exactly one of
/// `index` and `country` must be set.
#[derive(Debug, Clone)]
pub struct InternationalParams<'a> {
    pub index: Option<&'a str>,
    pub country: Option<&'a str>,
    /// `false` requests the ex-dividend variant of the file.
    pub dividends: bool,
    pub frequency: &'a str,
    pub measure: &'a str,
    pub all_data_items_required: bool,
    /// Reproduce the reference implementation's asymmetric
    /// `all_data_items_required = false` filter, which keeps tables whose
    /// description lacks "Not Reqd" but metadata entries whose description
    /// ends with it. The default keeps both lists aligned.
    pub legacy_not_reqd_filter: bool,
}

impl Default for InternationalParams<'_> {
    fn default() -> Self {
        InternationalParams {
            index: None,
            country: None,
            dividends: true,
            frequency: MONTHLY,
            measure: "usd",
            all_data_items_required: true,
            legacy_not_reqd_filter: false,
        }
    }
}

/// Fetch, decode and filter one US dataset.
#[instrument(level = "info", skip(client))]
pub async fn get_portfolio_data(
    client: &Client,
    dataset: &str,
    frequency: Option<&str>,
    measure: Option<&str>,
) -> Result<(Vec<MaterializedTable>, Vec<TableMeta>)> {
    let text = fetch::zips::download_file(client, dataset).await?;
    let doc = split::read_csv_file(&text);
    let (all_tables, all_meta) =
        tables::process_csv_tables(&doc.tables, &doc.general_description);
    filter_us(
        dataset,
        all_tables,
        all_meta,
        frequency.unwrap_or(MONTHLY),
        measure.unwrap_or("value"),
    )
}

/// Fetch, decode and filter one international index or country portfolio.
#[instrument(level = "info", skip(client, params), fields(index = ?params.index, country = ?params.country))]
pub async fn get_international_portfolio(
    client: &Client,
    params: &InternationalParams<'_>,
) -> Result<(Vec<MaterializedTable>, Vec<TableMeta>)> {
    let url =
        fetch::urls::international_portfolio_url(params.index, params.country, params.dividends)?;
    let text = fetch::zips::download_international_portfolios(client, &url).await?;
    let raw = dat::read_dat_file(&text);
    let (all_tables, all_meta) =
        international::process_international_portfolio_data(&raw, !params.dividends);
    filter_international(
        all_tables,
        all_meta,
        params.frequency,
        params.measure,
        params.all_data_items_required,
        params.legacy_not_reqd_filter,
    )
}

/// Fetch and parse one NYSE breakpoint dataset.
#[instrument(level = "info", skip(client))]
pub async fn get_breakpoint_data(
    client: &Client,
    breakpoint_type: &str,
) -> Result<(Vec<MaterializedTable>, Vec<String>)> {
    let text = fetch::zips::download_breakpoint_file(client, breakpoint_type).await?;
    let (table, metadata) =
        crate::process::breakpoints::parse_breakpoint_file(&text, breakpoint_type)?;
    Ok((vec![table], vec![metadata]))
}

/// US frequency/measure filter. Tables and metadata records are zipped and
/// filtered together so the two lists stay aligned. Datasets whose name
/// contains "Factor" have no value/equal split and skip measure filtering.
pub fn filter_us(
    dataset: &str,
    tables: Vec<MaterializedTable>,
    meta: Vec<TableMeta>,
    frequency: &str,
    measure: &str,
) -> Result<(Vec<MaterializedTable>, Vec<TableMeta>)> {
    let frequency = frequency.to_lowercase();
    if frequency != MONTHLY && frequency != ANNUAL {
        bail!("unsupported frequency '{frequency}', expected 'monthly' or 'annual'");
    }
    let measure = measure.to_lowercase();
    if !US_MEASURES.contains(&measure.as_str()) {
        bail!("unsupported measure '{measure}', expected one of {US_MEASURES:?}");
    }
    if frequency == ANNUAL && matches!(measure.as_str(), "number_of_firms" | "firm_size") {
        bail!("measure '{measure}' is only available at monthly frequency");
    }
    let skip_measure = dataset.contains("Factor");

    let keep = |m: &TableMeta| {
        if !m.frequency.eq_ignore_ascii_case(&frequency) {
            return false;
        }
        if skip_measure {
            return true;
        }
        match measure.as_str() {
            "value" | "equal" => {
                m.description.contains("--")
                    && m.description
                        .split(" -- ")
                        .next()
                        .unwrap_or_default()
                        .to_lowercase()
                        .contains(&measure)
            }
            "number_of_firms" => m.description.contains("Number of Firms"),
            "firm_size" => m.description.contains("Average Firm Size"),
            _ => false,
        }
    };

    Ok(tables
        .into_iter()
        .zip(meta)
        .filter(|(_, m)| keep(m))
        .unzip())
}

/// International frequency/measure filter plus the `all_data_items_required`
/// pass (which does not apply to ratio tables).
pub fn filter_international(
    tables: Vec<MaterializedTable>,
    meta: Vec<TableMeta>,
    frequency: &str,
    measure: &str,
    all_data_items_required: bool,
    legacy_not_reqd_filter: bool,
) -> Result<(Vec<MaterializedTable>, Vec<TableMeta>)> {
    let frequency = frequency.to_lowercase();
    if frequency != MONTHLY && frequency != ANNUAL {
        bail!("unsupported frequency '{frequency}', expected 'monthly' or 'annual'");
    }
    let measure = measure.to_lowercase();
    if !INTERNATIONAL_MEASURES.contains(&measure.as_str()) {
        bail!("unsupported measure '{measure}', expected one of {INTERNATIONAL_MEASURES:?}");
    }
    if frequency == MONTHLY && measure == "ratios" {
        bail!("ratios are published at annual frequency only");
    }

    let keyword = match measure.as_str() {
        "local" => "Local",
        "usd" => "Dollar",
        _ => "Ratios",
    };
    let (mut tables, mut meta): (Vec<_>, Vec<_>) = tables
        .into_iter()
        .zip(meta)
        .filter(|(_, m)| {
            m.frequency.eq_ignore_ascii_case(&frequency) && m.description.contains(keyword)
        })
        .unzip();

    if measure != "ratios" {
        if all_data_items_required {
            let kept: (Vec<_>, Vec<_>) = tables
                .into_iter()
                .zip(meta)
                .filter(|(_, m)| m.description.contains("Required"))
                .unzip();
            tables = kept.0;
            meta = kept.1;
        } else if legacy_not_reqd_filter {
            // reference behavior: the two lists are filtered by different
            // predicates and may come back misaligned
            let kept_tables: Vec<_> = tables
                .into_iter()
                .zip(meta.iter())
                .filter(|(_, m)| !m.description.contains("Not Reqd"))
                .map(|(t, _)| t)
                .collect();
            let kept_meta: Vec<_> = meta
                .into_iter()
                .filter(|m| m.description.ends_with("Not Reqd"))
                .collect();
            tables = kept_tables;
            meta = kept_meta;
        } else {
            let kept: (Vec<_>, Vec<_>) = tables
                .into_iter()
                .zip(meta)
                .filter(|(_, m)| !m.description.contains("Not Reqd"))
                .unzip();
            tables = kept.0;
            meta = kept.1;
        }
    }

    Ok((tables, meta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{Columns, MaterializedTable};

    fn table(tag: &str) -> MaterializedTable {
        MaterializedTable {
            index_names: vec!["Date".to_string()],
            index: vec![vec!["1926-07-01".to_string()]],
            columns: Columns::Flat(vec![tag.to_string()]),
            values: vec![vec![crate::process::Cell::Num(1.0)]],
        }
    }

    fn meta(description: &str, frequency: &str) -> TableMeta {
        TableMeta {
            description: description.to_string(),
            frequency: frequency.to_string(),
            formations: vec![],
        }
    }

    #[test]
    fn us_selection_picks_matching_pairs() {
        let tables = vec![table("a"), table("b")];
        let metas = vec![
            meta("Value Weighted Returns -- Monthly", "monthly"),
            meta("Equal Weighted Returns -- Annual", "annual"),
        ];
        let (t, m) = filter_us("25_Portfolios_5x5", tables, metas, "monthly", "value").unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].description, "Value Weighted Returns -- Monthly");
        assert_eq!(t[0].columns, Columns::Flat(vec!["a".to_string()]));
    }

    #[test]
    fn us_measure_keyword_must_precede_the_separator() {
        let tables = vec![table("a")];
        let metas = vec![meta("Returns -- Monthly Value Weighted", "monthly")];
        let (t, _) = filter_us("x", tables, metas, "monthly", "value").unwrap();
        assert!(t.is_empty(), "keyword after ' -- ' must not match");
    }

    #[test]
    fn us_firm_measures_match_literal_descriptions() {
        let tables = vec![table("a"), table("b")];
        let metas = vec![
            meta("Number of Firms in Portfolios -- Monthly", "monthly"),
            meta("Average Firm Size -- Monthly", "monthly"),
        ];
        let (t, m) = filter_us(
            "x",
            tables.clone(),
            metas.clone(),
            "monthly",
            "number_of_firms",
        )
        .unwrap();
        assert_eq!((t.len(), m.len()), (1, 1));
        let (t, _) = filter_us("x", tables, metas, "monthly", "firm_size").unwrap();
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn us_rejects_bad_parameter_combinations() {
        assert!(filter_us("x", vec![], vec![], "weekly", "value").is_err());
        assert!(filter_us("x", vec![], vec![], "monthly", "median").is_err());
        assert!(filter_us("x", vec![], vec![], "annual", "firm_size").is_err());
        assert!(filter_us("x", vec![], vec![], "annual", "number_of_firms").is_err());
    }

    #[test]
    fn factor_datasets_skip_measure_filtering() {
        let tables = vec![table("a")];
        let metas = vec![meta("The Market Factor", "monthly")];
        let (t, _) =
            filter_us("F-F_Research_Data_Factors", tables, metas, "Monthly", "value").unwrap();
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn international_selection_filters_measure_and_required() {
        let tables = vec![table("a"), table("b"), table("c")];
        let metas = vec![
            meta("Returns in US Dollars - All Items Required", "monthly"),
            meta("Returns in US Dollars - Not Reqd", "monthly"),
            meta("Returns in Local Currency - All Items Required", "monthly"),
        ];
        let (t, m) =
            filter_international(tables, metas, "monthly", "usd", true, false).unwrap();
        assert_eq!((t.len(), m.len()), (1, 1));
        assert!(m[0].description.contains("Required"));
    }

    #[test]
    fn international_unified_not_required_branch_stays_aligned() {
        let tables = vec![table("a"), table("b")];
        let metas = vec![
            meta("Dollar Returns - All Items Required", "monthly"),
            meta("Dollar Returns - Not Reqd", "monthly"),
        ];
        let (t, m) =
            filter_international(tables, metas, "monthly", "usd", false, false).unwrap();
        assert_eq!(t.len(), m.len());
        assert_eq!(m.len(), 1);
        assert!(!m[0].description.contains("Not Reqd"));
    }

    #[test]
    fn international_legacy_branch_reproduces_the_asymmetry() {
        let tables = vec![table("a"), table("b")];
        let metas = vec![
            meta("Dollar Returns - All Items Required", "monthly"),
            meta("Dollar Returns - Not Reqd", "monthly"),
        ];
        let (t, m) = filter_international(tables, metas, "monthly", "usd", false, true).unwrap();
        // tables keep the "Required" entry, metadata keeps the "Not Reqd"
        // suffix entry: the documented reference inconsistency
        assert_eq!(t.len(), 1);
        assert_eq!(m.len(), 1);
        assert!(m[0].description.ends_with("Not Reqd"));
    }

    #[test]
    fn international_rejects_bad_parameter_combinations() {
        assert!(filter_international(vec![], vec![], "monthly", "ratios", true, false).is_err());
        assert!(filter_international(vec![], vec![], "monthly", "eur", true, false).is_err());
        assert!(filter_international(vec![], vec![], "weekly", "usd", true, false).is_err());
        assert!(filter_international(vec![], vec![], "annual", "ratios", true, false).is_ok());
    }

    #[test]
    fn full_pipeline_from_raw_text() {
        let text = "\
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
        let doc = split::read_csv_file(text);
        let (all_tables, all_meta) =
            tables::process_csv_tables(&doc.tables, &doc.general_description);
        assert_eq!(all_tables.len(), 2);

        let (t, m) =
            filter_us("25_Portfolios_5x5", all_tables, all_meta, "monthly", "value").unwrap();
        assert_eq!((t.len(), m.len()), (1, 1));
        assert!(m[0]
            .description
            .starts_with("### Value Weighted Returns -- Monthly"));
        assert_eq!(m[0].formations, vec!["SMALL LoBM", "ME1 BM2"]);
        assert_eq!(t[0].index[0], vec!["1926-07-01".to_string()]);
        assert_eq!(t[0].index[1], vec!["1926-08-01".to_string()]);
    }

    #[test]
    fn ratios_skip_the_required_filter() {
        let tables = vec![table("a")];
        let metas = vec![meta("Annual Ratios - Not Reqd", "annual")];
        let (t, m) = filter_international(tables, metas, "annual", "ratios", true, false).unwrap();
        assert_eq!((t.len(), m.len()), (1, 1));
    }
}
