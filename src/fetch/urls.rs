// src/fetch/urls.rs
use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use url::Url;

/// FTP root the data library serves its ZIP archives from.
pub const FF_BASE_URL: &str = "https://mba.tuck.dartmouth.edu/pages/faculty/ken.french/ftp/";

/// The human-facing library index page, scraped for available archives.
pub const LIBRARY_PAGE_URL: &str =
    "https://mba.tuck.dartmouth.edu/pages/faculty/ken.french/data_library.html";

/// US single-country datasets: canonical name → archive URL. Loaded once
/// and read-only from then on.
pub static DATASET_URLS: Lazy<BTreeMap<&'static str, String>> = Lazy::new(|| {
    [
        "100_Portfolios_10x10",
        "25_Portfolios_5x5",
        "6_Portfolios_2x3",
        "Developed_3_Factors",
        "Developed_5_Factors",
        "Developed_Mom_Factor",
        "Emerging_5_Factors",
        "Emerging_MOM_Factor",
        "F-F_Momentum_Factor",
        "F-F_Research_Data_5_Factors_2x3",
        "F-F_Research_Data_Factors",
        "F-F_Research_Data_Factors_daily",
        "Portfolios_Formed_on_BE-ME",
        "Portfolios_Formed_on_ME",
        "Portfolios_Formed_on_OP",
        "Portfolios_Formed_on_INV",
    ]
    .iter()
    .map(|name| (*name, format!("{FF_BASE_URL}{name}_CSV.zip")))
    .collect()
});

/// Breakpoint datasets, keyed by breakpoint type.
pub static BREAKPOINT_URLS: Lazy<BTreeMap<&'static str, String>> = Lazy::new(|| {
    [
        ("me", "ME_Breakpoints_CSV.zip"),
        ("be-me", "BE-ME_Breakpoints_CSV.zip"),
        ("e-p", "E-P_Breakpoints_CSV.zip"),
        ("cf-p", "CF-P_Breakpoints_CSV.zip"),
        ("d-p", "D-P_Breakpoints_CSV.zip"),
    ]
    .iter()
    .map(|(k, file)| (*k, format!("{FF_BASE_URL}{file}")))
    .collect()
});

/// International index portfolios: index name → archive file stem.
pub static INDEX_PORTFOLIOS: Lazy<BTreeMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("eafe", "EAFE_Index_Portfolios"),
        ("eafe_ex_japan", "EAFE_ex_Japan_Index_Portfolios"),
        ("europe", "Europe_Index_Portfolios"),
        ("japan", "Japan_Index_Portfolios"),
        ("asia_pacific_ex_japan", "Asia_Pacific_ex_Japan_Index_Portfolios"),
    ]
    .into_iter()
    .collect()
});

/// Country portfolios: country name → archive file stem.
pub static COUNTRY_PORTFOLIOS: Lazy<BTreeMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("australia", "Australia"),
        ("austria", "Austria"),
        ("belgium", "Belgium"),
        ("canada", "Canada"),
        ("france", "France"),
        ("germany", "Germany"),
        ("hong_kong", "Hong_Kong"),
        ("italy", "Italy"),
        ("japan", "Japan"),
        ("netherlands", "Netherlands"),
        ("norway", "Norway"),
        ("singapore", "Singapore"),
        ("spain", "Spain"),
        ("sweden", "Sweden"),
        ("switzerland", "Switzerland"),
        ("united_kingdom", "United_Kingdom"),
    ]
    .into_iter()
    .collect()
});

/// Resolve a US dataset identifier to its archive URL.
pub fn resolve_dataset_url(dataset: &str) -> Result<&'static str> {
    match DATASET_URLS.get(dataset) {
        Some(url) => Ok(url.as_str()),
        None => bail!("unknown dataset '{dataset}'"),
    }
}

/// Resolve a breakpoint type to its archive URL.
pub fn resolve_breakpoint_url(breakpoint_type: &str) -> Result<&'static str> {
    match BREAKPOINT_URLS.get(breakpoint_type) {
        Some(url) => Ok(url.as_str()),
        None => bail!(
            "unknown breakpoint type '{breakpoint_type}', expected one of {:?}",
            BREAKPOINT_URLS.keys().collect::<Vec<_>>()
        ),
    }
}

/// Build the archive URL for an international portfolio request. Exactly
/// one of `index` and `country` must be given; `dividends = false` selects
/// the ex-dividend variant of the file.
pub fn international_portfolio_url(
    index: Option<&str>,
    country: Option<&str>,
    dividends: bool,
) -> Result<String> {
    let stem = match (index, country) {
        (Some(_), Some(_)) => bail!("'index' and 'country' are mutually exclusive"),
        (None, None) => bail!("one of 'index' or 'country' is required"),
        (Some(ix), None) => match INDEX_PORTFOLIOS.get(ix.to_lowercase().as_str()) {
            Some(stem) => *stem,
            None => bail!(
                "unknown index '{ix}', expected one of {:?}",
                INDEX_PORTFOLIOS.keys().collect::<Vec<_>>()
            ),
        },
        (None, Some(c)) => match COUNTRY_PORTFOLIOS.get(c.to_lowercase().as_str()) {
            Some(stem) => *stem,
            None => bail!(
                "unknown country '{c}', expected one of {:?}",
                COUNTRY_PORTFOLIOS.keys().collect::<Vec<_>>()
            ),
        },
    };
    if dividends {
        Ok(format!("{FF_BASE_URL}{stem}.zip"))
    } else {
        Ok(format!("{FF_BASE_URL}{stem}_ex_Div.zip"))
    }
}

/// Scrape the library index page for every published ZIP link. Useful for
/// keeping the static catalogs honest against what the site actually
/// serves.
pub async fn fetch_library_zip_urls(client: &Client) -> Result<Vec<String>> {
    let selector =
        Selector::parse(r#"a[href$=".zip"]"#).expect("CSS selector for ZIP links should be valid");
    let base = Url::parse(LIBRARY_PAGE_URL)?;
    let html = client
        .get(LIBRARY_PAGE_URL)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    let doc = Html::parse_document(&html);
    let links = doc
        .select(&selector)
        .filter_map(|e| e.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .map(|u| u.to_string())
        .collect();
    Ok(links)
}
