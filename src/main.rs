use anyhow::{bail, Result};
use ffscraper::{
    fetch::urls,
    get_breakpoint_data, get_international_portfolio, get_portfolio_data, InternationalParams,
    MaterializedTable, TableMeta,
};
use reqwest::Client;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    // ─── 2) parse args ───────────────────────────────────────────────
    let args: Vec<String> = std::env::args().skip(1).collect();
    let client = Client::new();

    match args.first().map(String::as_str) {
        Some("list") => {
            for name in urls::DATASET_URLS.keys() {
                println!("{name}");
            }
            Ok(())
        }
        Some("breakpoints") => {
            let Some(breakpoint_type) = args.get(1) else {
                bail!("usage: ffscraper breakpoints <me|be-me|e-p|cf-p|d-p>");
            };
            let (tables, meta) = get_breakpoint_data(&client, breakpoint_type).await?;
            for m in &meta {
                println!("{m}");
            }
            print_tables(&tables);
            Ok(())
        }
        Some("international") => {
            let Some(country) = args.get(1) else {
                bail!("usage: ffscraper international <country> [frequency] [measure]");
            };
            let params = InternationalParams {
                country: Some(country),
                frequency: args.get(2).map(String::as_str).unwrap_or("monthly"),
                measure: args.get(3).map(String::as_str).unwrap_or("usd"),
                ..Default::default()
            };
            let (tables, meta) = get_international_portfolio(&client, &params).await?;
            print_meta(&meta)?;
            print_tables(&tables);
            Ok(())
        }
        Some(dataset) => {
            let (tables, meta) = get_portfolio_data(
                &client,
                dataset,
                args.get(1).map(String::as_str),
                args.get(2).map(String::as_str),
            )
            .await?;
            print_meta(&meta)?;
            print_tables(&tables);
            Ok(())
        }
        None => bail!(
            "usage: ffscraper <dataset> [frequency] [measure] | list | \
             international <country> [frequency] [measure] | breakpoints <type>"
        ),
    }
}

fn print_meta(meta: &[TableMeta]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(meta)?);
    Ok(())
}

fn print_tables(tables: &[MaterializedTable]) {
    info!(tables = tables.len(), "decoded");
    for (i, table) in tables.iter().enumerate() {
        let first = table.index.first().map(|k| k.join("/")).unwrap_or_default();
        let last = table.index.last().map(|k| k.join("/")).unwrap_or_default();
        println!(
            "table {i}: {} rows x {} columns, {first} .. {last}",
            table.index.len(),
            table.columns.len(),
        );
    }
}
