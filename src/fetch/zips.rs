// src/fetch/zips.rs
use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use reqwest::Client;
use std::io::{Cursor, Read};
use tokio::sync::Mutex;
use tracing::{debug, info};
use zip::ZipArchive;

use crate::fetch::cache::LruCache;
use crate::fetch::urls;

/// Raw member text keyed by dataset identifier (US) or archive URL
/// (international). The lock is held across the download so concurrent
/// callers for the same key never fetch twice.
static DATASET_CACHE: Lazy<Mutex<LruCache<String, String>>> =
    Lazy::new(|| Mutex::new(LruCache::new(64)));

static BREAKPOINT_CACHE: Lazy<Mutex<LruCache<String, String>>> =
    Lazy::new(|| Mutex::new(LruCache::new(8)));

/// Resolve a dataset identifier, fetch its ZIP archive and return the text
/// of the first member.
pub async fn download_file(client: &Client, dataset: &str) -> Result<String> {
    let url = urls::resolve_dataset_url(dataset)?;
    get_or_fetch(&DATASET_CACHE, client, dataset, url).await
}

/// Fetch an international portfolio archive by absolute URL and return the
/// text of the first member. Non-success statuses surface as errors.
pub async fn download_international_portfolios(client: &Client, url: &str) -> Result<String> {
    get_or_fetch(&DATASET_CACHE, client, url, url).await
}

/// Fetch the breakpoint archive for a breakpoint type.
pub async fn download_breakpoint_file(client: &Client, breakpoint_type: &str) -> Result<String> {
    let url = urls::resolve_breakpoint_url(breakpoint_type)?;
    get_or_fetch(&BREAKPOINT_CACHE, client, breakpoint_type, url).await
}

async fn get_or_fetch(
    cache: &Mutex<LruCache<String, String>>,
    client: &Client,
    key: &str,
    url: &str,
) -> Result<String> {
    let mut guard = cache.lock().await;
    if let Some(text) = guard.get(&key.to_string()) {
        debug!(key, "cache hit");
        return Ok(text.clone());
    }
    info!(key, url, "downloading archive");
    let bytes = fetch_zip(client, url).await?;
    let text = extract_first_member(&bytes)
        .with_context(|| format!("failed to extract archive member from {url}"))?;
    guard.insert(key.to_string(), text.clone());
    Ok(text)
}

async fn fetch_zip(client: &Client, url: &str) -> Result<Vec<u8>> {
    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("request to {url} failed"))?
        .error_for_status()
        .with_context(|| format!("non-success status from {url}"))?;
    Ok(resp.bytes().await?.to_vec())
}

/// Extract the first file member of an in-memory ZIP archive as text.
pub fn extract_first_member(bytes: &[u8]) -> Result<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if !entry.is_file() {
            continue;
        }
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut buf)?;
        return Ok(decode_text(buf));
    }
    bail!("archive has no file members");
}

/// UTF-8 with a Latin-1 fallback; the older archive members predate any
/// consistent encoding.
fn decode_text(buf: Vec<u8>) -> String {
    match String::from_utf8(buf) {
        Ok(text) => text,
        Err(err) => err.into_bytes().iter().map(|&b| b as char).collect(),
    }
}
