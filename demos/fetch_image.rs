//! Download example
//!
//! Fetches a binary resource with progress reporting, twice: the second call is
//! served from the URL cache.
//!
//! Run with: cargo run --example fetch_image -- <url> [output-file]

use anyhow::{bail, Context};
use apiclient_http::{ApiClient, ApiRequest, CachePolicy, ClientConfig};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .context("usage: fetch_image <url> [output-file]")?;
    let output = args.next();

    let client = ApiClient::with_config(ClientConfig::from_env()?);
    let policy = CachePolicy::new(Duration::from_secs(600));

    println!("Fetching {}", url);
    let request = ApiRequest::get(&url)?.with_cache_policy(policy);
    let response = client
        .send_bytes(&request, |progress| match progress.fraction() {
            Some(f) => println!("  {:>5.1}% ({} bytes)", f * 100.0, progress.bytes_read),
            None => println!("  {} bytes", progress.bytes_read),
        })
        .await?;

    let Some(bytes) = response.content() else {
        bail!("download failed: {} {:?} {:?}", response.kind(), response.status(), response.reason());
    };
    println!("Received {} bytes", bytes.len());

    let stats = client.download_stats();
    println!(
        "Wire: {} bytes, decoded: {} bytes",
        stats.compressed_bytes, stats.decompressed_bytes
    );

    let again = ApiRequest::get(&url)?.with_cache_policy(policy);
    let cached = client.send_bytes(&again, |_| {}).await?;
    println!(
        "Second fetch from cache: {} ({} bytes)",
        cached.from_cache,
        cached.content().map_or(0, |b| b.len())
    );

    if let Some(path) = output {
        std::fs::write(&path, bytes).with_context(|| format!("writing {}", path))?;
        println!("Saved to {}", path);
    }
    Ok(())
}
