//! HTTP boundary: the only layer whose failures surface as errors.
//!
//! Everything downstream of a fetched payload degrades gracefully; a
//! failed fetch fails the whole load for that source group.

mod basic;
mod client;

pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::Result;
use serde_json::Value;

pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    Ok(resp.bytes().await?.to_vec())
}

/// Fetches and decodes a JSON payload.
pub async fn fetch_json<C: HttpClient>(client: &C, url: &str) -> Result<Value> {
    let bytes = fetch_bytes(client, url).await?;
    Ok(serde_json::from_slice(&bytes)?)
}
