//! Memoizes HTTP body downloads across a stream of duplicate URLs.
//!
//! Every URL is fetched at most once; repeated requests are served from the
//! cache and report near-zero latency:
//!
//! ```sh
//! cargo run --example fetch -- https://www.rust-lang.org https://www.rust-lang.org
//! ```

use std::time::Instant;

use anyhow::Result;
use bytes::Bytes;
use futures::future::BoxFuture;
use memocache::{CacheActor, CacheConfig, Computation};

/// Download failures collapse to their message, so they can be cloned and
/// replayed to every caller of the same URL.
#[derive(Debug, Clone, thiserror::Error)]
#[error("download failed: {0}")]
struct DownloadError(String);

struct FetchBody {
    client: reqwest::Client,
}

impl Computation for FetchBody {
    type Key = String;
    type Value = Bytes;
    type Error = DownloadError;

    fn compute(&self, url: String) -> BoxFuture<'static, Result<Bytes, DownloadError>> {
        let client = self.client.clone();
        Box::pin(async move {
            let response = client
                .get(&url)
                .send()
                .await
                .map_err(|e| DownloadError(e.to_string()))?;
            response
                .bytes()
                .await
                .map_err(|e| DownloadError(e.to_string()))
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut urls: Vec<String> = std::env::args().skip(1).collect();
    if urls.is_empty() {
        urls = [
            "https://www.rust-lang.org",
            "https://crates.io",
            "https://www.rust-lang.org",
            "https://crates.io",
        ]
        .map(String::from)
        .into();
    }

    let config = CacheConfig {
        name: "fetch".into(),
        ..Default::default()
    };
    let cache = CacheActor::with_config(
        FetchBody {
            client: reqwest::Client::new(),
        },
        config,
    );

    let fetches: Vec<_> = urls
        .into_iter()
        .map(|url| {
            let cache = cache.clone();
            tokio::spawn(async move {
                let start = Instant::now();
                match cache.get(url.clone()).await {
                    Ok(body) => {
                        println!("{url}: {} bytes in {:.2?}", body.len(), start.elapsed())
                    }
                    Err(err) => println!("{url}: {err}"),
                }
            })
        })
        .collect();

    for fetch in fetches {
        fetch.await?;
    }

    cache.close();
    Ok(())
}
