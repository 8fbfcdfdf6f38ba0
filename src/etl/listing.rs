use crate::core::Storage;
use crate::utils::error::{EtlError, Result};
use regex::Regex;
use reqwest::Client;
use std::sync::OnceLock;
use url::Url;

fn href_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)<a\s[^>]*href\s*=\s*["']([^"']+)["']"#).expect("static regex")
    })
}

/// All anchor targets of an HTML directory listing, in document order.
pub fn extract_links(html: &str) -> Vec<String> {
    href_pattern()
        .captures_iter(html)
        .map(|caps| caps[1].to_string())
        .collect()
}

pub fn join_url(base: &str, href: &str) -> Result<String> {
    let base = Url::parse(base).map_err(|e| EtlError::InvalidConfigValueError {
        field: "listing_url".to_string(),
        value: base.to_string(),
        reason: e.to_string(),
    })?;
    base.join(href)
        .map(String::from)
        .map_err(|e| EtlError::processing(format!("bad link '{}': {}", href, e)))
}

pub async fn fetch_links(client: &Client, url: &str) -> Result<Vec<String>> {
    tracing::debug!("Listing {}", url);
    let response = client.get(url).send().await?.error_for_status()?;
    let html = response.text().await?;
    Ok(extract_links(&html))
}

/// Downloads `url` into `path` unless the file is already there.
/// Returns `false` when the cached copy was kept.
pub async fn download_cached<S: Storage>(
    client: &Client,
    storage: &S,
    url: &str,
    path: &str,
) -> Result<bool> {
    if storage.exists(path).await {
        tracing::info!("📂 Already downloaded: {}", path);
        return Ok(false);
    }

    tracing::info!("📥 Downloading {}", url);
    let response = client.get(url).send().await?.error_for_status()?;
    let bytes = response.bytes().await?;
    storage.write_file(path, &bytes).await?;
    tracing::info!("✅ Saved {} ({} bytes)", path, bytes.len());
    Ok(true)
}
