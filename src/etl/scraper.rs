use crate::core::{ConfigProvider, Storage};
use crate::etl::files;
use crate::etl::listing::{download_cached, fetch_links, join_url};
use crate::utils::error::Result;
use regex::Regex;
use reqwest::Client;
use std::sync::OnceLock;

fn year_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{4}/$").expect("static regex"))
}

/// Year folders (`2024/`) of the statements index, newest first.
pub fn year_folders(links: &[String]) -> Vec<String> {
    let mut years: Vec<String> = links
        .iter()
        .filter(|l| year_pattern().is_match(l))
        .map(|l| l.trim_end_matches('/').to_string())
        .collect();
    years.sort_unstable_by(|a, b| b.cmp(a));
    years.dedup();
    years
}

/// Zip archives of a year folder, newest first.
pub fn zip_links(links: &[String]) -> Vec<String> {
    let mut zips: Vec<String> = links
        .iter()
        .filter(|l| l.to_lowercase().ends_with(".zip"))
        .cloned()
        .collect();
    zips.sort_unstable_by(|a, b| b.cmp(a));
    zips.dedup();
    zips
}

/// Step 1/5. Downloads the most recent statement archives into `raw/`.
///
/// Archives are saved as `<year>_<name>` so quarters of different years never
/// collide. Every archive taken counts towards `max_downloads`, cached or not.
/// Returns the storage paths of the archives present after the run.
pub async fn scrape_statements<S: Storage, C: ConfigProvider>(
    client: &Client,
    storage: &S,
    config: &C,
) -> Result<Vec<String>> {
    let base_url = config.statements_url();
    let max_downloads = config.max_downloads();
    tracing::info!("🔎 Listing statements at {}", base_url);

    let years = year_folders(&fetch_links(client, base_url).await?);
    tracing::debug!("Year folders: {:?}", years);

    let mut taken = 0usize;
    let mut saved = Vec::new();

    'years: for year in years {
        if taken >= max_downloads {
            break;
        }

        tracing::info!("📅 Checking year {}", year);
        let year_url = join_url(base_url, &format!("{}/", year))?;
        let links = match fetch_links(client, &year_url).await {
            Ok(links) => links,
            Err(e) => {
                tracing::warn!("⚠️ Could not list {}: {}", year_url, e);
                continue;
            }
        };

        for zip_name in zip_links(&links) {
            if taken >= max_downloads {
                break 'years;
            }
            taken += 1;

            let file_url = join_url(&year_url, &zip_name)?;
            let local_name = format!("{}_{}", year, zip_name.rsplit('/').next().unwrap_or(&zip_name));
            let path = files::raw_path(&local_name);

            match download_cached(client, storage, &file_url, &path).await {
                Ok(_) => saved.push(path),
                Err(e) => tracing::warn!("❌ Download of {} failed: {}", file_url, e),
            }
        }
    }

    tracing::info!("Scraper finished: {} archive(s) available", saved.len());
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_year_folders_newest_first() {
        let found = year_folders(&links(&["../", "2022/", "2024/", "README.txt", "2023/", "20245/"]));
        assert_eq!(found, vec!["2024", "2023", "2022"]);
        assert!(std::ptr::eq(year_pattern(), year_pattern()));
    }

    #[test]
    fn test_zip_links_case_insensitive() {
        let found = zip_links(&links(&["1T2024.zip", "2T2024.ZIP", "notes.pdf", "../"]));
        assert_eq!(found, vec!["2T2024.ZIP", "1T2024.zip"]);
    }
}
