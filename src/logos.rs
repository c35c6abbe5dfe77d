use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use reqwest::Url;
use rusqlite::Connection;
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::http_client::{fetch_bytes, fetch_text, http_client};
use crate::store::Store;

const CONTAINER_SELECTOR: &str = "div.data-header__profile-container";

/// The competition page no longer has the shape the scraper expects.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogoError {
    #[error("logo container (div.data-header__profile-container) not found on {page}")]
    ContainerMissing { page: String },
    #[error("logo container on {page} has no <img>")]
    ImageMissing { page: String },
    #[error("logo <img> on {page} has no src attribute")]
    SourceMissing { page: String },
    #[error("logo src {src:?} on {page} is not a usable url")]
    InvalidSource { page: String, src: String },
}

/// Page and image retrieval, split out so the stage can run offline in tests.
pub trait PageFetcher {
    fn fetch_page(&self, url: &str) -> Result<String>;
    fn fetch_image(&self, url: &str) -> Result<Vec<u8>>;
}

/// The shared blocking client with its browser User-Agent.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpPageFetcher;

impl PageFetcher for HttpPageFetcher {
    fn fetch_page(&self, url: &str) -> Result<String> {
        fetch_text(http_client()?, url)
    }

    fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        fetch_bytes(http_client()?, url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompetitionPage {
    pub competition_id: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogoFetchSummary {
    pub downloaded: Vec<String>,
    pub already_present: usize,
    pub without_url: usize,
}

/// First `<img src>` inside the profile header, resolved against the page.
pub fn extract_logo_url(html: &str, page_url: &str) -> Result<String, LogoError> {
    let document = Html::parse_document(html);
    let container_sel = Selector::parse(CONTAINER_SELECTOR).map_err(|_| LogoError::ContainerMissing {
        page: page_url.to_string(),
    })?;
    let img_sel = Selector::parse("img").map_err(|_| LogoError::ImageMissing {
        page: page_url.to_string(),
    })?;

    let container = document
        .select(&container_sel)
        .next()
        .ok_or_else(|| LogoError::ContainerMissing {
            page: page_url.to_string(),
        })?;
    let img = container
        .select(&img_sel)
        .next()
        .ok_or_else(|| LogoError::ImageMissing {
            page: page_url.to_string(),
        })?;
    let src = img
        .value()
        .attr("src")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LogoError::SourceMissing {
            page: page_url.to_string(),
        })?;

    let invalid = || LogoError::InvalidSource {
        page: page_url.to_string(),
        src: src.to_string(),
    };
    let resolved = match Url::parse(src) {
        Ok(url) => url,
        Err(_) => Url::parse(page_url)
            .and_then(|base| base.join(src))
            .map_err(|_| invalid())?,
    };
    Ok(resolved.to_string())
}

pub fn load_competition_pages(conn: &Connection) -> Result<Vec<CompetitionPage>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT DISTINCT competition_id, url
            FROM competitions
            ORDER BY competition_id ASC
            "#,
        )
        .context("prepare competition pages query")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(CompetitionPage {
                competition_id: row.get(0)?,
                url: row.get(1)?,
            })
        })
        .context("query competition pages")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode competition page row")?);
    }
    Ok(out)
}

/// Downloads the logo of every competition that does not have one on disk yet.
///
/// Network failures and pages without the expected structure abort the run;
/// logos written before the failure stay in place.
pub fn fetch_league_logos(
    store: &Store,
    config: &PipelineConfig,
    fetcher: &dyn PageFetcher,
) -> Result<LogoFetchSummary> {
    let pages = store.session(|conn| load_competition_pages(conn))?;
    let dir = config.league_logos_dir();
    fs::create_dir_all(&dir).with_context(|| format!("create directory {}", dir.display()))?;

    let mut summary = LogoFetchSummary::default();
    for page in pages {
        let path = config.league_logo_path(&page.competition_id);
        if path.exists() {
            summary.already_present += 1;
            continue;
        }
        let Some(url) = page.url.as_deref().filter(|u| !u.trim().is_empty()) else {
            warn!(
                competition = %page.competition_id,
                "competition has no profile url, logo skipped"
            );
            summary.without_url += 1;
            continue;
        };
        download_logo(fetcher, &page.competition_id, url, path)?;
        summary.downloaded.push(page.competition_id);
    }

    info!(
        downloaded = summary.downloaded.len(),
        already_present = summary.already_present,
        without_url = summary.without_url,
        "league logos refreshed"
    );
    Ok(summary)
}

fn download_logo(fetcher: &dyn PageFetcher, competition_id: &str, page_url: &str, path: PathBuf) -> Result<()> {
    let html = fetcher
        .fetch_page(page_url)
        .with_context(|| format!("fetch competition page for {competition_id}"))?;
    let image_url = extract_logo_url(&html, page_url)?;
    let bytes = fetcher
        .fetch_image(&image_url)
        .with_context(|| format!("fetch logo image for {competition_id}"))?;
    fs::write(&path, bytes).with_context(|| format!("write logo {}", path.display()))?;
    info!(competition = %competition_id, path = %path.display(), "logo downloaded");
    Ok(())
}
