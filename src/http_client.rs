use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;

/// Competition pages reject requests that do not look like a browser.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

static CLIENT: OnceCell<Client> = OnceCell::new();

// No explicit timeout: long dataset downloads ride on the client defaults.
pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .context("failed to build http client")
    })
}

pub fn fetch_bytes(client: &Client, url: &str) -> Result<Vec<u8>> {
    let resp = client
        .get(url)
        .send()
        .with_context(|| format!("request {url}"))?
        .error_for_status()
        .with_context(|| format!("status for {url}"))?;
    let bytes = resp.bytes().with_context(|| format!("read body {url}"))?;
    Ok(bytes.to_vec())
}

pub fn fetch_text(client: &Client, url: &str) -> Result<String> {
    let resp = client
        .get(url)
        .send()
        .with_context(|| format!("request {url}"))?
        .error_for_status()
        .with_context(|| format!("status for {url}"))?;
    resp.text().with_context(|| format!("read body {url}"))
}
