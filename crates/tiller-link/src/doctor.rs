use anyhow::{Context, Result};
use reqwest::Url;

use crate::LinkConfig;

pub fn check_link(cfg: &LinkConfig) -> Result<()> {
    let url = Url::parse(&cfg.base_url).with_context(|| format!("device.base_url invalid: {}", cfg.base_url))?;
    anyhow::ensure!(
        matches!(url.scheme(), "http" | "https"),
        "device.base_url must be http:// or https:// (got {}://)",
        url.scheme()
    );
    anyhow::ensure!(url.host_str().is_some(), "device.base_url has no host");
    if let Some(ms) = cfg.request_timeout_ms {
        anyhow::ensure!(ms >= 100, "device.request_timeout_ms too small; set >= 100");
    }
    Ok(())
}
