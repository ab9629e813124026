/*
[INPUT]:  Caller-supplied task parameters and upstream endpoint config
[OUTPUT]: anyhow::Result - Ok when the input may be sent to the backend
[POS]:    Validation layer - local checks run before any request is issued
[UPDATE]: When the backend tightens its accepted inputs
*/

use std::sync::LazyLock;

use anyhow::{Result, anyhow};
use regex::Regex;
use repack_adapter::{ApiConfig, GithubParams, MarketParams};
use url::Url;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\.(\d+)\.(\d+)(-[\w.-]+)?$").expect("version pattern is valid")
});

/// `MAJOR.MINOR.PATCH` with an optional `-prerelease` tail.
pub fn is_valid_version(version: &str) -> bool {
    VERSION_RE.is_match(version)
}

pub fn is_valid_url(value: &str) -> bool {
    Url::parse(value)
        .map(|url| url.has_host())
        .unwrap_or(false)
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{field} cannot be empty"));
    }
    Ok(())
}

pub fn validate_market_params(params: &MarketParams) -> Result<()> {
    require("Plugin author", &params.author)?;
    require("Plugin name", &params.name)?;
    require("Plugin version", &params.version)?;
    if !is_valid_version(params.version.trim()) {
        return Err(anyhow!(
            "Invalid plugin version '{}', expected e.g. 1.2.3",
            params.version
        ));
    }
    Ok(())
}

/// `repo` may be `owner/name` or a full repository URL.
pub fn validate_github_params(params: &GithubParams) -> Result<()> {
    require("Repository", &params.repo)?;
    require("Release", &params.release)?;
    require("Asset name", &params.asset_name)?;

    let repo = params.repo.trim();
    let is_slug = matches!(
        repo.split('/').collect::<Vec<_>>().as_slice(),
        [owner, name] if !owner.is_empty() && !name.is_empty()
    );
    if !is_slug && !is_valid_url(repo) {
        return Err(anyhow!(
            "Invalid repository '{}', expected owner/name or a URL",
            params.repo
        ));
    }
    Ok(())
}

pub fn validate_api_config(config: &ApiConfig) -> Result<()> {
    let fields = [
        ("GitHub API URL", &config.github_api_url),
        ("Marketplace API URL", &config.marketplace_api_url),
        ("pip mirror URL", &config.pip_mirror_url),
    ];
    for (field, value) in fields {
        if !is_valid_url(value) {
            return Err(anyhow!("{field} is not a valid URL: '{value}'"));
        }
    }
    Ok(())
}
