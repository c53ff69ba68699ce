use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use semver::Version;
use serde::Deserialize;

const RELEASES_URL: &str = "https://api.github.com/repos/noor-app/noor-tui/releases/latest";

pub const SKIP_UPDATE_ENV: &str = "NOOR_TUI_SKIP_UPDATE_CHECK";

#[derive(Debug, Clone)]
pub struct UpdateInfo {
    pub version: Version,
    pub release_url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Release {
    tag_name: String,
    html_url: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
}

pub fn check_for_update(current: &Version) -> Result<Option<UpdateInfo>> {
    match fetch_latest_release()? {
        Some(release) => evaluate_release(current, release),
        None => Ok(None),
    }
}

fn fetch_latest_release() -> Result<Option<Release>> {
    let client = Client::builder()
        .timeout(Duration::from_secs(8))
        .user_agent(format!(
            "noor-tui/{version} (update-check)",
            version = crate::VERSION
        ))
        .build()
        .context("build update HTTP client")?;

    let response = client
        .get(RELEASES_URL)
        .header("Accept", "application/vnd.github+json")
        .send()
        .context("request latest release metadata")?;

    match response.status() {
        StatusCode::NOT_FOUND => return Ok(None),
        StatusCode::FORBIDDEN => bail!("rate limited by GitHub while checking for updates"),
        status if !status.is_success() => bail!("update check failed with status {}", status),
        _ => {}
    }

    let release = response
        .json()
        .context("decode release response from GitHub")?;
    Ok(Some(release))
}

fn evaluate_release(current: &Version, release: Release) -> Result<Option<UpdateInfo>> {
    if release.draft || release.prerelease {
        return Ok(None);
    }

    let tag = release.tag_name.clone();
    let version = Version::parse(normalize_tag(&tag))
        .with_context(|| format!("parse release tag {tag:?} as semantic version"))?;

    if &version > current {
        Ok(Some(UpdateInfo {
            version,
            release_url: release.html_url,
        }))
    } else {
        Ok(None)
    }
}

fn normalize_tag(tag: &str) -> &str {
    let tag = tag.trim();
    tag.strip_prefix('v')
        .or_else(|| tag.strip_prefix('V'))
        .unwrap_or(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(tag: &str) -> Release {
        Release {
            tag_name: tag.to_string(),
            html_url: format!("https://github.com/noor-app/noor-tui/releases/tag/{tag}"),
            draft: false,
            prerelease: false,
        }
    }

    #[test]
    fn tag_normalization_strips_a_version_prefix() {
        assert_eq!(normalize_tag("v1.2.3"), "1.2.3");
        assert_eq!(normalize_tag("V2.0.0"), "2.0.0");
        assert_eq!(normalize_tag(" 0.1.0 "), "0.1.0");
        assert_eq!(normalize_tag("0.9.1"), "0.9.1");
    }

    #[test]
    fn newer_releases_are_reported() {
        let current = Version::parse("0.1.0").unwrap();
        let info = evaluate_release(&current, release("v0.2.0")).unwrap();
        assert_eq!(info.unwrap().version, Version::parse("0.2.0").unwrap());
    }

    #[test]
    fn older_and_equal_releases_are_ignored() {
        let current = Version::parse("0.2.0").unwrap();
        assert!(evaluate_release(&current, release("v0.2.0"))
            .unwrap()
            .is_none());
        assert!(evaluate_release(&current, release("v0.1.9"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn drafts_and_prereleases_are_ignored() {
        let current = Version::parse("0.1.0").unwrap();
        let mut draft = release("v9.9.9");
        draft.draft = true;
        assert!(evaluate_release(&current, draft).unwrap().is_none());

        let mut pre = release("v9.9.9");
        pre.prerelease = true;
        assert!(evaluate_release(&current, pre).unwrap().is_none());
    }

    #[test]
    fn malformed_tags_are_errors() {
        let current = Version::parse("0.1.0").unwrap();
        assert!(evaluate_release(&current, release("latest")).is_err());
    }
}
