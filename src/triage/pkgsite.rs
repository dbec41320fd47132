use crate::cache::Cache;
use crate::model::Advisory;
use anyhow::{bail, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

/// Default pkgsite instance.
pub const DEFAULT_PKGSITE_URL: &str = "https://pkg.go.dev";

/// Triage against a pkgsite instance.
///
/// An advisory is relevant when it is public and one of its reference URLs
/// points at a module path that pkgsite knows about.
pub struct PkgsiteTriage {
    client: reqwest::Client,
    base_url: String,
    cache: Option<Cache>,
}

impl PkgsiteTriage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Asks pkgsite whether `module_path` is a known module.
    async fn known_module(&self, module_path: &str) -> Result<bool> {
        let url = format!("{}/mod/{}", self.base_url, module_path);
        let cache_key = format!("pkgsite_{}", url);

        if let Some(cache) = &self.cache {
            if let Some(known) = cache.get::<bool>(&cache_key) {
                return Ok(known);
            }
        }

        let response = self.client.get(&url).send().await?;

        let known = match response.status() {
            StatusCode::OK => true,
            StatusCode::NOT_FOUND => false,
            status => bail!("pkgsite returned {} for {}", status, module_path),
        };
        debug!(module = module_path, known, "pkgsite lookup");

        if let Some(cache) = &self.cache {
            let _ = cache.set(&cache_key, &known);
        }

        Ok(known)
    }
}

#[async_trait]
impl super::Triage for PkgsiteTriage {
    async fn triage(&self, advisory: &Advisory) -> Result<bool> {
        if !advisory.is_public() {
            return Ok(false);
        }

        let mut seen = Vec::new();
        for url in advisory.reference_urls() {
            let Some(module) = candidate_module(url) else {
                continue;
            };
            if seen.contains(&module) {
                continue;
            }
            if self.known_module(&module).await? {
                return Ok(true);
            }
            seen.push(module);
        }

        Ok(false)
    }
}

/// Maps a reference URL to the Go module path it would belong to, if any.
///
/// - `https://github.com/owner/repo/...` → `github.com/owner/repo`
/// - `https://go.googlesource.com/net/...` → `golang.org/x/net`
/// - `https://golang.org/x/net/...` → `golang.org/x/net`
pub fn candidate_module(url: &str) -> Option<String> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let rest = rest.split(['?', '#']).next().unwrap_or(rest);

    let mut parts = rest.split('/').filter(|p| !p.is_empty());
    let host = parts.next()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();

    match host.as_str() {
        "github.com" | "gitlab.com" | "bitbucket.org" => {
            let owner = parts.next()?;
            let repo = parts.next()?;
            let repo = repo.strip_suffix(".git").unwrap_or(repo);
            Some(format!("{}/{}/{}", host, owner, repo))
        }
        "go.googlesource.com" => {
            let repo = parts.next()?;
            Some(format!("golang.org/x/{}", repo))
        }
        "golang.org" => {
            if parts.next()? != "x" {
                return None;
            }
            let repo = parts.next()?;
            Some(format!("golang.org/x/{}", repo))
        }
        _ => None,
    }
}
