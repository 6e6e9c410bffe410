use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, warn};
use url::Url;

use crate::config::StorageConfig;
use crate::models::{ApiConfig, SelectorConfig, SourceConfig, SourceKind, Target};
use crate::utils::error::{AppError, Result};

pub const UNKNOWN_SITE: &str = "Unknown";

#[derive(Debug, Deserialize)]
struct TargetEntry {
    url: String,
}

#[derive(Debug, Deserialize)]
struct TemplateFile {
    #[serde(default, rename = "site")]
    sites: Vec<RawSiteTemplate>,
}

#[derive(Debug, Deserialize)]
struct RawSiteTemplate {
    name: String,
    domains: Vec<String>,
    #[serde(default = "default_kind")]
    kind: SourceKind,
    selectors: Option<SelectorConfig>,
    api: Option<ApiConfig>,
}

fn default_kind() -> SourceKind {
    SourceKind::HtmlSelector
}

/// Named source configuration for one or more domains.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteTemplate {
    pub name: String,
    pub domains: Vec<String>,
    pub source: SourceConfig,
}

impl TryFrom<RawSiteTemplate> for SiteTemplate {
    type Error = AppError;

    fn try_from(raw: RawSiteTemplate) -> Result<Self> {
        let source = match raw.kind {
            SourceKind::HtmlSelector => SourceConfig::HtmlSelector(raw.selectors.ok_or_else(|| {
                AppError::InvalidTarget(format!("site '{}' needs a [site.selectors] table", raw.name))
            })?),
            SourceKind::EncryptedApi => SourceConfig::EncryptedApi(raw.api.unwrap_or_default()),
        };

        Ok(Self {
            name: raw.name,
            domains: raw
                .domains
                .into_iter()
                .map(|d| d.trim().trim_start_matches("www.").to_ascii_lowercase())
                .collect(),
            source,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteTemplates {
    sites: Vec<SiteTemplate>,
}

impl SiteTemplates {
    pub fn from_toml(content: &str) -> Result<Self> {
        let file: TemplateFile = toml::from_str(content)?;
        let sites = file
            .sites
            .into_iter()
            .map(SiteTemplate::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { sites })
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Site name and source configuration for `url`, matched on host or any
    /// parent domain. Unmatched hosts get the default HTML configuration.
    pub fn lookup(&self, url: &Url) -> (String, SourceConfig) {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();

        self.sites
            .iter()
            .find(|site| {
                site.domains
                    .iter()
                    .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)))
            })
            .map(|site| (site.name.clone(), site.source.clone()))
            .unwrap_or_else(|| {
                (
                    UNKNOWN_SITE.to_string(),
                    SourceConfig::HtmlSelector(SelectorConfig::default()),
                )
            })
    }
}

/// The configured target list and site templates, re-read on every cycle
/// so edits apply without a restart.
#[derive(Debug, Clone)]
pub struct TargetCatalog {
    targets_path: PathBuf,
    templates_path: PathBuf,
}

impl TargetCatalog {
    pub fn new(storage: &StorageConfig) -> Self {
        Self {
            targets_path: storage.targets_path.clone(),
            templates_path: storage.templates_path.clone(),
        }
    }

    pub async fn load(&self) -> Result<Vec<Target>> {
        let templates = match tokio::fs::read_to_string(&self.templates_path).await {
            Ok(content) => SiteTemplates::from_toml(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.templates_path.display(), "no site templates, using defaults");
                SiteTemplates::default()
            }
            Err(e) => return Err(e.into()),
        };

        let content = tokio::fs::read_to_string(&self.targets_path).await?;
        let entries: Vec<TargetEntry> = serde_json::from_str(&content)?;

        Ok(build_targets(entries.into_iter().map(|e| e.url), &templates))
    }
}

/// Resolve URLs against the templates. Invalid and duplicate URLs are
/// skipped.
pub fn build_targets<I>(urls: I, templates: &SiteTemplates) -> Vec<Target>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    let mut targets = Vec::new();

    for raw in urls {
        let url = raw.trim();
        if !seen.insert(url.to_string()) {
            continue;
        }

        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(url, error = %e, "skipping invalid target URL");
                continue;
            }
        };

        let (site_name, source) = templates.lookup(&parsed);
        match Target::new(url, site_name, source) {
            Ok(target) => targets.push(target),
            Err(e) => warn!(url, error = %e, "skipping target"),
        }
    }

    targets
}
