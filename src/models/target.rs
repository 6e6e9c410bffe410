use serde::Deserialize;
use url::Url;

use crate::models::SourceKind;
use crate::utils::error::{AppError, Result};

/// Text rule on the status anchor. Only one direction may be configured per site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockText {
    /// Anchor text containing this means in stock; anything else is sold out.
    Positive(String),
    /// Anchor text containing this means sold out; anything else is in stock.
    Negative(String),
}

/// Selector roles for an HTML listing page.
///
/// Availability precedence is fixed: a configured [`StockText`] fully decides,
/// otherwise generic heuristics apply when enabled, otherwise the item counts as
/// in stock.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawSelectorConfig")]
pub struct SelectorConfig {
    pub card_selector: String,
    pub name_selector: String,
    pub status_anchor_selector: String,
    pub stock_text: Option<StockText>,
    pub generic_heuristics: bool,
}

#[derive(Deserialize)]
struct RawSelectorConfig {
    card_selector: String,
    name_selector: String,
    status_anchor_selector: String,
    positive_stock_text: Option<String>,
    negative_stock_text: Option<String>,
    #[serde(default = "default_true")]
    generic_heuristics: bool,
}

fn default_true() -> bool {
    true
}

impl TryFrom<RawSelectorConfig> for SelectorConfig {
    type Error = String;

    fn try_from(raw: RawSelectorConfig) -> std::result::Result<Self, Self::Error> {
        let stock_text = match (raw.positive_stock_text, raw.negative_stock_text) {
            (Some(_), Some(_)) => {
                return Err(
                    "positive_stock_text and negative_stock_text are mutually exclusive".to_string(),
                )
            }
            (Some(text), None) => Some(StockText::Positive(text)),
            (None, Some(text)) => Some(StockText::Negative(text)),
            (None, None) => None,
        };

        Ok(SelectorConfig {
            card_selector: raw.card_selector,
            name_selector: raw.name_selector,
            status_anchor_selector: raw.status_anchor_selector,
            stock_text,
            generic_heuristics: raw.generic_heuristics,
        })
    }
}

impl Default for SelectorConfig {
    /// Shopify-style collection cards; used for sites without a template.
    fn default() -> Self {
        Self {
            card_selector: "div.card__content".to_string(),
            name_selector: "h3.card__heading a".to_string(),
            status_anchor_selector: "button[name='add']".to_string(),
            stock_text: None,
            generic_heuristics: true,
        }
    }
}

/// Envelope and item layout of an encrypted JSON listing API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub status_field: String,
    pub success_code: i64,
    pub payload_field: String,
    pub items_field: String,
    pub name_field: String,
    pub inventory_field: String,
    /// Query parameter of the API URL that identifies the public listing.
    pub landing_param: String,
    /// Public URL pattern; `{host}` and `{value}` are substituted.
    pub landing_url_template: String,
    /// Used when the API URL lacks `landing_param`; `{host}` is substituted.
    pub default_landing_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            status_field: "code".to_string(),
            success_code: 200,
            payload_field: "data".to_string(),
            items_field: "list".to_string(),
            name_field: "name".to_string(),
            inventory_field: "inventory".to_string(),
            landing_param: "category".to_string(),
            landing_url_template: "https://{host}/?category={value}".to_string(),
            default_landing_url: "https://{host}/".to_string(),
        }
    }
}

impl ApiConfig {
    /// Human-facing URL for items listed by `api_url`. Deterministic in `api_url`.
    pub fn landing_url(&self, api_url: &Url) -> String {
        let host = api_url.host_str().unwrap_or_default();
        let value = api_url
            .query_pairs()
            .find(|(key, value)| key == self.landing_param.as_str() && !value.is_empty())
            .map(|(_, value)| value.into_owned());

        match value {
            Some(value) => self
                .landing_url_template
                .replace("{host}", host)
                .replace("{value}", &value),
            None => self.default_landing_url.replace("{host}", host),
        }
    }
}

/// Per-kind source configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    HtmlSelector(SelectorConfig),
    EncryptedApi(ApiConfig),
}

impl SourceConfig {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceConfig::HtmlSelector(_) => SourceKind::HtmlSelector,
            SourceConfig::EncryptedApi(_) => SourceKind::EncryptedApi,
        }
    }
}

/// A configured page or endpoint to scan. Immutable for the duration of a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub url: String,
    pub origin: String,
    pub site_name: String,
    pub source: SourceConfig,
    parsed: Url,
}

impl Target {
    pub fn new(url: &str, site_name: impl Into<String>, source: SourceConfig) -> Result<Self> {
        let parsed = Url::parse(url)
            .map_err(|e| AppError::InvalidTarget(format!("{}: {}", url, e)))?;
        let origin = parsed
            .host_str()
            .ok_or_else(|| AppError::InvalidTarget(format!("{}: missing host", url)))?
            .to_ascii_lowercase();

        Ok(Self {
            url: url.to_string(),
            origin,
            site_name: site_name.into(),
            source,
            parsed,
        })
    }

    pub fn kind(&self) -> SourceKind {
        self.source.kind()
    }

    pub fn parsed_url(&self) -> &Url {
        &self.parsed
    }

    /// URL that records produced by this target carry.
    pub fn public_url(&self) -> String {
        match &self.source {
            SourceConfig::HtmlSelector(_) => self.url.clone(),
            SourceConfig::EncryptedApi(api) => api.landing_url(&self.parsed),
        }
    }
}
