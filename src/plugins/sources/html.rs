use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::fetch::HttpFetcher;
use crate::models::{Observation, SelectorConfig, SourceConfig, SourceKind, StockText, Target};
use crate::plugins::traits::SourceStrategy;
use crate::utils::error::{AppError, Result};
use crate::utils::text::sanitize_name;

const SOLD_OUT_CLASS: &str = "sold-out";
const SOLD_OUT_KEYWORDS: &[&str] = &[
    "sold out",
    "sold-out",
    "out of stock",
    "unavailable",
    "售罄",
    "缺货",
    "已售完",
];

/// Scrapes product cards from an HTML listing page.
pub struct HtmlSelectorStrategy {
    fetcher: HttpFetcher,
}

impl HtmlSelectorStrategy {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl SourceStrategy for HtmlSelectorStrategy {
    fn kind(&self) -> SourceKind {
        SourceKind::HtmlSelector
    }

    async fn fetch_observations(&self, target: &Target) -> Result<Vec<Observation>> {
        let SourceConfig::HtmlSelector(selectors) = &target.source else {
            return Err(AppError::InvalidTarget(format!(
                "{} is not an HTML selector target",
                target.url
            )));
        };

        let body = self.fetcher.get_text(&target.url).await?;
        let listing = parse_listing(selectors, &body, &target.url)?;

        if listing.cards > 0 && listing.observations.is_empty() {
            warn!(
                url = %target.url,
                cards = listing.cards,
                "cards matched but none had a name and status anchor; check site selectors"
            );
        }
        debug!(url = %target.url, items = listing.observations.len(), "parsed listing");

        Ok(listing.observations)
    }
}

/// Result of parsing one listing page.
#[derive(Debug, Default)]
pub struct Listing {
    /// Elements matched by the card selector.
    pub cards: usize,
    pub observations: Vec<Observation>,
}

struct CompiledSelectors<'a> {
    card: Selector,
    name: Selector,
    anchor: Selector,
    config: &'a SelectorConfig,
}

impl<'a> CompiledSelectors<'a> {
    fn compile(config: &'a SelectorConfig) -> Result<Self> {
        Ok(Self {
            card: compile(&config.card_selector)?,
            name: compile(&config.name_selector)?,
            anchor: compile(&config.status_anchor_selector)?,
            config,
        })
    }

    fn is_sold_out(&self, anchor: &ElementRef) -> bool {
        let text = anchor.text().collect::<String>().to_lowercase();

        match &self.config.stock_text {
            Some(StockText::Positive(marker)) => return !text.contains(&marker.to_lowercase()),
            Some(StockText::Negative(marker)) => return text.contains(&marker.to_lowercase()),
            None => {}
        }

        if !self.config.generic_heuristics {
            return false;
        }

        let element = anchor.value();
        element.attr("disabled").is_some()
            || element.attr("aria-disabled") == Some("true")
            || element
                .attr("class")
                .is_some_and(|class| class.to_lowercase().contains(SOLD_OUT_CLASS))
            || SOLD_OUT_KEYWORDS.iter().any(|keyword| text.contains(keyword))
    }
}

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| AppError::Selector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

/// Extract observations from `body`. Cards missing a name or status anchor
/// are skipped. Every observation carries `page_url`.
pub fn parse_listing(config: &SelectorConfig, body: &str, page_url: &str) -> Result<Listing> {
    let selectors = CompiledSelectors::compile(config)?;
    let document = Html::parse_document(body);
    let mut listing = Listing::default();

    for card in document.select(&selectors.card) {
        listing.cards += 1;

        let Some(name_element) = card.select(&selectors.name).next() else {
            continue;
        };
        let name = sanitize_name(&name_element.text().collect::<String>());
        if name.is_empty() {
            continue;
        }

        let Some(anchor) = card.select(&selectors.anchor).next() else {
            continue;
        };

        let is_sold_out = selectors.is_sold_out(&anchor);
        listing
            .observations
            .push(Observation::new(name, page_url, is_sold_out));
    }

    Ok(listing)
}
