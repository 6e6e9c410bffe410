// Integration tests for the stock watcher
// These tests drive full scan cycles against local HTTP servers

pub mod api_source_tests;
pub mod command_tests;
pub mod health_tests;
pub mod scan_cycle_tests;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use stock_watcher::{
    AppConfig, Watcher,
    fetch::HttpFetcher,
    models::{MessageId, SelectorConfig, SourceConfig, Target},
    plugins::{IncomingCommand, Notifier, PluginManager, sources::decryptor_from_config},
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const LISTING_PATH: &str = "/collections/all";

/// Notifier that remembers everything it was asked to do.
#[derive(Default)]
pub struct RecordingNotifier {
    next_id: AtomicI64,
    pub sent: Mutex<Vec<(MessageId, String)>>,
    pub edited: Mutex<Vec<(MessageId, String)>>,
    pub deleted: Mutex<Vec<MessageId>>,
    pub replies: Mutex<Vec<(String, String)>>,
    pub inbox: Mutex<Vec<IncomingCommand>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn allocate(&self) -> MessageId {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Sent restock alerts as `(message_id, text)`.
    pub fn alerts(&self) -> Vec<(MessageId, String)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, text)| text.contains("Back in stock"))
            .cloned()
            .collect()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }

    pub fn deleted(&self) -> Vec<MessageId> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn edited_ids(&self) -> Vec<MessageId> {
        self.edited.lock().unwrap().iter().map(|(id, _)| *id).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) -> stock_watcher::Result<MessageId> {
        let id = self.allocate();
        self.sent.lock().unwrap().push((id, text.to_string()));
        Ok(id)
    }

    async fn send_to(&self, chat_id: &str, text: &str) -> stock_watcher::Result<MessageId> {
        self.replies
            .lock()
            .unwrap()
            .push((chat_id.to_string(), text.to_string()));
        Ok(self.allocate())
    }

    async fn edit(&self, message_id: MessageId, text: &str) -> stock_watcher::Result<()> {
        self.edited
            .lock()
            .unwrap()
            .push((message_id, text.to_string()));
        Ok(())
    }

    async fn delete(&self, message_id: MessageId) -> stock_watcher::Result<()> {
        self.deleted.lock().unwrap().push(message_id);
        Ok(())
    }

    async fn receive_commands(&self, offset: i64) -> stock_watcher::Result<Vec<IncomingCommand>> {
        let mut inbox = self.inbox.lock().unwrap();
        let (ready, later): (Vec<_>, Vec<_>) =
            inbox.drain(..).partition(|c| c.update_id >= offset);
        *inbox = later;
        Ok(ready)
    }
}

/// Fast settings with all files under `dir`.
pub fn get_test_config(dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.scraper.jitter_ms = 0;
    config.scraper.retry_attempts = 0;
    config.scraper.retry_delay_ms = 0;
    config.scraper.request_timeout = 5;
    config.storage.state_path = dir.join("stock_status.json");
    config.storage.targets_path = dir.join("products.json");
    config.storage.templates_path = dir.join("sites.toml");
    config
}

/// A loaded watcher with the default source strategies.
pub async fn create_test_watcher(
    config: &AppConfig,
    notifier: Arc<RecordingNotifier>,
) -> anyhow::Result<Watcher> {
    let fetcher = HttpFetcher::new(&config.scraper)?;
    let decryptor = decryptor_from_config(&config.decryption)?;
    let plugins = PluginManager::with_default_sources(fetcher, decryptor).await;

    let watcher = Watcher::new(config, plugins, notifier);
    watcher.load().await;
    Ok(watcher)
}

/// Shopify-style listing; `true` marks an item sold out.
pub fn listing_page(items: &[(&str, bool)]) -> String {
    let cards: Vec<String> = items
        .iter()
        .map(|(name, sold_out)| {
            let disabled = if *sold_out { " disabled" } else { "" };
            format!(
                r#"<div class="card__content">
                     <h3 class="card__heading"><a href="/products/x">{name}</a></h3>
                     <button name="add"{disabled}>Add to cart</button>
                   </div>"#
            )
        })
        .collect();
    format!("<html><body>{}</body></html>", cards.join("\n"))
}

/// Replace whatever `server` serves at `route` with `body`.
pub async fn serve(server: &MockServer, route: &str, body: String) {
    server.reset().await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

pub fn html_target(url: &str) -> Target {
    Target::new(url, "Test Shop", SourceConfig::HtmlSelector(SelectorConfig::default()))
        .expect("valid test URL")
}

/// Helper to wait for async operations
pub async fn wait_for_condition<F>(mut condition: F, timeout_seconds: u64) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_secs(timeout_seconds);

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    false
}
