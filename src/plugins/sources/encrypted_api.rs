use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::cipher::PayloadDecryptor;
use crate::fetch::HttpFetcher;
use crate::models::{ApiConfig, Observation, SourceConfig, SourceKind, Target};
use crate::plugins::traits::SourceStrategy;
use crate::utils::error::{AppError, Result};
use crate::utils::text::sanitize_name;

/// Reads a JSON envelope whose payload field holds an encrypted item list.
///
/// Decoding is all-or-nothing: a bad status code, an empty payload, a
/// decryption failure or a malformed item fails the whole target.
pub struct EncryptedApiStrategy {
    fetcher: HttpFetcher,
    decryptor: Arc<dyn PayloadDecryptor>,
}

impl EncryptedApiStrategy {
    pub fn new(fetcher: HttpFetcher, decryptor: Arc<dyn PayloadDecryptor>) -> Self {
        Self { fetcher, decryptor }
    }
}

#[async_trait]
impl SourceStrategy for EncryptedApiStrategy {
    fn kind(&self) -> SourceKind {
        SourceKind::EncryptedApi
    }

    async fn fetch_observations(&self, target: &Target) -> Result<Vec<Observation>> {
        let SourceConfig::EncryptedApi(api) = &target.source else {
            return Err(AppError::InvalidTarget(format!(
                "{} is not an encrypted API target",
                target.url
            )));
        };

        let body = self.fetcher.get_text(&target.url).await?;
        let observations =
            decode_listing(api, &body, self.decryptor.as_ref(), &target.public_url())?;
        debug!(url = %target.url, items = observations.len(), "decoded API listing");

        Ok(observations)
    }
}

/// Decode an envelope into observations that all carry `item_url`.
pub fn decode_listing(
    api: &ApiConfig,
    body: &str,
    decryptor: &dyn PayloadDecryptor,
    item_url: &str,
) -> Result<Vec<Observation>> {
    let envelope: Value = serde_json::from_str(body)
        .map_err(|e| AppError::Payload(format!("envelope is not JSON: {}", e)))?;

    let status = envelope.get(&api.status_field).and_then(as_code);
    if status != Some(api.success_code) {
        return Err(AppError::Payload(format!(
            "unexpected status {} (expected {})",
            envelope.get(&api.status_field).unwrap_or(&Value::Null),
            api.success_code
        )));
    }

    let payload = envelope
        .get(&api.payload_field)
        .and_then(Value::as_str)
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::Payload(format!("empty '{}' field", api.payload_field)))?;

    let plaintext = decryptor.decrypt(payload)?;
    let document: Value = serde_json::from_slice(&plaintext)
        .map_err(|e| AppError::Payload(format!("decrypted payload is not JSON: {}", e)))?;

    let items = match &document {
        Value::Array(items) => items,
        other => other
            .get(&api.items_field)
            .and_then(Value::as_array)
            .ok_or_else(|| AppError::Payload(format!("missing '{}' array", api.items_field)))?,
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let name = item
                .get(&api.name_field)
                .and_then(Value::as_str)
                .map(sanitize_name)
                .filter(|name| !name.is_empty())
                .ok_or_else(|| AppError::Payload(format!("item {} has no name", index)))?;

            let in_stock = item
                .get(&api.inventory_field)
                .and_then(inventory_flag)
                .ok_or_else(|| {
                    AppError::Payload(format!("item '{}' has no usable inventory flag", name))
                })?;

            Ok(Observation::new(name, item_url, !in_stock))
        })
        .collect()
}

/// Status codes arrive as numbers or numeric strings.
fn as_code(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `true`/`false`, or a stock count where anything non-zero is available.
fn inventory_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|count| count != 0.0),
        _ => None,
    }
}
