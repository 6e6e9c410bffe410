use super::*;
use aes::Aes256;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use cbc::cipher::{BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use serde_json::json;
use stock_watcher::models::ApiConfig;
use wiremock::MockServer;

const KEY: [u8; 32] = [0x11; 32];
const IV: [u8; 16] = [0x22; 16];
const API_PATH: &str = "/v1/goods";

fn encrypt(key: &[u8; 32], plaintext: &str) -> String {
    let ciphertext = cbc::Encryptor::<Aes256>::new(&(*key).into(), &IV.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
    STANDARD.encode(ciphertext)
}

fn envelope(payload: String) -> String {
    json!({ "code": 200, "data": payload }).to_string()
}

fn api_config(dir: &std::path::Path) -> AppConfig {
    let mut config = get_test_config(dir);
    config.decryption.key_hex = Some(hex::encode(KEY));
    config.decryption.iv_hex = Some(hex::encode(IV));
    config
}

fn api_target(server: &MockServer) -> Target {
    let api = ApiConfig {
        landing_url_template: "https://leaf.example/c/{value}".to_string(),
        ..ApiConfig::default()
    };
    Target::new(
        &format!("{}{}?category=pipes", server.uri(), API_PATH),
        "Leaf API",
        SourceConfig::EncryptedApi(api),
    )
    .expect("valid test URL")
}

#[tokio::test]
async fn test_api_items_are_recorded_by_name_and_site() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = api_config(dir.path());
    let notifier = RecordingNotifier::new();
    let watcher = create_test_watcher(&config, notifier.clone()).await?;

    let server = MockServer::start().await;
    let listing = r#"{"list":[{"name":"Mixture 79","inventory":3},{"name":"Navy Cut","inventory":false}]}"#;
    serve(&server, API_PATH, envelope(encrypt(&KEY, listing))).await;

    let report = watcher.run_cycle(vec![api_target(&server)]).await;
    assert!(!report.had_error);

    let record = watcher
        .with_store(|s| s.get("Mixture 79_Leaf API").cloned())
        .await
        .expect("record stored under name and site");
    assert!(record.is_in_stock());
    assert_eq!(record.url, "https://leaf.example/c/pipes");
    assert_eq!(
        watcher.with_store(|s| s.get("Navy Cut_Leaf API").map(|r| r.is_sold_out)).await,
        Some(true)
    );

    Ok(())
}

// D: an undecryptable payload fails the target and touches no records
#[tokio::test]
async fn test_decryption_failure_is_a_target_error() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = api_config(dir.path());
    let notifier = RecordingNotifier::new();
    let watcher = create_test_watcher(&config, notifier.clone()).await?;

    let server = MockServer::start().await;
    let listing = r#"{"list":[{"name":"Mixture 79","inventory":true}]}"#;
    serve(&server, API_PATH, envelope(encrypt(&KEY, listing))).await;
    watcher.run_cycle(vec![api_target(&server)]).await;
    let before = watcher.with_store(|s| s.get("Mixture 79_Leaf API").cloned()).await;
    assert!(before.is_some());

    let sold_out = r#"{"list":[{"name":"Mixture 79","inventory":false}]}"#;
    serve(&server, API_PATH, envelope(encrypt(&[0x99; 32], sold_out))).await;
    let report = watcher.run_cycle(vec![api_target(&server)]).await;

    assert!(report.had_error);
    assert_eq!(report.targets_failed, 1);
    let after = watcher.with_store(|s| s.get("Mixture 79_Leaf API").cloned()).await;
    assert_eq!(after, before);

    Ok(())
}

#[tokio::test]
async fn test_api_without_key_fails_closed() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = get_test_config(dir.path());
    let notifier = RecordingNotifier::new();
    let watcher = create_test_watcher(&config, notifier.clone()).await?;

    let server = MockServer::start().await;
    let listing = r#"{"list":[{"name":"Mixture 79","inventory":true}]}"#;
    serve(&server, API_PATH, envelope(encrypt(&KEY, listing))).await;

    let report = watcher.run_cycle(vec![api_target(&server)]).await;
    assert!(report.had_error);
    assert!(watcher.with_store(|s| s.is_empty()).await);

    Ok(())
}
