use super::*;
use wiremock::MockServer;

#[tokio::test]
async fn test_escalation_and_recovery_are_sent_once() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = get_test_config(dir.path());
    config.alerts.failure_threshold = 2;
    let notifier = RecordingNotifier::new();
    let watcher = create_test_watcher(&config, notifier.clone()).await?;

    let server = MockServer::start().await;
    let url = format!("{}{}", server.uri(), LISTING_PATH);
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let count = |needle: &str| {
        notifier
            .sent_texts()
            .iter()
            .filter(|t| t.contains(needle))
            .count()
    };

    for _ in 0..4 {
        watcher.run_cycle(vec![html_target(&url)]).await;
    }
    assert_eq!(count("Scanning degraded"), 1);
    assert_eq!(watcher.health_report().await.consecutive_failures, 4);

    serve(&server, LISTING_PATH, listing_page(&[("Widget A", false)])).await;
    let report = watcher.run_cycle(vec![html_target(&url)]).await;
    assert!(!report.had_error);
    assert_eq!(count("Scanning recovered"), 1);
    assert_eq!(watcher.health_report().await.consecutive_failures, 0);

    watcher.run_cycle(vec![html_target(&url)]).await;
    assert_eq!(count("Scanning recovered"), 1);

    Ok(())
}
