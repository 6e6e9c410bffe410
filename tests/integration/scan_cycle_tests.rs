use super::*;
use wiremock::MockServer;

#[tokio::test]
async fn test_restock_lifecycle_scenarios() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = get_test_config(dir.path());
    let notifier = RecordingNotifier::new();
    let watcher = create_test_watcher(&config, notifier.clone()).await?;

    let server = MockServer::start().await;
    let url = format!("{}{}", server.uri(), LISTING_PATH);
    let widget_b = format!("Widget B_{}", url);

    // A: first cycle ever, nothing alerts
    serve(&server, LISTING_PATH, listing_page(&[("Widget A", false), ("Widget B", true)])).await;
    let report = watcher.run_cycle(vec![html_target(&url)]).await;
    assert!(!report.had_error);
    assert!(report.changed);
    assert!(notifier.alerts().is_empty());
    assert_eq!(watcher.with_store(|s| s.len()).await, 2);
    assert_eq!(
        watcher.with_store(|s| s.get(&widget_b).map(|r| r.is_sold_out)).await,
        Some(true)
    );
    let dashboard = watcher.with_store(|s| s.dashboard_messages().to_vec()).await;
    assert_eq!(dashboard.len(), 1);

    // B: Widget B comes back
    serve(&server, LISTING_PATH, listing_page(&[("Widget A", false), ("Widget B", false)])).await;
    let report = watcher.run_cycle(vec![html_target(&url)]).await;
    assert_eq!(report.restocked, 1);
    let alerts = notifier.alerts();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].1.contains("Widget B"));
    let alert_id = alerts[0].0;
    assert_eq!(watcher.with_store(|s| s.alert_for(&widget_b)).await, Some(alert_id));
    // the dashboard message is edited in place
    assert!(notifier.edited_ids().contains(&dashboard[0]));

    // C: Widget B sells out again
    serve(&server, LISTING_PATH, listing_page(&[("Widget A", false), ("Widget B", true)])).await;
    watcher.run_cycle(vec![html_target(&url)]).await;
    assert!(notifier.deleted().contains(&alert_id));
    assert_eq!(watcher.with_store(|s| s.alert_for(&widget_b)).await, None);
    assert_eq!(notifier.alerts().len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_failing_target_does_not_block_other_origins() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = get_test_config(dir.path());
    let notifier = RecordingNotifier::new();
    let watcher = create_test_watcher(&config, notifier.clone()).await?;

    let healthy = MockServer::start().await;
    serve(&healthy, LISTING_PATH, listing_page(&[("Widget A", false)])).await;
    let broken = MockServer::start().await;
    broken.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&broken)
        .await;

    let report = watcher
        .run_cycle(vec![
            html_target(&format!("{}{}", healthy.uri(), LISTING_PATH)),
            html_target(&format!("{}{}", broken.uri(), LISTING_PATH)),
        ])
        .await;

    // both servers listen on 127.0.0.1, so they share an origin
    assert!(report.had_error);
    assert_eq!(report.targets_scanned, 2);
    assert_eq!(report.targets_failed, 1);
    assert_eq!(watcher.with_store(|s| s.len()).await, 1);

    Ok(())
}

#[tokio::test]
async fn test_unchanged_cycle_leaves_dashboard_alone() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = get_test_config(dir.path());
    let notifier = RecordingNotifier::new();
    let watcher = create_test_watcher(&config, notifier.clone()).await?;

    let server = MockServer::start().await;
    let url = format!("{}{}", server.uri(), LISTING_PATH);
    serve(&server, LISTING_PATH, listing_page(&[("Widget A", false)])).await;

    watcher.run_cycle(vec![html_target(&url)]).await;
    let sent_after_first = notifier.sent_texts().len();
    let report = watcher.run_cycle(vec![html_target(&url)]).await;

    assert!(!report.changed);
    assert_eq!(notifier.sent_texts().len(), sent_after_first);
    assert!(notifier.edited_ids().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_dashboard_splits_into_pages() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = get_test_config(dir.path());
    config.dashboard.max_page_length = 200;
    let notifier = RecordingNotifier::new();
    let watcher = create_test_watcher(&config, notifier.clone()).await?;

    let server = MockServer::start().await;
    let url = format!("{}{}", server.uri(), LISTING_PATH);
    let names: Vec<String> = (0..30).map(|i| format!("Widget {:02}", i)).collect();
    let items: Vec<(&str, bool)> = names.iter().map(|n| (n.as_str(), false)).collect();
    serve(&server, LISTING_PATH, listing_page(&items)).await;

    watcher.run_cycle(vec![html_target(&url)]).await;

    let pages = watcher.with_store(|s| s.dashboard_messages().len()).await;
    assert!(pages > 1);
    let texts = notifier.sent_texts();
    assert_eq!(texts.len(), pages);
    assert!(texts[0].contains(&format!("(1/{})", pages)));

    // dropping the target purges its records and every page goes away
    watcher.run_cycle(Vec::new()).await;
    assert_eq!(watcher.with_store(|s| s.len()).await, 0);
    assert!(watcher.with_store(|s| s.dashboard_messages().is_empty()).await);
    assert_eq!(notifier.deleted().len(), pages);

    Ok(())
}

#[tokio::test]
async fn test_fast_origin_publishes_before_slow_origin_finishes() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = get_test_config(dir.path());
    let notifier = RecordingNotifier::new();
    let watcher = Arc::new(create_test_watcher(&config, notifier.clone()).await?);

    let fast = MockServer::start().await;
    serve(&fast, LISTING_PATH, listing_page(&[("Widget A", false)])).await;
    let slow = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_page(&[("Widget Z", false)]))
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&slow)
        .await;

    // same listener, different host name, so the two targets land in separate origins
    let slow_url = format!("{}{}", slow.uri(), LISTING_PATH).replace("127.0.0.1", "localhost");
    let targets = vec![
        html_target(&format!("{}{}", fast.uri(), LISTING_PATH)),
        html_target(&slow_url),
    ];

    let cycle = tokio::spawn({
        let watcher = watcher.clone();
        async move { watcher.run_cycle(targets).await }
    });

    let published = wait_for_condition(|| !notifier.sent_texts().is_empty(), 2).await;
    assert!(published);
    assert!(!cycle.is_finished());
    assert!(notifier.sent_texts()[0].contains("Widget A"));

    let report = cycle.await?;
    assert_eq!(report.origins, 2);
    assert!(!report.had_error);
    assert_eq!(watcher.with_store(|s| s.len()).await, 2);

    Ok(())
}
