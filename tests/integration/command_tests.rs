use super::*;
use stock_watcher::commands::run_command_poller;
use wiremock::MockServer;

#[tokio::test]
async fn test_poller_answers_stock_and_health() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = get_test_config(dir.path());
    let notifier = RecordingNotifier::new();
    let watcher = Arc::new(create_test_watcher(&config, notifier.clone()).await?);

    let server = MockServer::start().await;
    let url = format!("{}{}", server.uri(), LISTING_PATH);
    serve(&server, LISTING_PATH, listing_page(&[("Widget A", false)])).await;
    watcher.run_cycle(vec![html_target(&url)]).await;

    notifier.inbox.lock().unwrap().extend([
        IncomingCommand {
            update_id: 1,
            chat_id: "42".to_string(),
            text: "/stock@watch_bot".to_string(),
        },
        IncomingCommand {
            update_id: 2,
            chat_id: "42".to_string(),
            text: "hello".to_string(),
        },
        IncomingCommand {
            update_id: 3,
            chat_id: "43".to_string(),
            text: "/health".to_string(),
        },
    ]);

    let poller = tokio::spawn(run_command_poller(watcher.clone(), notifier.clone()));
    let answered = wait_for_condition(|| notifier.replies.lock().unwrap().len() >= 2, 5).await;
    poller.abort();
    assert!(answered);

    let replies = notifier.replies.lock().unwrap().clone();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0].0, "42");
    assert!(replies[0].1.contains("Widget A"));
    assert_eq!(replies[1].0, "43");
    assert!(replies[1].1.contains("Consecutive failed cycles"));

    Ok(())
}
