use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::plugins::Notifier;
use crate::watcher::Watcher;

const ERROR_BACKOFF: Duration = Duration::from_secs(5);
const POLL_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Stock,
    Health,
}

impl Command {
    /// Parse `/stock`, `/status` or `/health`, with or without a
    /// `@botname` suffix. Anything else is ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let command = word.strip_prefix('/')?;
        let command = command.split('@').next().unwrap_or(command);

        match command.to_ascii_lowercase().as_str() {
            "stock" | "status" => Some(Command::Stock),
            "health" => Some(Command::Health),
            _ => None,
        }
    }
}

/// Reply texts for `command`, in sending order.
pub async fn handle_command(watcher: &Watcher, command: Command) -> Vec<String> {
    match command {
        Command::Stock => {
            let pages = watcher.status_pages().await;
            if pages.is_empty() {
                vec!["📭 No stock data yet. The first scan may still be running.".to_string()]
            } else {
                pages
            }
        }
        Command::Health => vec![watcher.health_report().await.to_message()],
    }
}

/// Long-poll the notifier for commands and answer them. Runs until the
/// future is dropped.
pub async fn run_command_poller(watcher: Arc<Watcher>, notifier: Arc<dyn Notifier>) {
    let mut last_update_id: i64 = 0;
    info!("command poller started");

    loop {
        match notifier.receive_commands(last_update_id + 1).await {
            Ok(commands) => {
                for incoming in commands {
                    last_update_id = last_update_id.max(incoming.update_id);

                    let Some(command) = Command::parse(&incoming.text) else {
                        continue;
                    };
                    debug!(?command, chat_id = %incoming.chat_id, "command received");

                    for reply in handle_command(&watcher, command).await {
                        if let Err(e) = notifier.send_to(&incoming.chat_id, &reply).await {
                            warn!(chat_id = %incoming.chat_id, error = %e, "failed to answer command");
                        }
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "polling for commands failed");
                tokio::time::sleep(ERROR_BACKOFF).await;
            }
        }

        tokio::time::sleep(POLL_PAUSE).await;
    }
}
