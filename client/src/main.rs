//! Chatsync demo - an interactive conversation against an in-process store.
//!
//! Every line read from stdin is sent as a message; a simulated peer answers
//! each one through the push subscription. Commands:
//!
//! - `/switch <conversation>` - leave and enter another conversation
//! - `/fail` - make the next send fail
//! - `/drop` - drop the push subscription from the server side
//! - `/dump` - print the current view as JSON
//! - `/quit` - leave and exit

use std::sync::Arc;

use chatsync_client::{Config, MemoryRemote, RemoteStore, SyncController, SyncError};
use chatsync_engine::{ConversationSnapshot, NewMessage, TEMP_ID_PREFIX};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatsync_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!(
        user = %config.user_id,
        peer = %config.peer_id,
        "Starting chatsync demo"
    );

    let remote = Arc::new(MemoryRemote::new());
    let controller = SyncController::new(Arc::clone(&remote), config.sync_options());

    let mut view = controller.view();
    let printer = tokio::spawn(async move {
        while view.changed().await.is_ok() {
            let snapshot = view.borrow_and_update().clone();
            render(&snapshot);
        }
    });

    let mut conversation_id = config.conversation_id.clone();
    controller
        .enter(conversation_id.clone(), config.user_id.clone())
        .await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim_end();

        match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit", _) => break,
            ("/fail", _) => remote.fail_next_inserts(1),
            ("/drop", _) => remote.drop_subscriptions(),
            ("/dump", _) => match serde_json::to_string_pretty(&controller.snapshot()) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("! {}", e),
            },
            ("/switch", target) if !target.trim().is_empty() => {
                conversation_id = target.trim().to_string();
                if let Err(e) = controller
                    .enter(conversation_id.clone(), config.user_id.clone())
                    .await
                {
                    eprintln!("! {}", e);
                }
            }
            _ => match controller.send(line).await {
                Ok(Some(_)) => {
                    let reply = NewMessage {
                        conversation_id: conversation_id.clone(),
                        sender_id: config.peer_id.clone(),
                        content: format!("got \"{}\"", line),
                        created_at: 0,
                        client_id: format!("{}{}", TEMP_ID_PREFIX, uuid::Uuid::new_v4()),
                    };
                    if let Err(e) = remote.insert(reply).await {
                        tracing::warn!(error = %e, "Peer reply failed");
                    }
                }
                Ok(None) => {}
                Err(SyncError::Send { content, source }) => {
                    eprintln!("! not sent ({}), retry: {}", source, content);
                }
                Err(e) => eprintln!("! {}", e),
            },
        }
    }

    controller.leave().await;
    printer.abort();

    Ok(())
}

fn render(snapshot: &ConversationSnapshot) {
    println!(
        "--- {} [{:?}] ---",
        snapshot.conversation_id.as_deref().unwrap_or("-"),
        snapshot.state
    );
    for message in &snapshot.messages {
        let marker = if message.local_only { " (sending)" } else { "" };
        println!("{}: {}{}", message.sender_id, message.content, marker);
    }
    if let Some(error) = &snapshot.error {
        println!("! {:?}: {}", error.kind, error.message);
    }
}
