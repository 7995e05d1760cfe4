//! Keyboard input listener
//!
//! Polls crossterm for key events and forwards them to the update loop's
//! mailbox. Runs as a background task with graceful shutdown support.

use std::time::Duration;

use crossterm::event::{self, Event as CrosstermEvent};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::app::Message;

/// Listen for keyboard input until cancelled
pub async fn listen(tx: mpsc::Sender<Message>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!("Input listener cancelled");
                break;
            }
            () = tokio::time::sleep(Duration::from_millis(100)) => {
                // Non-blocking poll since the sleep already paced us
                if event::poll(Duration::ZERO).unwrap_or(false) {
                    if let Ok(CrosstermEvent::Key(key)) = event::read() {
                        if tx.send(Message::Key(key)).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }
}
