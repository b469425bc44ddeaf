//! # Terminal Chat
//!
//! A chat screen for a hosted module-generation endpoint. Each reply is
//! shown as it arrives, and the newest one can be saved as a deployment
//! notebook with Ctrl+S.
//!
//! - `app`: state and input handling
//! - `event`: terminal, tick and app events on one channel
//! - `logging`: file logging while the screen is active
//! - `markdown`: rendering replies for the terminal
//! - `ui`: layout and drawing

pub mod app;
pub mod event;
pub mod logging;
pub mod markdown;
pub mod ui;

use std::io;
use std::path::PathBuf;

use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use dspy_archive::chat::{ChatMessage, InferenceClient};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{info, warn};

use crate::tui::app::App;
use crate::tui::event::{AppEvent, Event};
use crate::tui::ui::{draw, history_viewport_height};

const WELCOME: &str = "# Module Chat\n\n* Describe the module you want and press Enter.\n* Press Ctrl+S to save the newest reply as a notebook.\n* Scroll with the mouse wheel or the arrow keys.\n* Press Esc or Ctrl+C to exit.";

/// Run the chat screen until the user quits
pub async fn run(client: InferenceClient, notebook_dir: PathBuf) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(notebook_dir);
    app.transcript.push_notice(WELCOME);

    // The endpoint task gets the full history and picks what to send
    let (llm_tx, mut llm_rx) = mpsc::unbounded_channel::<Vec<ChatMessage>>();
    let event_sender = app.event_sender();

    tokio::spawn(async move {
        while let Some(history) = llm_rx.recv().await {
            let event = match client.complete(&history).await {
                Ok(reply) => AppEvent::Reply(reply),
                Err(e) => {
                    warn!("Completion failed: {}", e);
                    AppEvent::ReplyError(e.to_string())
                }
            };
            if event_sender.send(Event::App(event)).is_err() {
                break;
            }
        }
    });

    terminal.clear()?;
    info!("Chat started");

    let result = async {
        while !app.should_quit {
            app.viewport_height = history_viewport_height(terminal.size()?.height);
            terminal.draw(|f| draw(f, &app))?;

            if let Some(Event::App(AppEvent::Submit(_))) = app.next_event().await {
                // the user turn has already been appended
                request_reply(&llm_tx, &app.event_sender(), app.transcript.history.clone());
            }
        }
        anyhow::Ok(())
    }
    .await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result
}

/// Hand the history to the completion task, failing the turn if it is gone
fn request_reply(
    llm_tx: &UnboundedSender<Vec<ChatMessage>>,
    events: &UnboundedSender<Event>,
    history: Vec<ChatMessage>,
) {
    if llm_tx.send(history).is_err() {
        warn!("Completion task has stopped");
        let _ = events.send(Event::App(AppEvent::ReplyError(
            "completion task has stopped".to_string(),
        )));
    }
}
