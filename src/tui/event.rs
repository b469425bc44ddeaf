use std::time::Duration;

use crossterm::event::{Event as CrosstermEvent, EventStream, KeyEventKind};
use futures::StreamExt;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::warn;

/// Spinner frame rate
const TICK_FPS: f64 = 12.0;

#[derive(Debug)]
pub enum Event {
    /// Key press, mouse or resize from the terminal
    Terminal(CrosstermEvent),
    Tick,
    App(AppEvent),
}

#[derive(Debug)]
pub enum AppEvent {
    /// User message ready to send
    Submit(String),
    /// Reply text from the endpoint
    Reply(String),
    /// Request to the endpoint failed
    ReplyError(String),
    /// Save the newest reply as a notebook
    ExportNotebook,
    Quit,
}

/// One queue for terminal input, ticks and events posted by the app
pub struct EventHandler {
    sender: UnboundedSender<Event>,
    receiver: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
    /// Start reading the terminal and ticking
    pub fn new() -> Self {
        let handler = Self::channel();
        tokio::spawn(read_terminal(handler.sender()));
        tokio::spawn(tick(handler.sender()));
        handler
    }

    /// A queue with no sources attached
    fn channel() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self { sender, receiver }
    }

    pub fn sender(&self) -> UnboundedSender<Event> {
        self.sender.clone()
    }

    pub async fn next(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }
}

fn is_forwarded(event: &CrosstermEvent) -> bool {
    match event {
        CrosstermEvent::Key(key) => key.kind == KeyEventKind::Press,
        CrosstermEvent::Mouse(_) | CrosstermEvent::Resize(..) => true,
        _ => false,
    }
}

async fn read_terminal(sender: UnboundedSender<Event>) {
    let mut reader = EventStream::new();
    loop {
        let next = tokio::select! {
            _ = sender.closed() => return,
            next = reader.next() => next,
        };
        match next {
            Some(Ok(event)) if is_forwarded(&event) => {
                if sender.send(Event::Terminal(event)).is_err() {
                    return;
                }
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!("Terminal input failed: {}", e);
                return;
            }
            None => return,
        }
    }
}

async fn tick(sender: UnboundedSender<Event>) {
    let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / TICK_FPS));
    loop {
        interval.tick().await;
        if sender.send(Event::Tick).is_err() {
            return;
        }
    }
}
