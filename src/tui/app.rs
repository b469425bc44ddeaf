use std::path::PathBuf;

use anyhow::anyhow;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEventKind};
use dspy_archive::chat::{ChatMessage, ROLE_ASSISTANT, ROLE_USER};
use dspy_archive::notebook::make_notebook_for_module;
use ratatui::text::Text;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::tui::event::{AppEvent, Event, EventHandler};
use crate::tui::markdown::render_message;

/// Role used for messages from the UI itself
pub const ROLE_NOTICE: &str = "notice";

/// Single-line input with a cursor counted in characters
#[derive(Debug, Default)]
pub struct InputLine {
    pub text: String,
    /// Cursor position in characters
    pub cursor: usize,
}

impl InputLine {
    fn byte_index(&self) -> usize {
        self.text
            .char_indices()
            .nth(self.cursor)
            .map_or(self.text.len(), |(i, _)| i)
    }

    pub fn insert(&mut self, c: char) {
        let idx = self.byte_index();
        self.text.insert(idx, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let idx = self.byte_index();
            self.text.remove(idx);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.text.chars().count() {
            let idx = self.byte_index();
            self.text.remove(idx);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.text.chars().count());
    }

    /// Text before the cursor, for cursor placement
    pub fn before_cursor(&self) -> &str {
        &self.text[..self.byte_index()]
    }

    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.text)
    }
}

/// The conversation as sent to the endpoint, plus what is drawn on screen
#[derive(Debug, Default)]
pub struct Transcript {
    /// Turns sent to the endpoint (user and assistant only)
    pub history: Vec<ChatMessage>,
    /// Everything shown on screen, notices included
    pub rendered: Vec<(String, Text<'static>)>,
}

impl Transcript {
    pub fn push_turn(&mut self, message: ChatMessage) {
        self.rendered
            .push((message.role.clone(), render_message(&message.content)));
        self.history.push(message);
    }

    pub fn push_notice(&mut self, text: &str) {
        self.rendered
            .push((ROLE_NOTICE.to_string(), render_message(text)));
    }

    /// Show a failed request as a model message without adding it to history
    pub fn push_reply_error(&mut self, error: &str) {
        self.rendered.push((
            ROLE_ASSISTANT.to_string(),
            render_message(&format!("Error: {}", error)),
        ));
    }

    /// The newest reply and the user message that prompted it
    pub fn last_exchange(&self) -> Option<(&str, &str)> {
        let reply_idx = self.history.iter().rposition(|m| m.role == ROLE_ASSISTANT)?;
        let prompt = self.history[..reply_idx]
            .iter()
            .rev()
            .find(|m| m.role == ROLE_USER)
            .map_or("", |m| m.content.as_str());
        Some((prompt, self.history[reply_idx].content.as_str()))
    }

    /// Lines drawn for the history pane: a role line per message, the
    /// message itself, and a separator between messages
    pub fn line_count(&self) -> usize {
        let body: usize = self.rendered.iter().map(|(_, text)| text.height() + 1).sum();
        body + self.rendered.len().saturating_sub(1)
    }
}

/// Move `position` by `delta` lines within `0..=max`
fn scrolled(position: usize, delta: i32, max: usize) -> usize {
    let current = position.min(max);
    if delta < 0 {
        current.saturating_sub(delta.unsigned_abs() as usize)
    } else {
        current.saturating_add(delta as usize).min(max)
    }
}

/// Application state
pub struct App {
    pub transcript: Transcript,
    pub input: InputLine,
    pub should_quit: bool,
    /// Waiting for the endpoint
    pub is_loading: bool,
    pub spinner_frame: usize,
    /// First visible line; `usize::MAX` follows the newest message
    pub scroll_position: usize,
    /// Rows available to the history pane, set before each draw
    pub viewport_height: usize,
    /// Where exported notebooks are written
    notebook_dir: PathBuf,
    event_handler: EventHandler,
}

impl App {
    pub fn new(notebook_dir: PathBuf) -> Self {
        Self {
            transcript: Transcript::default(),
            input: InputLine::default(),
            should_quit: false,
            is_loading: false,
            spinner_frame: 0,
            scroll_position: 0,
            viewport_height: 0,
            notebook_dir,
            event_handler: EventHandler::new(),
        }
    }

    /// Get the next event, applying it to the app state first
    pub async fn next_event(&mut self) -> Option<Event> {
        let event = self.event_handler.next().await?;
        let result = match &event {
            Event::Terminal(term_event) => self.handle_terminal_event(term_event),
            Event::Tick => {
                if self.is_loading {
                    self.spinner_frame = (self.spinner_frame + 1) % 8;
                }
                Ok(())
            }
            Event::App(app_event) => {
                self.handle_app_event(app_event);
                Ok(())
            }
        };
        if let Err(e) = result {
            error!("Error handling event: {}", e);
        }
        Some(event)
    }

    pub fn event_sender(&self) -> mpsc::UnboundedSender<Event> {
        self.event_handler.sender()
    }

    fn send(&self, event: AppEvent) -> anyhow::Result<()> {
        self.event_handler
            .sender()
            .send(Event::App(event))
            .map_err(|e| anyhow!("event channel closed: {}", e))
    }

    fn handle_terminal_event(&mut self, event: &crossterm::event::Event) -> anyhow::Result<()> {
        match event {
            crossterm::event::Event::Key(key) if key.kind == KeyEventKind::Press => {
                self.handle_key_event(*key)?
            }
            crossterm::event::Event::Mouse(mouse) => match mouse.kind {
                MouseEventKind::ScrollUp => self.scroll_by(-3),
                MouseEventKind::ScrollDown => self.scroll_by(3),
                _ => {}
            },
            _ => {}
        }
        Ok(())
    }

    fn handle_app_event(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Submit(input) => {
                self.transcript.push_turn(ChatMessage::user(input.as_str()));
                self.is_loading = true;
                self.input.take();
                self.scroll_to_bottom();
            }
            AppEvent::Reply(reply) => {
                self.is_loading = false;
                self.transcript.push_turn(ChatMessage::assistant(reply.as_str()));
                self.scroll_to_bottom();
            }
            AppEvent::ReplyError(e) => {
                self.is_loading = false;
                self.transcript.push_reply_error(e);
                self.scroll_to_bottom();
            }
            AppEvent::ExportNotebook => self.export_notebook(),
            AppEvent::Quit => self.should_quit = true,
        }
    }

    fn export_notebook(&mut self) {
        let Some((prompt, reply)) = self.transcript.last_exchange() else {
            self.transcript.push_notice("Nothing to export yet.");
            return;
        };

        let notice = match make_notebook_for_module(prompt, reply, &self.notebook_dir) {
            Ok(path) => {
                info!("Exported notebook {}", path.display());
                format!("Notebook saved to `{}`", path.display())
            }
            Err(e) => format!("Error: could not export notebook: {}", e),
        };
        self.transcript.push_notice(&notice);
        self.scroll_to_bottom();
    }

    fn handle_key_event(&mut self, key: KeyEvent) -> anyhow::Result<()> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => self.send(AppEvent::Quit)?,
            KeyCode::Char('c') if ctrl => self.send(AppEvent::Quit)?,
            KeyCode::Char('s') if ctrl => self.send(AppEvent::ExportNotebook)?,
            KeyCode::Enter => {
                let input = self.input.text.trim().to_string();
                if !input.is_empty() && !self.is_loading {
                    self.send(AppEvent::Submit(input))?;
                }
            }
            KeyCode::Char(c) => self.input.insert(c),
            KeyCode::Backspace => self.input.backspace(),
            KeyCode::Delete => self.input.delete(),
            KeyCode::Left => self.input.left(),
            KeyCode::Right => self.input.right(),
            KeyCode::Up => self.scroll_by(-1),
            KeyCode::Down => self.scroll_by(1),
            _ => {}
        }
        Ok(())
    }

    /// Lines in the history pane, spinner included
    pub fn content_height(&self) -> usize {
        self.transcript.line_count() + usize::from(self.is_loading)
    }

    /// The clamped scroll offset the history pane is drawn at
    pub fn scroll_offset(&self) -> usize {
        self.scroll_position
            .min(self.content_height().saturating_sub(self.viewport_height))
    }

    /// Scroll by a number of lines (positive = down)
    pub fn scroll_by(&mut self, delta: i32) {
        let max = self.content_height().saturating_sub(self.viewport_height);
        self.scroll_position = scrolled(self.scroll_position, delta, max);
    }

    fn scroll_to_bottom(&mut self) {
        self.scroll_position = usize::MAX;
    }
}
