//! Raw-mode terminal plumbing: key capture and incremental transcript drawing.

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::{cursor, execute, terminal};
use shared::Key;
use std::io::{self, Write};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

/// How often the reader thread checks whether anyone is still listening
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What a key press means to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Forward to the running program
    Key(Key),
    Stop,
    Rerun,
    Clear,
    Quit,
}

/// Map a crossterm key event. Control chords are reserved for the client.
pub fn map_event(event: &KeyEvent) -> Option<Action> {
    if event.kind == KeyEventKind::Release {
        return None;
    }

    if event.modifiers.contains(KeyModifiers::CONTROL) {
        return match event.code {
            KeyCode::Char('c') => Some(Action::Stop),
            KeyCode::Char('d') => Some(Action::Quit),
            KeyCode::Char('r') => Some(Action::Rerun),
            KeyCode::Char('l') => Some(Action::Clear),
            _ => None,
        };
    }

    let key = match event.code {
        KeyCode::Enter => Key::Enter,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Tab => Key::Char('\t'),
        KeyCode::Char(c) => Key::Char(c),
        other => Key::Named(format!("{:?}", other)),
    };
    Some(Action::Key(key))
}

/// Restores cooked mode on drop, including on early returns and panics.
pub struct RawModeGuard;

impl RawModeGuard {
    pub fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Read key events on a dedicated thread until the receiver goes away.
pub fn spawn_key_reader(tx: mpsc::UnboundedSender<Action>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        while !tx.is_closed() {
            match event::poll(POLL_INTERVAL) {
                Ok(true) => match event::read() {
                    Ok(Event::Key(key)) => {
                        if let Some(action) = map_event(&key) {
                            if tx.send(action).is_err() {
                                break;
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Failed to read terminal event: {}", e);
                        break;
                    }
                },
                Ok(false) => {}
                Err(e) => {
                    warn!("Failed to poll terminal: {}", e);
                    break;
                }
            }
        }
    })
}

/// How to bring the screen from one transcript to the next
#[derive(Debug, PartialEq, Eq)]
pub enum RenderOp {
    Nothing,
    Append(String),
    /// Rub out `count` trailing characters on the current line, then append
    Erase { count: usize, then: String },
    Redraw(String),
}

/// Compute the cheapest screen update from `shown` to `text`.
pub fn diff(shown: &str, text: &str) -> RenderOp {
    if shown == text {
        return RenderOp::Nothing;
    }
    if let Some(rest) = text.strip_prefix(shown) {
        return RenderOp::Append(rest.to_string());
    }

    let common = shown
        .char_indices()
        .zip(text.chars())
        .find(|((_, a), b)| a != b)
        .map(|((i, _), _)| i)
        .unwrap_or_else(|| shown.len().min(text.len()));
    let removed = &shown[common..];

    if removed.contains('\n') || text.is_empty() {
        return RenderOp::Redraw(text.to_string());
    }
    RenderOp::Erase {
        count: removed.chars().count(),
        then: text[common..].to_string(),
    }
}

/// Keeps what is on screen in sync with the transcript.
#[derive(Default)]
pub struct TranscriptRenderer {
    shown: String,
    /// Something outside the transcript was printed; diffs no longer hold
    stale: bool,
}

impl TranscriptRenderer {
    pub fn render<W: Write>(&mut self, text: &str, out: &mut W) -> io::Result<()> {
        let op = if self.stale && self.shown != text {
            RenderOp::Redraw(text.to_string())
        } else {
            diff(&self.shown, text)
        };

        match op {
            RenderOp::Nothing => return Ok(()),
            RenderOp::Append(rest) => write_raw(out, &rest)?,
            RenderOp::Erase { count, then } => {
                for _ in 0..count {
                    out.write_all(b"\x08 \x08")?;
                }
                write_raw(out, &then)?;
            }
            RenderOp::Redraw(all) => {
                execute!(
                    out,
                    terminal::Clear(terminal::ClearType::All),
                    cursor::MoveTo(0, 0)
                )?;
                write_raw(out, &all)?;
            }
        }
        self.shown = text.to_string();
        self.stale = false;
        out.flush()
    }

    /// Redraw from scratch on the next change, e.g. after a status line was
    /// printed below the transcript.
    pub fn invalidate(&mut self) {
        self.stale = true;
    }
}

/// Raw mode does not translate `\n`, so emit `\r\n` ourselves.
fn write_raw<W: Write>(out: &mut W, text: &str) -> io::Result<()> {
    out.write_all(text.replace('\n', "\r\n").as_bytes())
}
