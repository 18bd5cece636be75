//! Run/stop state machine for interactive execution.
//!
//! One [`Session`] exists per run attempt and exclusively owns its connection.
//! The [`SessionController`] owns the current session plus the transcript and
//! applies one transition function per transport event kind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{decode_frame, encode_key, encode_start, EraseCode, Key, Language, ServerFrame};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::connection::{Connection, ConnectionFactory, TransportEvent};
use crate::output_log::{OutputLog, STOPPED_LINE};

/// Lifecycle of a single run attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Connecting,
    Running,
    Completed,
    Errored,
    Stopped,
}

impl SessionState {
    /// Connecting or running: a connection is live
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::Running)
    }

    /// Dead end for the session instance
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Errored | SessionState::Stopped
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Errored => "errored",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// What `start()` does while another run is connecting or running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartPolicy {
    /// Abandon the running session and start the new one
    #[default]
    Restart,
    /// Keep the running session, drop the request
    Ignore,
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown start policy '{0}' (expected 'restart' or 'ignore')")]
pub struct ParseStartPolicyError(String);

impl std::str::FromStr for StartPolicy {
    type Err = ParseStartPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "restart" => Ok(StartPolicy::Restart),
            "ignore" => Ok(StartPolicy::Ignore),
            _ => Err(ParseStartPolicyError(s.to_string())),
        }
    }
}

/// Controller options
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    pub erase_code: EraseCode,
    pub start_policy: StartPolicy,
}

/// One run attempt. Code and language are a snapshot taken at start.
pub struct Session<C: Connection> {
    id: Uuid,
    state: SessionState,
    connection: Option<C>,
    started_at: DateTime<Utc>,
    code: String,
    language: Language,
}

impl<C: Connection> Session<C> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn has_connection(&self) -> bool {
        self.connection.is_some()
    }

    /// Enter a terminal state and release the connection.
    fn finish(&mut self, state: SessionState) {
        debug!("Session {} {} -> {}", self.id, self.state, state);
        self.state = state;
        self.release();
    }

    fn release(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
    }
}

impl<C: Connection> Drop for Session<C> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Owns the current session and the transcript shown to the consumer.
pub struct SessionController<F: ConnectionFactory> {
    factory: F,
    options: SessionOptions,
    session: Option<Session<F::Connection>>,
    log: OutputLog,
    /// Consumer's active language selection
    language: Language,
}

impl<F: ConnectionFactory> SessionController<F> {
    pub fn new(factory: F, options: SessionOptions) -> Self {
        Self {
            factory,
            options,
            session: None,
            log: OutputLog::new(),
            language: Language::default(),
        }
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(SessionState::Idle)
    }

    pub fn text(&self) -> &str {
        self.log.text()
    }

    pub fn log(&self) -> &OutputLog {
        &self.log
    }

    pub fn revision(&self) -> u64 {
        self.log.revision()
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn session(&self) -> Option<&Session<F::Connection>> {
        self.session.as_ref()
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Start a new run. Returns the new session id, or `None` when the
    /// request was dropped under [`StartPolicy::Ignore`].
    pub fn start(&mut self, code: &str, language: Language) -> Option<Uuid> {
        if self.state().is_active() && self.options.start_policy == StartPolicy::Ignore {
            debug!("Ignoring start while a run is {}", self.state());
            return None;
        }

        // The old connection is closed before the new one is requested.
        if let Some(mut previous) = self.session.take() {
            if previous.state.is_active() {
                info!("Abandoning session {} for a new run", previous.id);
            }
            previous.release();
        }

        self.log.clear();
        self.language = language;

        let id = Uuid::new_v4();
        let mut session = Session {
            id,
            state: SessionState::Connecting,
            connection: None,
            started_at: Utc::now(),
            code: code.to_string(),
            language,
        };

        info!("Starting {} session {}", language, id);
        match self.factory.connect(id) {
            Ok(connection) => session.connection = Some(connection),
            Err(e) => {
                warn!("Failed to open connection for session {}: {}", id, e);
                self.log.append_line(&format!("[Error: {}]", e));
                session.state = SessionState::Errored;
            }
        }

        self.session = Some(session);
        Some(id)
    }

    /// Cancel the active run. Returns whether anything was stopped.
    pub fn stop(&mut self) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if !session.state.is_active() {
            return false;
        }

        info!("Stopping session {} at user request", session.id);
        session.finish(SessionState::Stopped);
        self.log.append_line(STOPPED_LINE);
        true
    }

    /// Forward one key press to the running program. No local echo.
    pub fn send_key(&mut self, key: &Key) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.state != SessionState::Running {
            return;
        }
        let Some(payload) = encode_key(key, self.options.erase_code) else {
            return;
        };
        let Some(connection) = session.connection.as_mut() else {
            return;
        };

        if let Err(e) = connection.send(payload) {
            warn!("Failed to forward keystroke: {}", e);
            self.log.append_line(&format!("[Connection error: {}]", e));
            session.finish(SessionState::Errored);
        }
    }

    /// Reset to `Idle` with an empty transcript. Refused while a run is live.
    pub fn clear(&mut self) -> bool {
        if self.state().is_active() {
            debug!("Refusing to clear while {}", self.state());
            return false;
        }
        self.session = None;
        self.log.clear();
        true
    }

    /// Change the active language. Any residual run is discarded and the
    /// transcript cleared. Returns whether the selection changed.
    pub fn set_language(&mut self, language: Language) -> bool {
        if language == self.language {
            return false;
        }
        info!("Language changed {} -> {}", self.language, language);
        self.language = language;
        self.session = None;
        self.log.clear();
        true
    }

    /// Tear down any live connection without annotating the transcript.
    pub fn dispose(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.release();
        }
    }

    /// Feed one transport event. Events from any session other than the
    /// current one are stale and dropped.
    pub fn handle_event(&mut self, session_id: Uuid, event: TransportEvent) {
        match self.session.as_ref() {
            Some(session) if session.id == session_id => {}
            _ => {
                debug!("Dropping {:?} for stale session {}", event, session_id);
                return;
            }
        }

        match event {
            TransportEvent::Open => self.on_open(),
            TransportEvent::Message(raw) => self.on_message(&raw),
            TransportEvent::Error(message) => self.on_error(&message),
            TransportEvent::Close => self.on_close(),
        }
    }

    fn on_open(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.state != SessionState::Connecting {
            return;
        }

        let envelope = encode_start(&session.code, session.language);
        let sent = match session.connection.as_mut() {
            Some(connection) => connection.send(envelope),
            None => return,
        };

        match sent {
            Ok(()) => {
                info!("Session {} running", session.id);
                session.state = SessionState::Running;
            }
            Err(e) => {
                warn!("Failed to send start envelope: {}", e);
                self.log.append_line(&format!("[Connection error: {}]", e));
                session.finish(SessionState::Errored);
            }
        }
    }

    fn on_message(&mut self, raw: &str) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.state != SessionState::Running {
            debug!("Ignoring frame while {}", session.state);
            return;
        }

        match decode_frame(raw) {
            ServerFrame::Output(text) => self.log.append(&text),
            ServerFrame::Done => {
                info!("Session {} completed", session.id);
                self.log.append_exit_marker();
                session.finish(SessionState::Completed);
            }
            ServerFrame::Ignored => {}
        }
    }

    fn on_error(&mut self, message: &str) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.state.is_active() {
            return;
        }

        warn!("Transport error in session {}: {}", session.id, message);
        self.log.append_line(&format!("[Connection error: {}]", message));
        session.finish(SessionState::Errored);
    }

    fn on_close(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        // Done, stop and error have already annotated the transcript.
        match session.state {
            SessionState::Running => {
                info!("Session {} closed without done, treating as exit", session.id);
                self.log.append_exit_marker();
                session.finish(SessionState::Completed);
            }
            SessionState::Connecting => {
                warn!("Session {} closed before opening", session.id);
                self.log
                    .append_line("[Connection closed before the run started]");
                session.finish(SessionState::Errored);
            }
            _ => {}
        }
    }
}
