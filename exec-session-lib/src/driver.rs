//! Async event loop that owns a [`SessionController`].
//!
//! Consumer commands and transport events are funnelled through one task, so
//! the controller is only ever touched from one place and in arrival order.
//! Consumers observe the transcript through a `watch` channel of snapshots.

use shared::{Key, Language};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};
use url::Url;

use crate::connection::ConnectionFactory;
use crate::controller::{SessionController, SessionOptions, SessionState};
use crate::error::SessionError;
use crate::transport::{EventReceiver, WsConnectionFactory};

/// Consumer actions
#[derive(Debug, Clone)]
pub enum Command {
    Start { code: String, language: Language },
    Stop,
    Key(Key),
    Clear,
    SetLanguage(Language),
    Shutdown,
}

/// What a view renders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub state: SessionState,
    pub text: String,
    pub revision: u64,
    pub language: Language,
}

impl Snapshot {
    fn of<F: ConnectionFactory>(controller: &SessionController<F>) -> Self {
        Self {
            state: controller.state(),
            text: controller.text().to_string(),
            revision: controller.revision(),
            language: controller.language(),
        }
    }
}

/// Cloneable consumer-side handle
#[derive(Clone)]
pub struct DriverHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<Snapshot>,
}

impl DriverHandle {
    pub fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .map_err(|_| SessionError::DriverStopped)
    }

    pub fn start(&self, code: impl Into<String>, language: Language) -> Result<(), SessionError> {
        self.send(Command::Start {
            code: code.into(),
            language,
        })
    }

    pub fn stop(&self) -> Result<(), SessionError> {
        self.send(Command::Stop)
    }

    pub fn send_key(&self, key: Key) -> Result<(), SessionError> {
        self.send(Command::Key(key))
    }

    pub fn clear(&self) -> Result<(), SessionError> {
        self.send(Command::Clear)
    }

    pub fn set_language(&self, language: Language) -> Result<(), SessionError> {
        self.send(Command::SetLanguage(language))
    }

    pub fn shutdown(&self) -> Result<(), SessionError> {
        self.send(Command::Shutdown)
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// Subscribe to snapshot changes
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }
}

pub struct SessionDriver<F: ConnectionFactory> {
    controller: SessionController<F>,
    commands: mpsc::UnboundedReceiver<Command>,
    events: EventReceiver,
    snapshots: watch::Sender<Snapshot>,
}

impl SessionDriver<WsConnectionFactory> {
    /// Driver wired to a WebSocket endpoint.
    pub fn websocket(
        endpoint: Url,
        options: SessionOptions,
        language: Language,
    ) -> (Self, DriverHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let factory = WsConnectionFactory::new(endpoint, events_tx);
        let controller = SessionController::new(factory, options).with_language(language);
        Self::new(controller, events_rx)
    }
}

impl<F: ConnectionFactory> SessionDriver<F> {
    /// `events` must be the receiver paired with the factory's event sender.
    pub fn new(controller: SessionController<F>, events: EventReceiver) -> (Self, DriverHandle) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (snapshots_tx, snapshots_rx) = watch::channel(Snapshot::of(&controller));

        let driver = Self {
            controller,
            commands: commands_rx,
            events,
            snapshots: snapshots_tx,
        };
        let handle = DriverHandle {
            commands: commands_tx,
            snapshots: snapshots_rx,
        };
        (driver, handle)
    }

    /// Run until `Shutdown` or every handle is dropped. Returns the
    /// controller, disposed, for inspection.
    pub async fn run(mut self) -> SessionController<F> {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.apply(command),
                },
                Some((session_id, event)) = self.events.recv() => {
                    self.controller.handle_event(session_id, event);
                }
            }
            self.publish();
        }

        info!("Session driver shutting down");
        self.controller.dispose();
        self.publish();
        self.controller
    }

    fn apply(&mut self, command: Command) {
        debug!("Command: {:?}", command);
        match command {
            Command::Start { code, language } => {
                self.controller.start(&code, language);
            }
            Command::Stop => {
                self.controller.stop();
            }
            Command::Key(key) => self.controller.send_key(&key),
            Command::Clear => {
                self.controller.clear();
            }
            Command::SetLanguage(language) => {
                self.controller.set_language(language);
            }
            Command::Shutdown => {}
        }
    }

    fn publish(&self) {
        let controller = &self.controller;
        self.snapshots.send_if_modified(|current| {
            if current.revision == controller.revision()
                && current.state == controller.state()
                && current.language == controller.language()
            {
                return false;
            }
            *current = Snapshot::of(controller);
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::mock::MockFactory;
    use crate::connection::TransportEvent;
    use crate::transport::EventSender;

    fn driver() -> (
        SessionDriver<MockFactory>,
        DriverHandle,
        EventSender,
        MockFactory,
    ) {
        let factory = MockFactory::default();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let controller = SessionController::new(factory.clone(), SessionOptions::default());
        let (driver, handle) = SessionDriver::new(controller, events_rx);
        (driver, handle, events_tx, factory)
    }

    async fn wait_for<P>(rx: &mut watch::Receiver<Snapshot>, predicate: P) -> Snapshot
    where
        P: Fn(&Snapshot) -> bool,
    {
        loop {
            {
                let current = rx.borrow_and_update();
                if predicate(&current) {
                    return current.clone();
                }
            }
            rx.changed().await.unwrap();
        }
    }

    #[tokio::test]
    async fn run_to_completion_through_driver() {
        let (driver, handle, events, factory) = driver();
        let mut snapshots = handle.subscribe();
        let task = tokio::spawn(driver.run());

        handle.start("print(1)", Language::Python).unwrap();
        wait_for(&mut snapshots, |s| s.state == SessionState::Connecting).await;

        let id = factory.records.lock().unwrap()[0].session_id;
        events.send((id, TransportEvent::Open)).unwrap();
        wait_for(&mut snapshots, |s| s.state == SessionState::Running).await;

        events
            .send((id, TransportEvent::Message(r#"{"output":"1\n"}"#.into())))
            .unwrap();
        events
            .send((id, TransportEvent::Message(r#"{"type":"done"}"#.into())))
            .unwrap();
        events.send((id, TransportEvent::Close)).unwrap();

        let done = wait_for(&mut snapshots, |s| s.state == SessionState::Completed).await;
        assert_eq!(done.text, "1\n\n\n[Process exited]");

        handle.shutdown().unwrap();
        let controller = task.await.unwrap();
        assert_eq!(controller.text(), "1\n\n\n[Process exited]");
        assert!(factory.closed(0));
    }

    #[tokio::test]
    async fn keys_and_stop_through_driver() {
        let (driver, handle, events, factory) = driver();
        let mut snapshots = handle.subscribe();
        let task = tokio::spawn(driver.run());

        handle.start("input()", Language::Python).unwrap();
        wait_for(&mut snapshots, |s| s.state == SessionState::Connecting).await;
        let id = factory.records.lock().unwrap()[0].session_id;
        events.send((id, TransportEvent::Open)).unwrap();
        wait_for(&mut snapshots, |s| s.state == SessionState::Running).await;

        handle.send_key(Key::Char('y')).unwrap();
        handle.send_key(Key::Enter).unwrap();
        handle.stop().unwrap();
        let stopped = wait_for(&mut snapshots, |s| s.state == SessionState::Stopped).await;
        assert!(stopped.text.ends_with("[Stopped by user]\n"));

        events.send((id, TransportEvent::Close)).unwrap();
        handle.clear().unwrap();
        let cleared = wait_for(&mut snapshots, |s| s.state == SessionState::Idle).await;
        assert_eq!(cleared.text, "");

        drop(handle);
        let controller = task.await.unwrap();
        assert_eq!(controller.state(), SessionState::Idle);
        assert_eq!(&factory.sent(0)[1..], ["y", "\n"]);
    }

    #[tokio::test]
    async fn language_change_is_published() {
        let (driver, handle, _events, _factory) = driver();
        let mut snapshots = handle.subscribe();
        let task = tokio::spawn(driver.run());

        handle.set_language(Language::Cpp).unwrap();
        let snapshot = wait_for(&mut snapshots, |s| s.language == Language::Cpp).await;
        assert_eq!(snapshot.state, SessionState::Idle);

        handle.shutdown().unwrap();
        task.await.unwrap();
        assert!(matches!(handle.stop(), Err(SessionError::DriverStopped)));
    }
}
