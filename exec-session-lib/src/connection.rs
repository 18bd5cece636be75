//! Transport abstraction used by the session controller.
//!
//! The controller never builds addresses or sockets itself. It is handed a
//! [`ConnectionFactory`] and receives transport activity back as
//! [`TransportEvent`]s tagged with the id of the session that opened the
//! connection.

use uuid::Uuid;

use crate::error::SessionError;

/// Asynchronous activity on a connection, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is established and ready to carry messages
    Open,
    /// One text frame from the backend
    Message(String),
    /// Connection-level failure
    Error(String),
    /// The connection closed, from either side
    Close,
}

/// A live, exclusively owned connection.
pub trait Connection {
    /// Queue one text frame. Never blocks.
    fn send(&mut self, payload: String) -> Result<(), SessionError>;

    /// Close the connection without waiting for the backend. Idempotent.
    fn close(&mut self);
}

/// Opens one connection per session.
pub trait ConnectionFactory {
    type Connection: Connection;

    /// Begin connecting on behalf of `session_id`. Returning `Ok` does not mean
    /// the connection is open; that is signalled later by [`TransportEvent::Open`].
    fn connect(&mut self, session_id: Uuid) -> Result<Self::Connection, SessionError>;
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory transport that records everything the controller does.

    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    pub struct ConnectionRecord {
        pub session_id: Uuid,
        pub sent: Vec<String>,
        pub closed: bool,
    }

    #[derive(Clone, Default)]
    pub struct MockFactory {
        pub records: Arc<Mutex<Vec<ConnectionRecord>>>,
        pub refuse: bool,
    }

    impl MockFactory {
        pub fn refusing() -> Self {
            Self {
                refuse: true,
                ..Default::default()
            }
        }

        pub fn count(&self) -> usize {
            self.records.lock().unwrap().len()
        }

        pub fn sent(&self, index: usize) -> Vec<String> {
            self.records.lock().unwrap()[index].sent.clone()
        }

        pub fn closed(&self, index: usize) -> bool {
            self.records.lock().unwrap()[index].closed
        }

        pub fn open_count(&self) -> usize {
            self.records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| !r.closed)
                .count()
        }
    }

    pub struct MockConnection {
        index: usize,
        records: Arc<Mutex<Vec<ConnectionRecord>>>,
    }

    impl Connection for MockConnection {
        fn send(&mut self, payload: String) -> Result<(), SessionError> {
            let mut records = self.records.lock().unwrap();
            let record = &mut records[self.index];
            if record.closed {
                return Err(SessionError::ConnectionClosed);
            }
            record.sent.push(payload);
            Ok(())
        }

        fn close(&mut self) {
            self.records.lock().unwrap()[self.index].closed = true;
        }
    }

    impl ConnectionFactory for MockFactory {
        type Connection = MockConnection;

        fn connect(&mut self, session_id: Uuid) -> Result<MockConnection, SessionError> {
            if self.refuse {
                return Err(SessionError::Connect("connection refused".to_string()));
            }
            let mut records = self.records.lock().unwrap();
            assert!(
                records.iter().all(|r| r.closed),
                "a previous connection is still open"
            );
            records.push(ConnectionRecord {
                session_id,
                ..Default::default()
            });
            Ok(MockConnection {
                index: records.len() - 1,
                records: self.records.clone(),
            })
        }
    }
}
