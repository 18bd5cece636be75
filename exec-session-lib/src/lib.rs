//! Execution Session Library
//!
//! Client-side control of an interactive run on a remote execution backend:
//! one WebSocket per run, a run/stop state machine and a backspace-aware
//! transcript of everything the program printed.
//!
//! # Overview
//!
//! The library provides:
//! - `OutputLog` - the transcript, with erase-code semantics and an idempotent exit marker
//! - `SessionController` - the synchronous state machine, generic over a `ConnectionFactory`
//! - `WsConnectionFactory` - tokio-tungstenite transport, one task per connection
//! - `SessionDriver` - async loop feeding commands and transport events to the controller
//!
//! # Example
//!
//! ```ignore
//! use exec_session_lib::{build_endpoint, SessionDriver, SessionOptions, SessionState};
//! use shared::Language;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let endpoint = build_endpoint("ws://127.0.0.1:5000/run", None)?;
//!     let (driver, handle) =
//!         SessionDriver::websocket(endpoint, SessionOptions::default(), Language::Python);
//!     tokio::spawn(driver.run());
//!
//!     let mut snapshots = handle.subscribe();
//!     handle.start("print(1)", Language::Python)?;
//!
//!     while snapshots.changed().await.is_ok() {
//!         let snapshot = snapshots.borrow().clone();
//!         if snapshot.state == SessionState::Completed {
//!             print!("{}", snapshot.text);
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod controller;
pub mod driver;
pub mod error;
pub mod output_log;
pub mod transport;

// Re-export main types at crate root
pub use connection::{Connection, ConnectionFactory, TransportEvent};
pub use controller::{
    ParseStartPolicyError, Session, SessionController, SessionOptions, SessionState, StartPolicy,
};
pub use driver::{Command, DriverHandle, SessionDriver, Snapshot};
pub use error::SessionError;
pub use output_log::{OutputLog, EXIT_MARKER, STOPPED_LINE};
pub use transport::{build_endpoint, WsConnection, WsConnectionFactory};
