//! Error types for exec-session-lib

/// Errors that can occur while driving an execution session
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to connect: {0}")]
    Connect(String),

    #[error("Connection already closed")]
    ConnectionClosed,

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Session driver is no longer running")]
    DriverStopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SessionError::ConnectionClosed;
        assert_eq!(format!("{}", err), "Connection already closed");

        let err = SessionError::Connect("connection refused".to_string());
        assert_eq!(format!("{}", err), "Failed to connect: connection refused");

        let err = SessionError::InvalidEndpoint("ftp://x: unsupported scheme".to_string());
        assert_eq!(
            format!("{}", err),
            "Invalid endpoint: ftp://x: unsupported scheme"
        );
    }

    #[test]
    fn test_error_debug() {
        let err = SessionError::DriverStopped;
        let debug = format!("{:?}", err);
        assert!(debug.contains("DriverStopped"));
    }
}
