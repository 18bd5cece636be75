//! Wire protocol between the execution client and the sandbox backend.
//!
//! The backend speaks a deliberately loose protocol over a message-oriented
//! WebSocket: the client sends one JSON start envelope, then raw keystrokes;
//! the server answers with JSON envelopes or bare text. Decoding never fails,
//! anything that is not a recognised envelope is treated as program output.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::Language;

/// Value of the `type` field that signals the remote process exited.
pub const DONE_TYPE: &str = "done";

/// Control characters that erase the previous character of terminal output.
/// `\b` and `\x08` are the same code point.
pub const BACKSPACE_CODES: [char; 2] = ['\u{8}', '\u{7f}'];

/// Query parameter used to pass the opaque auth token to the backend.
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Returns true for characters that erase the previous output character.
pub fn is_backspace(c: char) -> bool {
    BACKSPACE_CODES.contains(&c)
}

/// First (and only structured) message the client sends on a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartEnvelope {
    pub code: String,
    pub language: Language,
}

/// A decoded server-to-client frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame {
    /// A chunk of combined stdout/stderr.
    Output(String),
    /// The remote process exited.
    Done,
    /// A structured envelope carrying nothing the client understands.
    Ignored,
}

/// Encode the start envelope `{ "code": ..., "language": ... }`.
pub fn encode_start(code: &str, language: Language) -> String {
    serde_json::json!({
        "code": code,
        "language": language,
    })
    .to_string()
}

/// Decode one frame received from the backend.
///
/// JSON objects are read as envelopes. Everything else, including JSON
/// scalars such as a program printing `42`, is passed through verbatim as
/// output so no backend bytes are dropped.
pub fn decode_frame(raw: &str) -> ServerFrame {
    let map = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        _ => return ServerFrame::Output(raw.to_string()),
    };

    if map.get("type").and_then(Value::as_str) == Some(DONE_TYPE) {
        return ServerFrame::Done;
    }

    match map.get("output") {
        Some(Value::String(text)) => ServerFrame::Output(text.clone()),
        Some(Value::Null) | None => {
            debug!("Ignoring envelope without output: {}", raw);
            ServerFrame::Ignored
        }
        Some(other) => ServerFrame::Output(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_envelope_shape() {
        let json = encode_start("print(1)", Language::Python);
        let parsed: StartEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.code, "print(1)");
        assert_eq!(parsed.language, Language::Python);

        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["language"], "python");
        assert_eq!(value.as_object().unwrap().len(), 2);
    }

    #[test]
    fn start_envelope_escapes_code() {
        let code = "#include<iostream>\nint main() { std::cout << \"hi\"; }";
        let json = encode_start(code, Language::Cpp);
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["code"], code);
        assert_eq!(value["language"], "cpp");
    }

    #[test]
    fn decode_done() {
        assert_eq!(decode_frame(r#"{"type":"done"}"#), ServerFrame::Done);
        // done wins even when output is attached
        assert_eq!(
            decode_frame(r#"{"type":"done","output":"bye"}"#),
            ServerFrame::Done
        );
    }

    #[test]
    fn decode_output() {
        assert_eq!(
            decode_frame(r#"{"output":"1\n"}"#),
            ServerFrame::Output("1\n".to_string())
        );
        assert_eq!(
            decode_frame(r#"{"type":"stdout","output":"x"}"#),
            ServerFrame::Output("x".to_string())
        );
    }

    #[test]
    fn decode_malformed_falls_back_to_raw_text() {
        assert_eq!(
            decode_frame("not json"),
            ServerFrame::Output("not json".to_string())
        );
        assert_eq!(
            decode_frame("{\"output\": "),
            ServerFrame::Output("{\"output\": ".to_string())
        );
    }

    #[test]
    fn decode_json_scalar_is_raw_text() {
        assert_eq!(decode_frame("42"), ServerFrame::Output("42".to_string()));
        assert_eq!(
            decode_frame("\"quoted\""),
            ServerFrame::Output("\"quoted\"".to_string())
        );
    }

    #[test]
    fn decode_envelope_without_output_is_ignored() {
        assert_eq!(decode_frame(r#"{"type":"ping"}"#), ServerFrame::Ignored);
        assert_eq!(decode_frame(r#"{"output":null}"#), ServerFrame::Ignored);
    }

    #[test]
    fn decode_non_string_output() {
        assert_eq!(
            decode_frame(r#"{"output":7}"#),
            ServerFrame::Output("7".to_string())
        );
    }

    #[test]
    fn backspace_codes() {
        assert!(is_backspace('\x08'));
        assert!(is_backspace('\x7f'));
        assert!(!is_backspace('a'));
        assert!(!is_backspace('\n'));
    }
}
