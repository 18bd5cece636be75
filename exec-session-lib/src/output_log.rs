//! Backspace-aware terminal transcript.
//!
//! Everything the user sees for a run lives here: program output, the exit
//! marker and diagnostic lines. Erase control codes are applied to every
//! chunk, not only to local keystrokes, because the remote side may do its
//! own line editing.

use shared::protocol::is_backspace;

/// Label signalling that the remote process terminated.
pub const EXIT_LABEL: &str = "[Process exited]";

/// Annotation appended once a run finishes.
pub const EXIT_MARKER: &str = "\n\n[Process exited]";

/// Line appended when the user cancels a run.
pub const STOPPED_LINE: &str = "[Stopped by user]";

/// Append-only (modulo backspace) buffer of rendered terminal text.
#[derive(Debug, Default, Clone)]
pub struct OutputLog {
    text: String,
    /// Bumped on every mutation so consumers can skip redundant redraws
    revision: u64,
}

impl OutputLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk of program output.
    ///
    /// Literal exit labels are stripped so a sentinel echoed by the program
    /// cannot fake (or duplicate) the real exit marker, including one that
    /// arrives split across several chunks.
    pub fn append(&mut self, chunk: &str) {
        // lowest byte offset this chunk wrote to
        let mut low = self.text.len();
        for c in chunk.chars() {
            if is_backspace(c) {
                self.text.pop();
                low = low.min(self.text.len());
            } else {
                self.text.push(c);
            }
        }
        self.strip_exit_labels(low);
        self.revision += 1;
    }

    /// Remove every exit label that ends past `low`. Text before `low` was
    /// checked by earlier appends.
    fn strip_exit_labels(&mut self, low: usize) {
        let mut from = low.saturating_sub(EXIT_LABEL.len() - 1);
        while !self.text.is_char_boundary(from) {
            from -= 1;
        }
        while let Some(pos) = self.text[from..].find(EXIT_LABEL) {
            let start = from + pos;
            self.text.replace_range(start..start + EXIT_LABEL.len(), "");
        }
    }

    /// Append the completion annotation unless the buffer already ends with it.
    pub fn append_exit_marker(&mut self) {
        if self.text.ends_with(EXIT_MARKER) {
            return;
        }
        self.text.push_str(EXIT_MARKER);
        self.revision += 1;
    }

    /// Append an annotation on its own line. No control-code processing.
    pub fn append_line(&mut self, line: &str) {
        if !self.text.is_empty() && !self.text.ends_with('\n') {
            self.text.push('\n');
        }
        self.text.push_str(line);
        self.text.push('\n');
        self.revision += 1;
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.revision += 1;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length in characters
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}
