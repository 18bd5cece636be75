use serde::{Deserialize, Serialize};
use std::str::FromStr;

// Wire envelope encoding and frame decoding
pub mod protocol;
pub use protocol::{decode_frame, encode_start, ServerFrame, StartEnvelope};

// Key events and keystroke encoding
pub mod keys;
pub use keys::{encode_key, EraseCode, Key};

/// Languages the execution backend knows how to run.
/// Serialized lowercase, exactly as the backend expects them in the start envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Python,
    Javascript,
    Cpp,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Python, Language::Javascript, Language::Cpp];

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Javascript => "javascript",
            Self::Cpp => "cpp",
        }
    }

    /// Human-readable name for headers and listings
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Python => "Python",
            Self::Javascript => "JavaScript",
            Self::Cpp => "C++",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Python => "py",
            Self::Javascript => "js",
            Self::Cpp => "cpp",
        }
    }

    /// Default source file name, e.g. `main.py`
    pub fn file_name(&self) -> String {
        format!("main.{}", self.extension())
    }

    /// Detect a language from a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "py" => Some(Self::Python),
            "js" | "mjs" | "cjs" => Some(Self::Javascript),
            "cpp" | "cc" | "cxx" | "c++" | "hpp" => Some(Self::Cpp),
            _ => None,
        }
    }

    /// Starter program shown when no source has been written yet.
    pub fn template(&self) -> &'static str {
        match self {
            Self::Python => "print(\"Hello, Python!\")",
            Self::Javascript => "console.log(\"Hello, JavaScript!\");",
            Self::Cpp => concat!(
                "#include<iostream>\n",
                "using namespace std;\n",
                "\n",
                "int main() {\n",
                "    cout << \"Hello, C++!\" << endl;\n",
                "    return 0;\n",
                "}"
            ),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown language '{0}' (expected one of: python, javascript, cpp)")]
pub struct ParseLanguageError(String);

impl FromStr for Language {
    type Err = ParseLanguageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "python" | "py" => Ok(Self::Python),
            "javascript" | "js" | "node" => Ok(Self::Javascript),
            "cpp" | "c++" => Ok(Self::Cpp),
            _ => Err(ParseLanguageError(s.to_string())),
        }
    }
}
