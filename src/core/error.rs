//! Error taxonomy for the entry store and both assemblers.
//!
//! Everything in [`ConcatError`] is fatal and propagates unchanged to the
//! build driver. External source map problems are never fatal: they are
//! wrapped in an [`ExternalMapWarning`] and handed to a [`WarningSink`].

use std::fmt;
use std::sync::Mutex;

use miette::Diagnostic;

/// Invalid construction options. Raised before any entry is accepted.
#[derive(Debug, Diagnostic, thiserror::Error)]
pub enum ConfigError {
    #[error("the output name option is required")]
    #[diagnostic(code(stitch::config::output_name))]
    MissingOutputName,

    #[error("{field} cannot contain a glob,  `{pattern}`")]
    #[diagnostic(
        code(stitch::config::glob),
        help("header and footer files are concatenated in the order listed, so list them explicitly")
    )]
    GlobInFileList { field: &'static str, pattern: String },

    #[error("invalid ordering pattern `{pattern}`")]
    #[diagnostic(code(stitch::config::pattern))]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("a map URL must be set when using a custom map file")]
    #[diagnostic(code(stitch::config::map_url))]
    MapFileWithoutUrl,
}

/// Patch operations that can target a missing identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOp {
    Update,
    Remove,
}

impl PatchOp {
    fn missing_reason(self) -> &'static str {
        match self {
            PatchOp::Update => "it has not been read before",
            PatchOp::Remove => "it did not previously exist",
        }
    }
}

impl fmt::Display for PatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchOp::Update => f.write_str("update"),
            PatchOp::Remove => f.write_str("remove"),
        }
    }
}

/// Fatal errors raised by the store and the assemblers.
#[derive(Debug, Diagnostic, thiserror::Error)]
pub enum ConcatError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("Trying to add {id} but it was already added")]
    #[diagnostic(
        code(stitch::duplicate_entry),
        help("call update_file for files that were already read, or remove_file first")
    )]
    DuplicateEntry { id: String },

    #[error("Trying to {op} {id} but {}", .op.missing_reason())]
    #[diagnostic(code(stitch::unknown_entry))]
    UnknownEntry { id: String, op: PatchOp },

    #[error("nothing to concatenate and empty output is not allowed")]
    #[diagnostic(code(stitch::empty_result), help("set allow_none to accept an empty result"))]
    EmptyResult,

    #[error("the concatenation unit has been disposed")]
    #[diagnostic(code(stitch::disposed))]
    Disposed,
}

/// Why an external source map could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ExternalMapError {
    #[error("the inline source map is not valid base64: {0}")]
    InlineDecode(#[from] base64::DecodeError),

    #[error("the inline source map is not valid UTF-8")]
    InlineUtf8(#[from] std::string::FromUtf8Error),

    #[error("{path} could not be read: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("the source map is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("the source map mappings are malformed: {0}")]
    Mappings(#[from] crate::core::vlq::VlqError),
}

/// One non-fatal resolution failure for a single entry.
#[derive(Debug)]
pub struct ExternalMapWarning {
    /// Identifier of the entry whose reference failed
    pub entry: String,
    /// The recorded reference, as found in the comment
    pub url: String,
    pub error: ExternalMapError,
}

impl fmt::Display for ExternalMapWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ignoring input sourcemap for {} because {}", self.entry, self.error)
    }
}

/// Destination for non-fatal warnings. The core never logs on its own.
pub trait WarningSink: Send + Sync {
    fn warn(&self, warning: ExternalMapWarning);
}

/// Default sink: forwards to `tracing` at WARN level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl WarningSink for TracingSink {
    fn warn(&self, warning: ExternalMapWarning) {
        tracing::warn!(entry = %warning.entry, url = %warning.url, "{warning}");
    }
}

/// Sink that keeps every warning in memory, for callers that report later.
#[derive(Debug, Default)]
pub struct CollectingSink {
    warnings: Mutex<Vec<String>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rendered warnings received so far, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.warnings
            .lock()
            .map(|w| w.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.warnings.lock().map(|w| w.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WarningSink for CollectingSink {
    fn warn(&self, warning: ExternalMapWarning) {
        if let Ok(mut w) = self.warnings.lock() {
            w.push(warning.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_entry_messages_name_the_operation() {
        let update = ConcatError::UnknownEntry { id: "a.js".into(), op: PatchOp::Update };
        assert_eq!(update.to_string(), "Trying to update a.js but it has not been read before");

        let remove = ConcatError::UnknownEntry { id: "a.js".into(), op: PatchOp::Remove };
        assert_eq!(remove.to_string(), "Trying to remove a.js but it did not previously exist");
    }

    #[test]
    fn glob_message_matches_field_name() {
        let err = ConfigError::GlobInFileList { field: "headerFiles", pattern: "inner/*.js".into() };
        assert_eq!(err.to_string(), "headerFiles cannot contain a glob,  `inner/*.js`");
    }

    #[test]
    fn collecting_sink_renders_warnings() {
        let sink = CollectingSink::new();
        sink.warn(ExternalMapWarning {
            entry: "a.js".into(),
            url: "a.map".into(),
            error: ExternalMapError::Read {
                path: "a.map".into(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
            },
        });

        assert_eq!(sink.len(), 1);
        assert!(sink.messages()[0].starts_with("ignoring input sourcemap for a.js because"));
    }
}
