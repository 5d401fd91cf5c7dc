//! Entries tracked by the store and the zones that order them.

/// Output zone of a fragment. Literal zones hold the configured header and
/// footer strings; the other three hold file contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Zone {
    HeaderLiteral,
    HeaderFile,
    Body,
    FooterFile,
    FooterLiteral,
}

impl Zone {
    /// True for zones populated from files rather than configured strings.
    pub fn is_file(self) -> bool {
        matches!(self, Zone::HeaderFile | Zone::Body | Zone::FooterFile)
    }
}

/// One whole-file fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// POSIX-style path relative to the input root
    pub id: String,

    /// File content, with any external map comment already stripped
    pub content: String,

    /// Fixed at insertion; updates never change it
    pub zone: Zone,

    /// URL from a stripped `sourceMappingURL` comment, if any
    pub external_map: Option<String>,
}

impl Entry {
    pub fn new(id: impl Into<String>, content: impl Into<String>, zone: Zone) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            zone,
            external_map: None,
        }
    }
}
