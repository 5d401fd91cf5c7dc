//! Plain concatenation: literal header, ordered file contents, literal footer.

use crate::core::entry::Entry;
use crate::core::error::{ConcatError, ConfigError};
use crate::core::store::{BodyOrder, OrderedEntryStore, StoreConfig, StoreState};

/// Options shared by both assembly strategies.
#[derive(Debug, Clone)]
pub struct ConcatOptions {
    /// Name of the concatenated artifact, relative to the output directory
    pub output_name: String,
    pub separator: String,
    pub header: Option<String>,
    pub footer: Option<String>,
    pub header_files: Vec<String>,
    pub footer_files: Vec<String>,
    pub allow_empty: bool,
    pub body_order: BodyOrder,
}

impl ConcatOptions {
    pub fn new(output_name: impl Into<String>) -> Self {
        Self {
            output_name: output_name.into(),
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.output_name.trim().is_empty() {
            return Err(ConfigError::MissingOutputName);
        }
        Ok(())
    }

    pub(crate) fn store_config(&self) -> StoreConfig {
        StoreConfig {
            header_files: self.header_files.clone(),
            footer_files: self.footer_files.clone(),
            body_order: self.body_order.clone(),
            allow_empty: self.allow_empty,
        }
    }
}

impl Default for ConcatOptions {
    fn default() -> Self {
        Self {
            output_name: String::new(),
            separator: "\n".to_string(),
            header: None,
            footer: None,
            header_files: Vec::new(),
            footer_files: Vec::new(),
            allow_empty: false,
            body_order: BodyOrder::default(),
        }
    }
}

/// Join sections with one separator between neighbours. `padding[i]` extra
/// `\n` are appended to entry `i`; the footer literal gets one trailing `\n`.
pub(crate) fn render(
    header: Option<&str>,
    entries: &[&Entry],
    padding: &[usize],
    footer: Option<&str>,
    separator: &str,
) -> String {
    let capacity = entries
        .iter()
        .map(|e| e.content.len() + separator.len())
        .sum::<usize>()
        + header.map_or(0, str::len)
        + footer.map_or(0, str::len)
        + 1;
    let mut out = String::with_capacity(capacity);
    let mut first = true;

    let mut section = |out: &mut String, text: &str| {
        if !std::mem::replace(&mut first, false) {
            out.push_str(separator);
        }
        out.push_str(text);
    };

    if let Some(header) = header.filter(|h| !h.is_empty()) {
        section(&mut out, header);
    }

    for (i, entry) in entries.iter().enumerate() {
        section(&mut out, &entry.content);
        let extra = padding.get(i).copied().unwrap_or(0);
        out.extend(std::iter::repeat_n('\n', extra));
    }

    if let Some(footer) = footer.filter(|f| !f.is_empty()) {
        section(&mut out, footer);
        out.push('\n');
    }

    out
}

#[derive(Debug)]
pub struct PlainAssembler {
    store: OrderedEntryStore,
    options: ConcatOptions,
}

impl PlainAssembler {
    pub fn new(options: ConcatOptions) -> Result<Self, ConcatError> {
        options.validate()?;
        let store = OrderedEntryStore::new(options.store_config())?;
        Ok(Self { store, options })
    }

    pub fn options(&self) -> &ConcatOptions {
        &self.options
    }

    pub fn store(&self) -> &OrderedEntryStore {
        &self.store
    }

    pub fn add_file(&mut self, id: &str, content: impl Into<String>) -> Result<(), ConcatError> {
        self.store.add_file(id, content)
    }

    pub fn update_file(&mut self, id: &str, content: impl Into<String>) -> Result<(), ConcatError> {
        self.store.update_file(id, content)
    }

    pub fn remove_file(&mut self, id: &str) -> Result<(), ConcatError> {
        self.store.remove_file(id)
    }

    pub fn result(&self) -> Result<String, ConcatError> {
        if self.store.state() == StoreState::Disposed {
            return Err(ConcatError::Disposed);
        }
        if self.store.is_empty() && !self.store.allow_empty() {
            return Err(ConcatError::EmptyResult);
        }

        let entries = self.store.ordered_entries();
        Ok(render(
            self.options.header.as_deref(),
            &entries,
            &[],
            self.options.footer.as_deref(),
            &self.options.separator,
        ))
    }

    pub fn dispose(&mut self) {
        self.store.dispose();
    }
}
