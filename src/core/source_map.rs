//! Map-aware concatenation.
//!
//! [`PositionMapAssembler`] shares the store and the rendering rules of the
//! plain strategy. On every patch it strips an embedded `sourceMappingURL`
//! comment from the content and remembers the URL; on every read it replays
//! the ordered entries through a [`MappingGenerator`] so output text and map
//! always describe the same entry set.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, instrument};

use crate::core::entry::Entry;
use crate::core::error::{ConcatError, ConfigError, TracingSink, WarningSink};
use crate::core::map_comment::{self, CommentStyle};
use crate::core::mapping::{EncoderCache, GeneratorOptions, Generated, Layout, MappingGenerator, MasterMap};
use crate::core::plain::{ConcatOptions, render};
use crate::core::store::{OrderedEntryStore, StoreState};
use crate::infra::io::{FileAccess, FsAccess};

/// Options for the map-aware strategy.
#[derive(Clone)]
pub struct SourceMapOptions {
    pub concat: ConcatOptions,
    pub source_root: Option<String>,
    /// Root the entry identifiers are relative to
    pub input_root: Option<Utf8PathBuf>,
    pub map_comment_style: CommentStyle,
    /// URL written into the trailing comment; defaults to the map file's base name
    pub map_url: Option<String>,
    /// Map file name; defaults to the output name minus `.js`, plus `.map`
    pub map_file: Option<String>,
    pub max_tracked_size: usize,
    pub cache: Option<EncoderCache>,
    pub files: Arc<dyn FileAccess>,
    pub sink: Arc<dyn WarningSink>,
}

impl SourceMapOptions {
    pub fn new(concat: ConcatOptions) -> Self {
        Self {
            concat,
            source_root: None,
            input_root: None,
            map_comment_style: CommentStyle::default(),
            map_url: None,
            map_file: None,
            max_tracked_size: 10 * 1024 * 1024,
            cache: None,
            files: Arc::new(FsAccess),
            sink: Arc::new(TracingSink),
        }
    }
}

/// `out/app.js` -> `out/app.map`; other extensions keep theirs.
pub fn default_map_file(output_name: &str) -> String {
    let stem = output_name.strip_suffix(".js").unwrap_or(output_name);
    format!("{stem}.map")
}

fn base_name(path: &str) -> String {
    Utf8Path::new(path)
        .file_name()
        .unwrap_or(path)
        .to_string()
}

/// Output text and its map, produced by one pass.
#[derive(Debug, Clone)]
pub struct Assembled {
    pub code: String,
    pub map: MasterMap,
}

impl Assembled {
    pub fn map_json(&self) -> String {
        self.map.to_json()
    }
}

pub struct PositionMapAssembler {
    store: OrderedEntryStore,
    concat: ConcatOptions,
    generator: GeneratorOptions,
    comment_style: CommentStyle,
    map_url: String,
    map_file: String,
}

impl PositionMapAssembler {
    pub fn new(options: SourceMapOptions) -> Result<Self, ConcatError> {
        let SourceMapOptions {
            concat,
            source_root,
            input_root,
            map_comment_style,
            map_url,
            map_file,
            max_tracked_size,
            cache,
            files,
            sink,
        } = options;

        concat.validate()?;
        if map_file.is_some() && map_url.is_none() {
            return Err(ConfigError::MapFileWithoutUrl.into());
        }

        let map_file = map_file.unwrap_or_else(|| default_map_file(&concat.output_name));
        let map_url = map_url.unwrap_or_else(|| base_name(&map_file));
        let store = OrderedEntryStore::new(concat.store_config())?;

        let generator = GeneratorOptions {
            file: base_name(&concat.output_name),
            source_root,
            input_root,
            files,
            sink,
            cache,
            max_tracked_size,
        };

        Ok(Self {
            store,
            concat,
            generator,
            comment_style: map_comment_style,
            map_url,
            map_file,
        })
    }

    pub fn store(&self) -> &OrderedEntryStore {
        &self.store
    }

    pub fn options(&self) -> &ConcatOptions {
        &self.concat
    }

    pub fn map_file(&self) -> &str {
        &self.map_file
    }

    pub fn map_url(&self) -> &str {
        &self.map_url
    }

    /// URL recorded for `id`, if its content carried a map comment.
    pub fn external_map(&self, id: &str) -> Option<&str> {
        self.store
            .get(id)
            .and_then(|e| e.external_map.as_deref())
    }

    pub fn add_file(&mut self, id: &str, content: impl Into<String>) -> Result<(), ConcatError> {
        let (content, url) = split_map_comment(content.into());
        self.store.insert(id, content, url)
    }

    /// A new comment replaces the recorded URL; no comment clears it.
    pub fn update_file(&mut self, id: &str, content: impl Into<String>) -> Result<(), ConcatError> {
        let (content, url) = split_map_comment(content.into());
        self.store.replace(id, content, url)
    }

    pub fn remove_file(&mut self, id: &str) -> Result<(), ConcatError> {
        self.store.remove_file(id)
    }

    fn ensure_live(&self) -> Result<(), ConcatError> {
        if self.store.state() == StoreState::Disposed {
            return Err(ConcatError::Disposed);
        }
        Ok(())
    }

    /// Literals only wrap actual content.
    fn layout<'a>(&'a self, entries: &'a [&'a Entry]) -> Layout<'a> {
        let literal = |text: &'a Option<String>| text.as_deref().filter(|_| !entries.is_empty());

        Layout {
            header: literal(&self.concat.header),
            entries,
            footer: literal(&self.concat.footer),
            separator: &self.concat.separator,
        }
    }

    fn generate(&self, layout: &Layout<'_>) -> Generated {
        MappingGenerator::new(&self.generator).generate(layout)
    }

    /// `Disposed`, or `EmptyResult` for an empty store that may not be empty.
    fn ensure_readable(&self) -> Result<(), ConcatError> {
        self.ensure_live()?;
        if self.store.is_empty() && !self.store.allow_empty() {
            return Err(ConcatError::EmptyResult);
        }
        Ok(())
    }

    /// Text and map from a single pass; each external map is resolved once.
    #[instrument(level = "debug", skip(self), fields(output = %self.concat.output_name))]
    pub fn finalize(&self) -> Result<Assembled, ConcatError> {
        self.ensure_readable()?;

        let entries = self.store.ordered_entries();
        let layout = self.layout(&entries);
        let Generated { map, padding } = self.generate(&layout);

        let mut code = if entries.is_empty() {
            String::new()
        } else {
            render(layout.header, &entries, &padding, layout.footer, layout.separator)
        };
        code.push_str(&self.comment_style.render(&self.map_url));

        debug!(entries = entries.len(), sources = map.sources.len(), "assembled with source map");

        Ok(Assembled { code, map })
    }

    /// Concatenated text followed by the map reference comment.
    pub fn result(&self) -> Result<String, ConcatError> {
        self.finalize().map(|a| a.code)
    }

    /// The map as JSON.
    pub fn result_position_map(&self) -> Result<String, ConcatError> {
        self.ensure_readable()?;

        let entries = self.store.ordered_entries();
        let layout = self.layout(&entries);
        Ok(self.generate(&layout).map.to_json())
    }

    pub fn dispose(&mut self) {
        self.store.dispose();
    }
}

/// An empty URL is stripped like any other but records no reference.
fn split_map_comment(content: String) -> (String, Option<String>) {
    match map_comment::extract(&content) {
        Some((stripped, url)) => (stripped, Some(url).filter(|u| !u.is_empty())),
        None => (content, None),
    }
}
