//! Position map generation for concatenated output.
//!
//! A [`MappingGenerator`] walks the output sections in order (header literal,
//! file entries, footer literal) and produces one mapping fragment per
//! section while tracking where the next byte of output will land
//! (generated line and column).
//!
//! Files without an upstream map use the identity shortcut: one anchored
//! segment at original line 0, column 0, then one `AACA` segment per further
//! line. Files that reference an upstream map get it assimilated: its
//! sources and names are appended to the master arrays and its mapping stream
//! is re-encoded against the master encoder state.

use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64_STD;
use camino::{Utf8Path, Utf8PathBuf};
use moka::sync::Cache;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use xxhash_rust::xxh64::Xxh64;

use crate::core::entry::Entry;
use crate::core::error::{ExternalMapError, ExternalMapWarning, TracingSink, WarningSink};
use crate::core::vlq::{Coder, Segment, VlqError};
use crate::infra::io::{FileAccess, FsAccess, normalize};
use crate::infra::line_index::{LineStats, ensure_posix_eol};

/// Segment for "next generated line maps to the next original line, column 0".
const LINE_ADVANCE: &str = "AACA";

static INLINE_MAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^data:.+?;base64,").expect("inline map pattern is valid"));

/// Version 3 source map document, in the field order it is serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MasterMap {
    pub version: u8,
    pub sources: Vec<String>,
    #[serde(rename = "sourcesContent")]
    pub sources_content: Vec<Option<String>>,
    pub names: Vec<String>,
    pub mappings: String,
    #[serde(rename = "sourceRoot", skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
    pub file: String,
}

impl MasterMap {
    pub fn new(file: impl Into<String>, source_root: Option<String>) -> Self {
        Self {
            version: 3,
            sources: Vec::new(),
            sources_content: Vec::new(),
            names: Vec::new(),
            mappings: String::new(),
            source_root,
            file: file.into(),
        }
    }

    pub fn to_json(&self) -> String {
        // Plain strings and vectors only; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Upstream map as read from disk or an inline payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedMap {
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub sources_content: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub mappings: String,
}

/// Upstream map with every source's content available.
#[derive(Debug, Clone)]
struct ResolvedMap {
    sources: Vec<String>,
    sources_content: Vec<Option<String>>,
    names: Vec<String>,
    mappings: String,
}

/// Encoder state after a completed merge, replayed on a later identical merge.
#[derive(Debug, Clone)]
pub struct CacheHint {
    /// Generated lines the merged stream spans
    pub lines: usize,
    pub encoder: Coder,
    pub line_has_segment: bool,
}

/// Shared, content-addressed memo of merge end states.
///
/// Keys fingerprint the upstream mapping text together with the generator
/// state the merge starts from, so a hit is exact. Safe to share between
/// concatenation units; hints are inserted only after a merge completes.
#[derive(Clone)]
pub struct EncoderCache {
    inner: Cache<u64, CacheHint>,
}

impl EncoderCache {
    pub fn new(max_capacity: u64) -> Self {
        Self { inner: Cache::new(max_capacity) }
    }

    pub fn get(&self, key: u64) -> Option<CacheHint> {
        self.inner.get(&key)
    }

    pub fn insert(&self, key: u64, hint: CacheHint) {
        self.inner.insert(key, hint);
    }

    /// Number of stored hints, after flushing pending maintenance.
    pub fn len(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EncoderCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl std::fmt::Debug for EncoderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncoderCache")
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

/// Collaborators and settings shared by every generation pass.
#[derive(Clone)]
pub struct GeneratorOptions {
    /// Value of the map's `file` field
    pub file: String,
    pub source_root: Option<String>,
    /// Root that entry identifiers and absolute map URLs are relative to
    pub input_root: Option<Utf8PathBuf>,
    pub files: Arc<dyn FileAccess>,
    pub sink: Arc<dyn WarningSink>,
    pub cache: Option<EncoderCache>,
    /// Upstream mapping streams longer than this are never memoized
    pub max_tracked_size: usize,
}

impl GeneratorOptions {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            source_root: None,
            input_root: None,
            files: Arc::new(FsAccess),
            sink: Arc::new(TracingSink),
            cache: None,
            max_tracked_size: 10 * 1024 * 1024,
        }
    }
}

/// Output sections of one pass.
#[derive(Debug, Clone, Copy)]
pub struct Layout<'a> {
    pub header: Option<&'a str>,
    pub entries: &'a [&'a Entry],
    pub footer: Option<&'a str>,
    pub separator: &'a str,
}

/// Result of one pass: the map and, per entry, how many `\n` to append to its
/// rendered content so output and map stay in lockstep.
#[derive(Debug, Clone)]
pub struct Generated {
    pub map: MasterMap,
    pub padding: Vec<usize>,
}

/// State saved before an assimilation so a malformed stream can be undone.
struct Checkpoint {
    column: usize,
    lines_mapped: usize,
    line_has_segment: bool,
    encoder: Coder,
    sources: usize,
    names: usize,
    fragment: usize,
}

pub struct MappingGenerator<'a> {
    opts: &'a GeneratorOptions,
    map: MasterMap,
    /// Generated column where the next output byte lands (UTF-16 units)
    column: usize,
    lines_mapped: usize,
    /// Whether the current generated line already holds a segment
    line_has_segment: bool,
    encoder: Coder,
}

impl<'a> MappingGenerator<'a> {
    pub fn new(opts: &'a GeneratorOptions) -> Self {
        Self {
            opts,
            map: MasterMap::new(opts.file.clone(), opts.source_root.clone()),
            column: 0,
            lines_mapped: 0,
            line_has_segment: false,
            encoder: Coder::new(),
        }
    }

    /// Produce the map for `layout`. Consumes the generator; every pass
    /// starts from a blank state.
    pub fn generate(mut self, layout: &Layout<'_>) -> Generated {
        let newline_joined = layout.separator == "\n";
        let mut fragments: Vec<String> = Vec::with_capacity(layout.entries.len() + 2);
        let mut padding = vec![0; layout.entries.len()];
        let mut first = true;

        if let Some(header) = layout.header.filter(|h| !h.is_empty()) {
            let mut fragment = self.begin_section(&mut first, layout.separator, newline_joined);
            self.add_space(header, &mut fragment);
            fragments.push(fragment);
        }

        for (slot, entry) in padding.iter_mut().zip(layout.entries) {
            let mut fragment = self.begin_section(&mut first, layout.separator, newline_joined);
            *slot = self.add_entry(entry, &mut fragment);
            fragments.push(fragment);
        }

        if let Some(footer) = layout.footer.filter(|f| !f.is_empty()) {
            let mut fragment = self.begin_section(&mut first, layout.separator, newline_joined);
            self.add_space(footer, &mut fragment);
            // The hard trailing newline only gets a mapping line when joins are newlines.
            if newline_joined {
                self.add_space("\n", &mut fragment);
            }
            fragments.push(fragment);
        }

        // With a bare newline separator each join point is one generated line.
        self.map.mappings = fragments.join(if newline_joined { ";" } else { "" });

        Generated { map: self.map, padding }
    }

    fn begin_section(&mut self, first: &mut bool, separator: &str, newline_joined: bool) -> String {
        let mut fragment = String::new();
        if std::mem::replace(first, false) {
            return fragment;
        }

        if newline_joined {
            self.advance_line();
        } else {
            self.add_space(separator, &mut fragment);
        }
        fragment
    }

    /// Move to the start of the next generated line; the caller emits the `;`.
    fn advance_line(&mut self) {
        self.lines_mapped += 1;
        self.column = 0;
        self.line_has_segment = false;
        self.encoder.reset_column();
    }

    /// Unmapped text: terminators become empty mapping lines.
    fn add_space(&mut self, text: &str, fragment: &mut String) {
        let stats = LineStats::of(text);

        if stats.newlines == 0 {
            self.column += stats.tail_width;
            return;
        }

        for _ in 0..stats.newlines {
            fragment.push(';');
            self.advance_line();
        }
        self.column = stats.tail_width;
    }

    fn push_segment(&mut self, segment: &Segment, fragment: &mut String) {
        if self.line_has_segment {
            fragment.push(',');
        }
        self.encoder.encode_into(segment, fragment);
        self.line_has_segment = true;
    }

    /// Map one entry; returns the number of `\n` its rendered content needs.
    fn add_entry(&mut self, entry: &Entry, fragment: &mut String) -> usize {
        if entry.content.is_empty() {
            return 0;
        }

        if let Some(url) = &entry.external_map {
            let outcome = self
                .resolve_external(entry, url)
                .and_then(|external| self.assimilate(entry, &external, fragment).map_err(Into::into));

            match outcome {
                Ok(padding) => return padding,
                Err(error) => self.opts.sink.warn(ExternalMapWarning {
                    entry: entry.id.clone(),
                    url: url.clone(),
                    error,
                }),
            }
        }

        self.encode_entry(entry, fragment);
        0
    }

    /// Identity shortcut for a verbatim whole-file copy.
    fn encode_entry(&mut self, entry: &Entry, fragment: &mut String) {
        let source = self.map.sources.len() as i64;
        self.map.sources.push(entry.id.clone());
        self.map.sources_content.push(Some(entry.content.clone()));

        let stats = LineStats::of(&entry.content);
        self.push_segment(&Segment::anchored(self.column as i64, source), fragment);

        if stats.newlines == 0 {
            // No newline: keep extending the current generated line.
            self.column += stats.tail_width;
            return;
        }

        fragment.push(';');
        for _ in 1..stats.newlines {
            fragment.push_str(LINE_ADVANCE);
            fragment.push(';');
        }
        self.encoder.reset_column();
        self.encoder.adjust_line(stats.newlines as i64 - 1);
        self.lines_mapped += stats.newlines;
        self.line_has_segment = false;
        self.column = stats.tail_width;

        // An unterminated last line still maps to its original line.
        if stats.tail_width > 0 {
            fragment.push_str(LINE_ADVANCE);
            self.encoder.adjust_line(1);
            self.line_has_segment = true;
        }
    }

    fn checkpoint(&self, fragment: &str) -> Checkpoint {
        Checkpoint {
            column: self.column,
            lines_mapped: self.lines_mapped,
            line_has_segment: self.line_has_segment,
            encoder: self.encoder.clone(),
            sources: self.map.sources.len(),
            names: self.map.names.len(),
            fragment: fragment.len(),
        }
    }

    fn rollback(&mut self, cp: Checkpoint, fragment: &mut String) {
        self.column = cp.column;
        self.lines_mapped = cp.lines_mapped;
        self.line_has_segment = cp.line_has_segment;
        self.encoder = cp.encoder;
        self.map.sources.truncate(cp.sources);
        self.map.sources_content.truncate(cp.sources);
        self.map.names.truncate(cp.names);
        fragment.truncate(cp.fragment);
    }

    /// Merge an upstream map for `entry`. Returns trailing-newline padding.
    fn assimilate(
        &mut self,
        entry: &Entry,
        external: &ResolvedMap,
        fragment: &mut String,
    ) -> Result<usize, VlqError> {
        let cp = self.checkpoint(fragment);
        let initial_lines = self.lines_mapped;
        let start_column = self.column;
        let stats = LineStats::of(&entry.content);

        let sources_offset = self.map.sources.len() as i64;
        let names_offset = self.map.names.len() as i64;

        self.map.sources.extend(self.relativize_sources(&external.sources));
        // Keep sourcesContent exactly as long as sources.
        let mut content = external.sources_content.clone();
        content.resize(external.sources.len(), None);
        self.map.sources_content.extend(content);
        self.map.names.extend(external.names.iter().cloned());

        if let Err(e) = self.merge_mappings(&external.mappings, sources_offset, names_offset, fragment) {
            self.rollback(cp, fragment);
            return Err(e);
        }

        // Upstream map too short for its code: pad with empty lines.
        while self.lines_mapped - initial_lines < stats.newlines {
            fragment.push(';');
            self.advance_line();
        }

        // Upstream map too long: the rendered content grows instead.
        let padding = (self.lines_mapped - initial_lines) - stats.newlines;

        self.column = if padding > 0 {
            0
        } else if self.lines_mapped > initial_lines {
            stats.tail_width
        } else {
            start_column + stats.tail_width
        };

        debug!(
            entry = %entry.id,
            sources = external.sources.len(),
            lines = self.lines_mapped - initial_lines,
            padding,
            "assimilated upstream source map"
        );

        Ok(padding)
    }

    fn fingerprint(&self, mappings: &str, sources_offset: i64, names_offset: i64) -> u64 {
        let mut hasher = Xxh64::new(0);
        hasher.update(mappings.as_bytes());
        sources_offset.hash(&mut hasher);
        names_offset.hash(&mut hasher);
        self.column.hash(&mut hasher);
        self.line_has_segment.hash(&mut hasher);
        self.encoder.hash(&mut hasher);
        hasher.digest()
    }

    /// Re-encode an upstream mapping stream onto the master stream.
    ///
    /// Offsets are added the first time a segment references the field and
    /// baked into the decoder, after which decoder and encoder agree on every
    /// relative field and runs of `AACA;` can be copied verbatim. With a cache
    /// hint the rest of the stream is copied as soon as the offsets are applied.
    fn merge_mappings(
        &mut self,
        input: &str,
        mut sources_offset: i64,
        mut names_offset: i64,
        fragment: &mut String,
    ) -> Result<(), VlqError> {
        let opts = self.opts;
        let cache = opts
            .cache
            .as_ref()
            .filter(|_| input.len() <= opts.max_tracked_size);
        let key = cache.map(|_| self.fingerprint(input, sources_offset, names_offset));
        let hint = cache.zip(key).and_then(|(c, k)| c.get(k));

        let mut decoder = Coder::new();
        let initial_lines = self.lines_mapped;
        let line_offset = self.column as i64;
        let mut on_first_line = true;
        let mut rest = input;

        while !rest.is_empty() {
            // Separators ahead of the next segment; we emit our own commas.
            let sep_len = rest
                .find(|c: char| c != ';' && c != ',')
                .unwrap_or(rest.len());
            let breaks = rest[..sep_len]
                .bytes()
                .filter(|&b| b == b';')
                .count();
            for _ in 0..breaks {
                fragment.push(';');
                self.advance_line();
            }
            if breaks > 0 {
                decoder.reset_column();
                on_first_line = false;
            }
            rest = &rest[sep_len..];

            let seg_len = rest.find([';', ',']).unwrap_or(rest.len());
            if seg_len > 0 {
                let mut segment = decoder.decode(&rest[..seg_len])?;
                if on_first_line {
                    segment.generated_column += line_offset;
                }
                if let Some(original) = segment.original.as_mut() {
                    if sources_offset != 0 {
                        original.source += sources_offset;
                        decoder.prev_source += sources_offset;
                        sources_offset = 0;
                    }
                    if names_offset != 0
                        && let Some(name) = original.name.as_mut()
                    {
                        *name += names_offset;
                        decoder.prev_name += names_offset;
                        names_offset = 0;
                    }
                }
                self.push_segment(&segment, fragment);
            }
            rest = &rest[seg_len..];

            if sources_offset != 0 || names_offset != 0 || rest.is_empty() {
                continue;
            }

            if let Some(hint) = &hint {
                // Nothing left needs rewriting: copy and jump to the end state.
                fragment.push_str(rest);
                self.lines_mapped = initial_lines + hint.lines;
                self.encoder = hint.encoder.clone();
                self.line_has_segment = hint.line_has_segment;
                self.column = 0;
                return Ok(());
            }

            if let Some((breaks, runs)) = line_advance_run(rest) {
                let len = breaks + runs * (LINE_ADVANCE.len() + 1);
                fragment.push_str(&rest[..len]);
                self.lines_mapped += breaks + runs;
                self.line_has_segment = false;
                self.encoder.adjust_line(runs as i64);
                self.encoder.reset_column();
                decoder.adjust_line(runs as i64);
                decoder.reset_column();
                on_first_line = false;
                rest = &rest[len..];
            }
        }

        if let (Some(cache), Some(key)) = (cache, key) {
            cache.insert(
                key,
                CacheHint {
                    lines: self.lines_mapped - initial_lines,
                    encoder: self.encoder.clone(),
                    line_has_segment: self.line_has_segment,
                },
            );
        }

        Ok(())
    }

    fn relativize_sources(&self, sources: &[String]) -> Vec<String> {
        let Some(root) = &self.opts.input_root else {
            return sources.to_vec();
        };

        sources
            .iter()
            .map(|s| match Utf8Path::new(s).strip_prefix(root) {
                Ok(rel) => rel.to_string(),
                Err(_) => s.clone(),
            })
            .collect()
    }

    /// Location of an entry on disk, for resolving paths relative to it.
    fn entry_path(&self, id: &str) -> Utf8PathBuf {
        match &self.opts.input_root {
            Some(root) if !id.starts_with('/') => root.join(id),
            _ => Utf8PathBuf::from(id),
        }
    }

    fn entry_dir(&self, id: &str) -> Utf8PathBuf {
        self.entry_path(id)
            .parent()
            .map(Utf8Path::to_path_buf)
            .unwrap_or_default()
    }

    fn read(&self, path: &Utf8Path) -> Result<String, ExternalMapError> {
        let path = normalize(path);
        self.opts
            .files
            .read_to_string(&path)
            .map_err(|source| ExternalMapError::Read { path: path.to_string(), source })
    }

    /// Decode or read the upstream map and every source it needs.
    fn resolve_external(&self, entry: &Entry, url: &str) -> Result<ResolvedMap, ExternalMapError> {
        let text = if let Some(m) = INLINE_MAP.find(url) {
            String::from_utf8(B64_STD.decode(&url[m.end()..])?)?
        } else {
            let path = match &self.opts.input_root {
                Some(root) if url.starts_with('/') => root.join(url.trim_start_matches('/')),
                _ => self.entry_dir(&entry.id).join(url),
            };
            self.read(&path)?
        };

        let parsed: ParsedMap = serde_json::from_str(&text)?;

        let sources_content = match parsed.sources_content {
            Some(content) => content,
            None => {
                // Look for original sources relative to the entry's own location.
                let dir = self.entry_dir(&entry.id);
                parsed
                    .sources
                    .iter()
                    .map(|source| {
                        let path = if Utf8Path::new(source).is_absolute() {
                            Utf8PathBuf::from(source)
                        } else {
                            dir.join(source)
                        };
                        self.read(&path)
                            .map(|text| Some(ensure_posix_eol(&text).into_owned()))
                    })
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(ResolvedMap {
            sources: parsed.sources,
            sources_content,
            names: parsed.names,
            mappings: parsed.mappings,
        })
    }
}

/// `;`-run followed by one or more `AACA;` at the head of `rest`.
fn line_advance_run(rest: &str) -> Option<(usize, usize)> {
    let breaks = rest
        .bytes()
        .take_while(|&b| b == b';')
        .count();
    if breaks == 0 {
        return None;
    }

    let mut runs = 0;
    let mut tail = &rest[breaks..];
    while let Some(t) = tail
        .strip_prefix(LINE_ADVANCE)
        .and_then(|t| t.strip_prefix(';'))
    {
        runs += 1;
        tail = t;
    }

    (runs > 0).then_some((breaks, runs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entry::Zone;
    use crate::core::error::CollectingSink;
    use crate::infra::io::MemoryAccess;

    fn entry(id: &str, content: &str) -> Entry {
        Entry::new(id, content, Zone::Body)
    }

    fn mapped(id: &str, content: &str, url: &str) -> Entry {
        let mut e = entry(id, content);
        e.external_map = Some(url.to_string());
        e
    }

    fn run(opts: &GeneratorOptions, entries: &[Entry], separator: &str) -> Generated {
        let refs: Vec<&Entry> = entries.iter().collect();
        MappingGenerator::new(opts).generate(&Layout {
            header: None,
            entries: &refs,
            footer: None,
            separator,
        })
    }

    fn opts_with(files: MemoryAccess, sink: Arc<CollectingSink>) -> GeneratorOptions {
        GeneratorOptions {
            files: Arc::new(files),
            sink,
            ..GeneratorOptions::new("out.js")
        }
    }

    #[test]
    fn single_line_entries_share_one_generated_line() {
        let opts = GeneratorOptions::new("out.js");
        let entries = [entry("a.js", "//a"), entry("a/a.js", "//a/a"), entry("b.js", "//b")];

        let out = run(&opts, &entries, "");

        assert_eq!(out.map.mappings, "AAAA,GCAA,KCAA");
        assert_eq!(out.map.sources, ["a.js", "a/a.js", "b.js"]);
    }

    #[test]
    fn newline_separator_starts_each_entry_on_a_new_line() {
        let opts = GeneratorOptions::new("out.js");
        let entries = [entry("a.js", "//a"), entry("b.js", "//b")];

        assert_eq!(run(&opts, &entries, "\n").map.mappings, "AAAA;ACAA");
    }

    #[test]
    fn multi_line_entry_uses_line_advance_segments() {
        let opts = GeneratorOptions::new("out.js");
        let entries = [entry("a.js", "a\nb\nc\n"), entry("b.js", "x")];

        // Three lines of a.js, then b.js starts at column 0 of line 3.
        assert_eq!(run(&opts, &entries, "").map.mappings, "AAAA;AACA;AACA;ACFA");
    }

    #[test]
    fn unterminated_last_line_is_mapped_and_advances_column() {
        let opts = GeneratorOptions::new("out.js");
        let entries = [entry("a.js", "a\nbc"), entry("b.js", "x")];

        assert_eq!(run(&opts, &entries, "").map.mappings, "AAAA;AACA,ECDA");
    }

    #[test]
    fn empty_entries_contribute_nothing() {
        let opts = GeneratorOptions::new("out.js");
        let out = run(&opts, &[entry("foo.js", "")], "\n");

        assert!(out.map.sources.is_empty());
        assert_eq!(out.map.mappings, "");
    }

    #[test]
    fn inline_map_is_assimilated_with_offsets() {
        let upstream = r#"{"version":3,"sources":["src/x.ts"],"sourcesContent":["let x"],"names":["x"],"mappings":"AAAAA;AACA"}"#;
        let url = format!("data:application/json;base64,{}", B64_STD.encode(upstream));
        let sink = Arc::new(CollectingSink::new());
        let opts = opts_with(MemoryAccess::new(), sink.clone());

        let entries = [entry("a.js", "//a\n"), mapped("x.js", "var x\ny", &url)];
        let out = run(&opts, &entries, "");

        assert!(sink.is_empty());
        assert_eq!(out.map.sources, ["a.js", "src/x.ts"]);
        assert_eq!(out.map.sources_content, [Some("//a\n".into()), Some("let x".into())]);
        assert_eq!(out.map.names, ["x"]);
        // a.js on line 0; upstream line 0 lands on line 1 with source +1, name 0.
        assert_eq!(out.map.mappings, "AAAA;ACAAA;AACA");
        assert_eq!(out.padding, [0, 0]);
    }

    #[test]
    fn second_upstream_name_offset_is_applied_once() {
        let first = r#"{"sources":["one.ts"],"sourcesContent":["1"],"names":["a"],"mappings":"AAAAA"}"#;
        let second = r#"{"sources":["two.ts"],"sourcesContent":["2"],"names":["b","c"],"mappings":"AAAAA,EAAAC"}"#;
        let files = MemoryAccess::new()
            .with_file("one.js.map", first)
            .with_file("two.js.map", second);
        let opts = opts_with(files, Arc::new(CollectingSink::new()));

        let entries = [mapped("one.js", "1", "one.js.map"), mapped("two.js", "2", "two.js.map")];
        let out = run(&opts, &entries, "");

        assert_eq!(out.map.names, ["a", "b", "c"]);
        // two.js starts at column 1: source +1, name +1 then +1 relative.
        assert_eq!(out.map.mappings, "AAAAA,CCAAC,EAAAC");
    }

    #[test]
    fn short_upstream_map_is_padded_with_empty_lines() {
        let upstream = r#"{"sources":["s.coffee"],"sourcesContent":["s"],"names":[],"mappings":"AAAA"}"#;
        let files = MemoryAccess::new().with_file("lib/s.js.map", upstream);
        let opts = opts_with(files, Arc::new(CollectingSink::new()));

        let entries = [mapped("lib/s.js", "a\nb\nc\n", "s.js.map"), entry("z.js", "z")];
        let out = run(&opts, &entries, "");

        assert_eq!(out.map.mappings, "AAAA;;;ACAA");
        assert_eq!(out.padding, [0, 0]);
    }

    #[test]
    fn long_upstream_map_grows_rendered_content() {
        let upstream = r#"{"sources":["s.ts"],"sourcesContent":["s"],"names":[],"mappings":"AAAA;AACA;AACA;"}"#;
        let files = MemoryAccess::new().with_file("s.js.map", upstream);
        let opts = opts_with(files, Arc::new(CollectingSink::new()));

        let out = run(&opts, &[mapped("s.js", "a\n", "s.js.map")], "");

        assert_eq!(out.padding, [2]);
    }

    #[test]
    fn absolute_map_url_resolves_from_input_root() {
        let upstream = r#"{"sources":["/work/in/src/a.ts"],"names":[],"mappings":"AAAA"}"#;
        let files = MemoryAccess::new()
            .with_file("/work/in/maps/a.map", upstream)
            .with_file("/work/in/src/a.ts", "a\r\nb");
        let opts = GeneratorOptions {
            input_root: Some(Utf8PathBuf::from("/work/in")),
            ..opts_with(files, Arc::new(CollectingSink::new()))
        };

        let out = run(&opts, &[mapped("lib/a.js", "a", "/maps/a.map")], "");

        // Absolute sources are read as-is and then made relative to the root.
        assert_eq!(out.map.sources, ["src/a.ts"]);
        assert_eq!(out.map.sources_content, [Some("a\nb".to_string())]);
    }

    #[test]
    fn missing_sources_content_is_read_next_to_the_entry() {
        let upstream = r#"{"sources":["a.ts"],"names":[],"mappings":"AAAA"}"#;
        let files = MemoryAccess::new()
            .with_file("/in/lib/a.map", upstream)
            .with_file("/in/lib/a.ts", "a\r\nb");
        let opts = GeneratorOptions {
            input_root: Some(Utf8PathBuf::from("/in")),
            ..opts_with(files, Arc::new(CollectingSink::new()))
        };

        let out = run(&opts, &[mapped("lib/a.js", "a", "a.map")], "");

        assert_eq!(out.map.sources_content, [Some("a\nb".to_string())]);
    }

    #[test]
    fn unresolvable_map_warns_once_and_falls_back() {
        let sink = Arc::new(CollectingSink::new());
        let opts = opts_with(MemoryAccess::new(), sink.clone());

        let out = run(&opts, &[mapped("a.js", "//a", "missing.map")], "");

        assert_eq!(sink.len(), 1);
        assert_eq!(out.map.sources, ["a.js"]);
        assert_eq!(out.map.sources_content, [Some("//a".to_string())]);
        assert_eq!(out.map.mappings, "AAAA");
    }

    #[test]
    fn malformed_mappings_roll_back_partial_assimilation() {
        let upstream = r#"{"sources":["x.ts","y.ts"],"sourcesContent":["x","y"],"names":["n"],"mappings":"AAAA;AA!A"}"#;
        let files = MemoryAccess::new().with_file("x.js.map", upstream);
        let sink = Arc::new(CollectingSink::new());
        let opts = opts_with(files, sink.clone());

        let out = run(&opts, &[mapped("x.js", "x\ny", "x.js.map")], "");

        assert_eq!(sink.len(), 1);
        assert_eq!(out.map.sources, ["x.js"]);
        assert!(out.map.names.is_empty());
        assert_eq!(out.map.mappings, "AAAA;AACA");
    }

    #[test]
    fn cache_hint_reproduces_the_uncached_stream() {
        let upstream = r#"{"sources":["u.ts"],"sourcesContent":["u"],"names":["q"],"mappings":"AAAAA;AACA;AACA;EAAEC,CAAC;AACA"}"#;
        let files = MemoryAccess::new().with_file("u.js.map", upstream);
        let entries = [entry("a.js", "//a\n"), mapped("u.js", "1\n2\n3\n4\n5", "u.js.map")];

        let plain = run(&opts_with(files.clone(), Arc::new(CollectingSink::new())), &entries, "\n");

        let cache = EncoderCache::new(16);
        let cached_opts = GeneratorOptions {
            cache: Some(cache.clone()),
            ..opts_with(files, Arc::new(CollectingSink::new()))
        };
        let cold = run(&cached_opts, &entries, "\n");
        assert_eq!(cache.len(), 1);
        let warm = run(&cached_opts, &entries, "\n");

        assert_eq!(cold.map, plain.map);
        assert_eq!(warm.map, plain.map);
    }

    #[test]
    fn header_and_footer_literals_are_unmapped_lines() {
        let opts = GeneratorOptions::new("out.js");
        let entries = [entry("a.js", "//a")];
        let refs: Vec<&Entry> = entries.iter().collect();

        let out = MappingGenerator::new(&opts).generate(&Layout {
            header: Some("\n//the best\n\n"),
            entries: &refs,
            footer: Some("\n//around\n"),
            separator: "\n",
        });

        // 3 header terminators + 1 join, entry, 1 join + 2 footer + trailing.
        assert_eq!(out.map.mappings, ";;;;AAAA;;;;");
    }

    #[test]
    fn footer_counts_only_its_own_terminators_without_newline_joins() {
        let opts = GeneratorOptions::new("out.js");
        let entries = [entry("a.js", "//a")];
        let refs: Vec<&Entry> = entries.iter().collect();

        let generate = |footer: &str| {
            MappingGenerator::new(&opts)
                .generate(&Layout { header: None, entries: &refs, footer: Some(footer), separator: "" })
                .map
                .mappings
        };

        assert_eq!(generate("//end"), "AAAA");
        assert_eq!(generate("//end\n//more"), "AAAA;");
    }

    #[test]
    fn header_literal_without_newline_shifts_first_column() {
        let opts = GeneratorOptions::new("out.js");
        let entries = [entry("a.js", "//a")];
        let refs: Vec<&Entry> = entries.iter().collect();

        let out = MappingGenerator::new(&opts).generate(&Layout {
            header: Some("should be first"),
            entries: &refs,
            footer: None,
            separator: "",
        });

        assert_eq!(out.map.mappings, "eAAA");
    }

    #[test]
    fn map_serializes_in_document_field_order() {
        let map = MasterMap::new("output.js", None);
        assert_eq!(
            map.to_json(),
            r#"{"version":3,"sources":[],"sourcesContent":[],"names":[],"mappings":"","file":"output.js"}"#
        );

        let rooted = MasterMap::new("output.js", Some("/foo".into()));
        assert!(rooted.to_json().contains(r#""mappings":"","sourceRoot":"/foo","file":"output.js""#));
    }
}
