//! Incremental ordered-entry store.
//!
//! The store keeps entries in an `IndexMap` keyed by identifier and computes
//! the output order on every read: configured header files, then the body
//! sorted by [`BodyOrder`], then configured footer files. Nothing about the
//! order depends on insertion history, so a partial rebuild that removes and
//! re-adds a file lands it back in the same slot.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use globset::{Glob, GlobMatcher};
use indexmap::{IndexMap, IndexSet};

use crate::core::entry::{Entry, Zone};
use crate::core::error::{ConcatError, ConfigError, PatchOp};

/// Characters that make an identifier a glob rather than a path.
const GLOB_META: &[char] = &['*', '?', '[', ']', '{', '}'];

/// Caller-supplied body comparator.
pub type BodyComparator = Arc<dyn Fn(&str, &str) -> Ordering + Send + Sync>;

/// Ordering policy for the body zone.
#[derive(Clone, Default)]
pub enum BodyOrder {
    /// Byte-wise lexicographic by identifier
    #[default]
    Lexicographic,

    /// Rank by the first matching pattern; unmatched identifiers go last
    Patterns(PatternOrder),

    Custom(BodyComparator),
}

impl BodyOrder {
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        match self {
            BodyOrder::Lexicographic => a.cmp(b),
            BodyOrder::Patterns(p) => p.compare(a, b),
            BodyOrder::Custom(f) => f(a, b),
        }
    }
}

impl fmt::Debug for BodyOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyOrder::Lexicographic => f.write_str("Lexicographic"),
            BodyOrder::Patterns(p) => f.debug_tuple("Patterns").field(&p.patterns).finish(),
            BodyOrder::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Ordered glob list used to group body files, e.g. `["**/first*", "**/second*"]`.
#[derive(Clone)]
pub struct PatternOrder {
    patterns: Vec<String>,
    matchers: Vec<GlobMatcher>,
}

impl PatternOrder {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigError> {
        let mut matchers = Vec::with_capacity(patterns.len());

        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = Glob::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
            matchers.push(glob.compile_matcher());
        }

        Ok(Self {
            patterns: patterns.iter().map(|p| p.as_ref().to_string()).collect(),
            matchers,
        })
    }

    fn rank(&self, id: &str) -> usize {
        self.matchers
            .iter()
            .position(|m| m.is_match(id))
            .unwrap_or(self.matchers.len())
    }

    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        self.rank(a)
            .cmp(&self.rank(b))
            .then_with(|| a.cmp(b))
    }
}

/// Static configuration captured when a store is created.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    pub header_files: Vec<String>,
    pub footer_files: Vec<String>,
    pub body_order: BodyOrder,
    pub allow_empty: bool,
}

/// Lifecycle of one store instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Empty,
    Populated,
    Disposed,
}

#[derive(Debug)]
pub struct OrderedEntryStore {
    entries: IndexMap<String, Entry>,
    header_files: IndexSet<String>,
    footer_files: IndexSet<String>,
    body_order: BodyOrder,
    allow_empty: bool,
    state: StoreState,
}

/// Reject header/footer lists that contain glob patterns.
fn ensure_no_glob(field: &'static str, ids: &[String]) -> Result<(), ConfigError> {
    match ids.iter().find(|id| id.contains(GLOB_META)) {
        Some(pattern) => Err(ConfigError::GlobInFileList { field, pattern: pattern.clone() }),
        None => Ok(()),
    }
}

impl OrderedEntryStore {
    pub fn new(config: StoreConfig) -> Result<Self, ConcatError> {
        ensure_no_glob("headerFiles", &config.header_files)?;
        ensure_no_glob("footerFiles", &config.footer_files)?;

        Ok(Self {
            entries: IndexMap::new(),
            header_files: config.header_files.into_iter().collect(),
            footer_files: config.footer_files.into_iter().collect(),
            body_order: config.body_order,
            allow_empty: config.allow_empty,
            state: StoreState::Empty,
        })
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    pub fn allow_empty(&self) -> bool {
        self.allow_empty
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Entry> {
        self.entries.get(id)
    }

    /// Zone an identifier would be placed in. Header wins over footer.
    pub fn classify(&self, id: &str) -> Zone {
        if self.header_files.contains(id) {
            Zone::HeaderFile
        } else if self.footer_files.contains(id) {
            Zone::FooterFile
        } else {
            Zone::Body
        }
    }

    /// True if `id` is listed as a header or footer file.
    pub fn is_configured(&self, id: &str) -> bool {
        self.header_files.contains(id) || self.footer_files.contains(id)
    }

    fn ensure_live(&self) -> Result<(), ConcatError> {
        if self.state == StoreState::Disposed {
            return Err(ConcatError::Disposed);
        }
        Ok(())
    }

    pub fn add_file(&mut self, id: &str, content: impl Into<String>) -> Result<(), ConcatError> {
        self.insert(id, content.into(), None)
    }

    pub fn update_file(&mut self, id: &str, content: impl Into<String>) -> Result<(), ConcatError> {
        self.replace(id, content.into(), None)
    }

    pub fn remove_file(&mut self, id: &str) -> Result<(), ConcatError> {
        self.ensure_live()?;

        // shift_remove keeps the remaining insertion order intact for Debug output
        self.entries
            .shift_remove(id)
            .map(|_| ())
            .ok_or_else(|| ConcatError::UnknownEntry { id: id.to_string(), op: PatchOp::Remove })
    }

    pub(crate) fn insert(
        &mut self,
        id: &str,
        content: String,
        external_map: Option<String>,
    ) -> Result<(), ConcatError> {
        self.ensure_live()?;

        if self.entries.contains_key(id) {
            return Err(ConcatError::DuplicateEntry { id: id.to_string() });
        }

        let mut entry = Entry::new(id, content, self.classify(id));
        entry.external_map = external_map;
        self.entries.insert(id.to_string(), entry);
        self.state = StoreState::Populated;

        Ok(())
    }

    pub(crate) fn replace(
        &mut self,
        id: &str,
        content: String,
        external_map: Option<String>,
    ) -> Result<(), ConcatError> {
        self.ensure_live()?;

        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| ConcatError::UnknownEntry { id: id.to_string(), op: PatchOp::Update })?;

        entry.content = content;
        entry.external_map = external_map;

        Ok(())
    }

    /// Header files (configured order), sorted body, footer files (configured order).
    pub fn ordered_entries(&self) -> Vec<&Entry> {
        let mut out = Vec::with_capacity(self.entries.len());

        out.extend(
            self.header_files
                .iter()
                .filter_map(|id| self.entries.get(id))
                .filter(|e| e.zone == Zone::HeaderFile),
        );

        let mut body: Vec<&Entry> = self
            .entries
            .values()
            .filter(|e| e.zone == Zone::Body)
            .collect();
        // sort_by is stable
        body.sort_by(|a, b| self.body_order.compare(&a.id, &b.id));
        out.extend(body);

        out.extend(
            self.footer_files
                .iter()
                .filter_map(|id| self.entries.get(id))
                .filter(|e| e.zone == Zone::FooterFile),
        );

        out
    }

    /// Drop all entries; every later operation fails with `Disposed`.
    pub fn dispose(&mut self) {
        self.entries.clear();
        self.state = StoreState::Disposed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(store: &OrderedEntryStore) -> Vec<&str> {
        store
            .ordered_entries()
            .into_iter()
            .map(|e| e.id.as_str())
            .collect()
    }

    fn populate(store: &mut OrderedEntryStore) {
        for id in ["a.js", "a/b.js", "a/a.js", "c.js", "b.js"] {
            store.add_file(id, format!("//{}", id.trim_end_matches(".js"))).unwrap();
        }
    }

    #[test]
    fn body_is_sorted_lexicographically() {
        let mut store = OrderedEntryStore::new(StoreConfig::default()).unwrap();
        populate(&mut store);

        assert_eq!(ids(&store), ["a.js", "a/a.js", "a/b.js", "b.js", "c.js"]);
    }

    #[test]
    fn header_files_lead_in_configured_order() {
        let mut store = OrderedEntryStore::new(StoreConfig {
            header_files: vec!["b.js".into(), "a/a.js".into()],
            ..Default::default()
        })
        .unwrap();
        populate(&mut store);

        assert_eq!(ids(&store), ["b.js", "a/a.js", "a.js", "a/b.js", "c.js"]);
    }

    #[test]
    fn footer_files_trail_in_configured_order() {
        let mut store = OrderedEntryStore::new(StoreConfig {
            footer_files: vec!["b.js".into(), "a/a.js".into()],
            ..Default::default()
        })
        .unwrap();
        populate(&mut store);

        assert_eq!(ids(&store), ["a.js", "a/b.js", "c.js", "b.js", "a/a.js"]);
    }

    #[test]
    fn missing_configured_files_are_skipped() {
        let mut store = OrderedEntryStore::new(StoreConfig {
            header_files: vec!["missing.js".into(), "b.js".into()],
            footer_files: vec!["gone.js".into()],
            ..Default::default()
        })
        .unwrap();
        store.add_file("b.js", "b").unwrap();
        store.add_file("a.js", "a").unwrap();

        assert_eq!(ids(&store), ["b.js", "a.js"]);
    }

    #[test]
    fn header_membership_wins_over_footer() {
        let store = OrderedEntryStore::new(StoreConfig {
            header_files: vec!["x.js".into()],
            footer_files: vec!["x.js".into()],
            ..Default::default()
        })
        .unwrap();

        assert_eq!(store.classify("x.js"), Zone::HeaderFile);
    }

    #[test]
    fn update_keeps_zone_and_position() {
        let mut store = OrderedEntryStore::new(StoreConfig {
            footer_files: vec!["a.js".into()],
            ..Default::default()
        })
        .unwrap();
        populate(&mut store);
        let before = ids(&store).into_iter().map(String::from).collect::<Vec<_>>();

        store.update_file("a.js", "//a-modified").unwrap();

        assert_eq!(ids(&store), before);
        assert_eq!(store.get("a.js").unwrap().zone, Zone::FooterFile);
        assert_eq!(store.get("a.js").unwrap().content, "//a-modified");
    }

    #[test]
    fn duplicate_add_is_rejected() {
        let mut store = OrderedEntryStore::new(StoreConfig::default()).unwrap();
        store.add_file("a.js", "1").unwrap();

        let err = store.add_file("a.js", "2").unwrap_err();
        assert!(matches!(err, ConcatError::DuplicateEntry { ref id } if id == "a.js"));
        assert_eq!(store.get("a.js").unwrap().content, "1");
    }

    #[test]
    fn unknown_update_and_remove_are_rejected() {
        let mut store = OrderedEntryStore::new(StoreConfig::default()).unwrap();

        let err = store.update_file("a.js", "").unwrap_err();
        assert_eq!(err.to_string(), "Trying to update a.js but it has not been read before");

        let err = store.remove_file("a.js").unwrap_err();
        assert_eq!(err.to_string(), "Trying to remove a.js but it did not previously exist");
    }

    #[test]
    fn removed_entries_cannot_be_removed_twice() {
        let mut store = OrderedEntryStore::new(StoreConfig::default()).unwrap();
        store.add_file("a.js", "a").unwrap();
        store.remove_file("a.js").unwrap();

        assert!(matches!(
            store.remove_file("a.js"),
            Err(ConcatError::UnknownEntry { op: PatchOp::Remove, .. })
        ));
    }

    #[test]
    fn glob_in_header_or_footer_list_fails_fast() {
        let err = OrderedEntryStore::new(StoreConfig {
            header_files: vec!["inner/*.js".into()],
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "headerFiles cannot contain a glob,  `inner/*.js`");

        let err = OrderedEntryStore::new(StoreConfig {
            footer_files: vec!["inner/{a,b}.js".into()],
            ..Default::default()
        })
        .unwrap_err();
        assert!(err.to_string().starts_with("footerFiles cannot contain a glob"));
    }

    #[test]
    fn pattern_order_ranks_by_first_match() {
        let order = PatternOrder::new(&["a*", "b*"]).unwrap();
        let mut files = vec!["zasdf", "asdf", "basdf"];
        files.sort_by(|a, b| order.compare(a, b));
        assert_eq!(files, ["asdf", "basdf", "zasdf"]);

        let order = PatternOrder::new(&["b*", "a*"]).unwrap();
        files.sort_by(|a, b| order.compare(a, b));
        assert_eq!(files, ["basdf", "asdf", "zasdf"]);
    }

    #[test]
    fn custom_comparator_drives_body_order() {
        let mut store = OrderedEntryStore::new(StoreConfig {
            body_order: BodyOrder::Custom(Arc::new(|a: &str, b: &str| b.cmp(a))),
            ..Default::default()
        })
        .unwrap();
        populate(&mut store);

        assert_eq!(ids(&store), ["c.js", "b.js", "a/b.js", "a/a.js", "a.js"]);
    }

    #[test]
    fn disposed_store_rejects_everything() {
        let mut store = OrderedEntryStore::new(StoreConfig::default()).unwrap();
        assert_eq!(store.state(), StoreState::Empty);
        store.add_file("a.js", "a").unwrap();
        assert_eq!(store.state(), StoreState::Populated);

        store.dispose();

        assert_eq!(store.state(), StoreState::Disposed);
        assert!(matches!(store.add_file("b.js", "b"), Err(ConcatError::Disposed)));
        assert!(matches!(store.update_file("a.js", "b"), Err(ConcatError::Disposed)));
        assert!(matches!(store.remove_file("a.js"), Err(ConcatError::Disposed)));
    }
}
