//! Filepath: src/infra/walk.rs
//! Gitignore-aware discovery of concatenation inputs.
//! - Respects .gitignore, .git/info/exclude, and global gitignore
//! - Extra ignore globs (early prune + late filter)
//! - Input globs select which files become entries (empty = everything)
//! - Identifiers are POSIX-style paths relative to the input root
//! - Deterministic ordering for stable tests/CI
//!
//! Backed by ripgrep's `ignore` crate and `globset`.

use std::path::Path;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::{DirEntry, WalkBuilder};

/// Compile a list of glob patterns into one set.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet>
{
    let mut builder = GlobSetBuilder::new();

    for pattern in patterns
    {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob `{pattern}`"))?);
    }

    Ok(builder.build()?)
}

/// Entry identifier for `path` under `root`: relative, `/`-separated.
pub fn to_identifier(
    root: &Path,
    path: &Path,
) -> Option<String>
{
    let rel = path
        .strip_prefix(root)
        .ok()?;
    let rel = Utf8Path::from_path(rel)?;

    let id = rel
        .components()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join("/");

    (!id.is_empty()).then_some(id)
}

/// Gitignore-aware walker with extra ignore globs and input selection.
/// Extra globs are applied in two places:
///   1) Early: prune directories during traversal (filter_entry).
///   2) Late: filter out files that still slipped through.
pub struct FileWalker
{
    /// Compiled set of additional ignore patterns
    ignore_patterns: GlobSet,

    /// Files that become entries; `None` selects every file
    inputs: Option<GlobSet>,

    /// Include hidden (dot) files; default true
    include_hidden: bool,

    /// Follow symbolic links; default false
    follow_symlinks: bool,
}

impl FileWalker
{
    /// Build a walker with additional ignore patterns (e.g. "node_modules/**",
    /// "**/*.min.js"). Patterns match on paths relative to the walked root.
    pub fn new(additional_ignores: &[String]) -> Result<Self>
    {
        Ok(Self {
            ignore_patterns: build_globset(additional_ignores)?,
            inputs: None,
            include_hidden: true,
            follow_symlinks: false,
        })
    }

    /// Restrict results to files matching any of `patterns`. An empty list
    /// keeps every file.
    pub fn with_inputs(
        mut self,
        patterns: &[String],
    ) -> Result<Self>
    {
        self.inputs = if patterns.is_empty() { None } else { Some(build_globset(patterns)?) };
        Ok(self)
    }

    /// Include or exclude hidden files (dotfiles).
    pub fn with_include_hidden(
        mut self,
        include_hidden: bool,
    ) -> Self
    {
        self.include_hidden = include_hidden;
        self
    }

    /// Follow or skip symbolic links (default false).
    pub fn with_follow_symlinks(
        mut self,
        follow: bool,
    ) -> Self
    {
        self.follow_symlinks = follow;
        self
    }

    /// True if `id` is ignored or not selected by the input globs.
    pub fn excludes(
        &self,
        id: &str,
    ) -> bool
    {
        self.ignore_patterns
            .is_match(id)
            || self
                .inputs
                .as_ref()
                .is_some_and(|set| !set.is_match(id))
    }

    /// Internal: construct a configured WalkBuilder for `root`.
    fn build_walk(
        &self,
        root: &Path,
    ) -> WalkBuilder
    {
        let mut b = WalkBuilder::new(root);

        // WalkBuilder::hidden(true) skips dotfiles
        b.hidden(!self.include_hidden);

        b.git_ignore(true);
        b.git_global(true);
        b.git_exclude(true);
        b.follow_links(self.follow_symlinks);

        // Early directory pruning using extra ignores, matched on relative paths.
        let extra = self
            .ignore_patterns
            .clone();
        let base = root.to_path_buf();
        b.filter_entry(move |ent: &DirEntry| {
            let is_dir = ent
                .file_type()
                .map(|ft| ft.is_dir())
                .unwrap_or(false);

            if is_dir && ent.file_name() == ".git"
            {
                return false;
            }

            let rel = ent
                .path()
                .strip_prefix(&base)
                .unwrap_or(ent.path());

            !(is_dir && extra.is_match(rel))
        });

        b
    }

    /// Identifiers of every selected file under `root`, sorted.
    pub fn walk_ids<P: AsRef<Path>>(
        &self,
        root: P,
    ) -> Vec<String>
    {
        let root_path = root.as_ref();
        let walker = self
            .build_walk(root_path)
            .build();

        let mut out: Vec<String> = walker
            // Drop entries with IO errors
            .filter_map(|res| res.ok())
            .filter(|entry| {
                entry
                    .file_type()
                    .is_some_and(|ft| ft.is_file())
            })
            .filter_map(|entry| to_identifier(root_path, entry.path()))
            .filter(|id| !self.excludes(id))
            .collect();

        out.sort();
        out.dedup();

        out
    }

    /// Absolute paths of the selected files, sorted by identifier.
    pub fn walk_files<P: AsRef<Path>>(
        &self,
        root: P,
    ) -> Vec<Utf8PathBuf>
    {
        let root_path = root.as_ref();

        self.walk_ids(root_path)
            .into_iter()
            .filter_map(|id| Utf8PathBuf::from_path_buf(root_path.join(&id)).ok())
            .collect()
    }
}
