//! One concatenation unit: a strategy instance plus the files it reads.
//!
//! A unit owns its assembler for its whole lifetime. The first build
//! populates it from a walk of the input root; later builds apply [`Patch`]
//! values for the files that changed and rewrite the outputs.

use std::sync::Arc;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use rayon::prelude::*;
use tracing::{debug, info, instrument};

use crate::core::error::{ConcatError, WarningSink};
use crate::core::map_comment::CommentStyle;
use crate::core::mapping::EncoderCache;
use crate::core::plain::{ConcatOptions, PlainAssembler};
use crate::core::source_map::{PositionMapAssembler, SourceMapOptions};
use crate::core::store::OrderedEntryStore;
use crate::infra::io::{FileAccess, read_text, write_atomic};
use crate::infra::walk::FileWalker;

/// Which assembler a unit uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Plain,
    SourceMap,
}

impl Strategy {
    /// Maps are produced only when enabled and the output has a listed extension.
    pub fn select(output_name: &str, maps_enabled: bool, extensions: &[String]) -> Self {
        let ext = Utf8Path::new(output_name).extension().unwrap_or("");

        if maps_enabled && extensions.iter().any(|e| e.trim_start_matches('.') == ext) {
            Strategy::SourceMap
        } else {
            Strategy::Plain
        }
    }
}

/// Map settings for a unit; ignored by the plain strategy.
#[derive(Debug, Clone)]
pub struct MapSettings {
    pub enabled: bool,
    pub extensions: Vec<String>,
    pub comment_style: CommentStyle,
    pub map_url: Option<String>,
    pub map_file: Option<String>,
    pub source_root: Option<String>,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            extensions: vec!["js".to_string()],
            comment_style: CommentStyle::default(),
            map_url: None,
            map_file: None,
            source_root: None,
        }
    }
}

#[derive(Clone)]
pub struct UnitOptions {
    pub input_root: Utf8PathBuf,
    pub output_dir: Utf8PathBuf,
    /// Globs selecting body files; empty selects everything
    pub inputs: Vec<String>,
    pub ignore: Vec<String>,
    pub include_hidden: bool,
    pub follow_symlinks: bool,
    pub allow_none: bool,
    pub concat: ConcatOptions,
    pub maps: MapSettings,
    pub max_tracked_size: usize,
    pub cache: Option<EncoderCache>,
    pub files: Option<Arc<dyn FileAccess>>,
    pub sink: Option<Arc<dyn WarningSink>>,
}

impl UnitOptions {
    pub fn new(input_root: impl Into<Utf8PathBuf>, output_dir: impl Into<Utf8PathBuf>, concat: ConcatOptions) -> Self {
        Self {
            input_root: input_root.into(),
            output_dir: output_dir.into(),
            inputs: Vec::new(),
            ignore: Vec::new(),
            include_hidden: false,
            follow_symlinks: false,
            allow_none: false,
            concat,
            maps: MapSettings::default(),
            max_tracked_size: 10 * 1024 * 1024,
            cache: None,
            files: None,
            sink: None,
        }
    }
}

/// One file-level change between two builds, by identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch {
    Add(String),
    Update(String),
    Remove(String),
}

impl Patch {
    pub fn id(&self) -> &str {
        match self {
            Patch::Add(id) | Patch::Update(id) | Patch::Remove(id) => id,
        }
    }
}

pub enum Assembler {
    Plain(PlainAssembler),
    SourceMap(PositionMapAssembler),
}

impl Assembler {
    pub fn store(&self) -> &OrderedEntryStore {
        match self {
            Assembler::Plain(a) => a.store(),
            Assembler::SourceMap(a) => a.store(),
        }
    }

    pub fn add_file(&mut self, id: &str, content: String) -> Result<(), ConcatError> {
        match self {
            Assembler::Plain(a) => a.add_file(id, content),
            Assembler::SourceMap(a) => a.add_file(id, content),
        }
    }

    pub fn update_file(&mut self, id: &str, content: String) -> Result<(), ConcatError> {
        match self {
            Assembler::Plain(a) => a.update_file(id, content),
            Assembler::SourceMap(a) => a.update_file(id, content),
        }
    }

    pub fn remove_file(&mut self, id: &str) -> Result<(), ConcatError> {
        match self {
            Assembler::Plain(a) => a.remove_file(id),
            Assembler::SourceMap(a) => a.remove_file(id),
        }
    }

    pub fn dispose(&mut self) {
        match self {
            Assembler::Plain(a) => a.dispose(),
            Assembler::SourceMap(a) => a.dispose(),
        }
    }
}

/// Files written (or that would be written) by one build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub output: Utf8PathBuf,
    pub map: Option<Utf8PathBuf>,
    pub bytes: usize,
    pub entries: usize,
}

pub struct ConcatUnit {
    id: u64,
    assembler: Assembler,
    walker: FileWalker,
    input_root: Utf8PathBuf,
    output_dir: Utf8PathBuf,
    inputs: Vec<String>,
    allow_none: bool,
}

impl ConcatUnit {
    /// Validate options and create the strategy; nothing is read yet.
    pub fn new(id: u64, options: UnitOptions) -> Result<Self> {
        let UnitOptions {
            input_root,
            output_dir,
            inputs,
            ignore,
            include_hidden,
            follow_symlinks,
            allow_none,
            concat,
            maps,
            max_tracked_size,
            cache,
            files,
            sink,
        } = options;

        let strategy = Strategy::select(&concat.output_name, maps.enabled, &maps.extensions);
        debug!(unit = id, output = %concat.output_name, ?strategy, "creating concatenation unit");

        let assembler = match strategy {
            Strategy::Plain => Assembler::Plain(PlainAssembler::new(concat)?),
            Strategy::SourceMap => {
                let mut opts = SourceMapOptions::new(concat);
                opts.source_root = maps.source_root;
                opts.input_root = Some(input_root.clone());
                opts.map_comment_style = maps.comment_style;
                opts.map_url = maps.map_url;
                opts.map_file = maps.map_file;
                opts.max_tracked_size = max_tracked_size;
                opts.cache = cache;
                if let Some(files) = files {
                    opts.files = files;
                }
                if let Some(sink) = sink {
                    opts.sink = sink;
                }
                Assembler::SourceMap(PositionMapAssembler::new(opts)?)
            }
        };

        let walker = FileWalker::new(&ignore)?
            .with_inputs(&inputs)?
            .with_include_hidden(include_hidden)
            .with_follow_symlinks(follow_symlinks);

        Ok(Self {
            id,
            assembler,
            walker,
            input_root,
            output_dir,
            inputs,
            allow_none,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn strategy(&self) -> Strategy {
        match self.assembler {
            Assembler::Plain(_) => Strategy::Plain,
            Assembler::SourceMap(_) => Strategy::SourceMap,
        }
    }

    pub fn assembler(&self) -> &Assembler {
        &self.assembler
    }

    pub fn input_root(&self) -> &Utf8Path {
        &self.input_root
    }

    /// True if a change to `id` can affect this unit's output.
    pub fn watches(&self, id: &str) -> bool {
        self.assembler.store().is_configured(id) || !self.walker.excludes(id)
    }

    /// True if `id` currently has an entry.
    pub fn tracks(&self, id: &str) -> bool {
        self.assembler.store().contains(id)
    }

    fn read(&self, id: &str) -> Result<String> {
        let path = self.input_root.join(id);
        read_text(&path).with_context(|| format!("Failed to read input {id}"))
    }

    /// Initial population: configured header/footer files plus every walked
    /// input that is not one of them. Returns the number of entries added.
    #[instrument(skip(self), fields(unit = self.id))]
    pub fn populate(&mut self) -> Result<usize> {
        let walked = self.walker.walk_ids(&self.input_root);
        let store = self.assembler.store();

        let overlap = walked.iter().any(|id| store.is_configured(id));
        let body: Vec<String> = walked
            .into_iter()
            .filter(|id| !store.is_configured(id))
            .collect();

        if body.is_empty() && !overlap && !self.allow_none {
            return Err(ConcatError::EmptyResult)
                .with_context(|| format!("nothing matched [{}]", self.inputs.join(", ")));
        }

        let options = self.options();
        let mut ids: Vec<String> = options
            .header_files
            .iter()
            .chain(&options.footer_files)
            .cloned()
            .collect();
        ids.extend(body);

        // Reads are independent; insertion stays sequential and ordered.
        let contents: Vec<(String, Result<String>)> = ids
            .into_par_iter()
            .map(|id| {
                let text = self.read(&id);
                (id, text)
            })
            .collect();

        let mut added = 0;
        for (id, text) in contents {
            if self.tracks(&id) {
                continue;
            }
            self.assembler.add_file(&id, text?)?;
            added += 1;
        }

        info!(unit = self.id, entries = added, "populated");
        Ok(added)
    }

    fn options(&self) -> &ConcatOptions {
        match &self.assembler {
            Assembler::Plain(a) => a.options(),
            Assembler::SourceMap(a) => a.options(),
        }
    }

    /// Apply file-level changes. Patches for files this unit does not watch
    /// are skipped. Returns how many were applied.
    #[instrument(skip(self, patches), fields(unit = self.id, patches = patches.len()))]
    pub fn apply(&mut self, patches: &[Patch]) -> Result<usize> {
        let mut applied = 0;

        for patch in patches {
            let id = patch.id();
            if !self.watches(id) {
                continue;
            }

            match patch {
                Patch::Add(_) => {
                    let content = self.read(id)?;
                    self.assembler.add_file(id, content)?;
                }
                Patch::Update(_) => {
                    let content = self.read(id)?;
                    self.assembler.update_file(id, content)?;
                }
                Patch::Remove(_) => self.assembler.remove_file(id)?,
            }

            debug!(?patch, "applied");
            applied += 1;
        }

        Ok(applied)
    }

    /// Render the outputs and write them under the output directory.
    #[instrument(skip(self), fields(unit = self.id))]
    pub fn write(&self, dry_run: bool) -> Result<BuildReport> {
        let options = self.options();
        let output = self.output_dir.join(&options.output_name);
        let entries = self.assembler.store().len();

        let (code, map) = match &self.assembler {
            Assembler::Plain(a) => (a.result()?, None),
            Assembler::SourceMap(a) => {
                let assembled = a.finalize()?;
                let map_path = self.output_dir.join(a.map_file());
                (assembled.code.clone(), Some((map_path, assembled.map_json())))
            }
        };

        if !dry_run {
            write_atomic(output.as_std_path(), &code)
                .with_context(|| format!("Failed to write {output}"))?;
            if let Some((path, json)) = &map {
                write_atomic(path.as_std_path(), json)
                    .with_context(|| format!("Failed to write {path}"))?;
            }
        }

        Ok(BuildReport {
            output,
            map: map.map(|(path, _)| path),
            bytes: code.len(),
            entries,
        })
    }

    pub fn dispose(&mut self) {
        self.assembler.dispose();
    }
}
