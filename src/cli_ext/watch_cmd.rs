//! `stitch watch`: initial build, then incremental rebuilds driven by
//! filesystem notifications.
//!
//! Notifications are only used to learn which paths changed. Each debounced
//! batch is turned into patches by checking what exists on disk now against
//! what each unit currently tracks, so event kinds and ordering quirks of the
//! platform backend do not matter.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{Event, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::cli::{AppContext, WatchArgs};
use crate::cli_ext::build_cmd::{prepare, print_report};
use crate::core::unit::{BuildReport, ConcatUnit, Patch};
use crate::infra::walk::to_identifier;

/// Patches that bring `unit` in line with the current state of `changed`
/// (identifier -> exists on disk). Changes the unit does not watch are dropped.
pub fn patches_for(unit: &ConcatUnit, changed: &BTreeMap<String, bool>) -> Vec<Patch> {
    changed
        .iter()
        .filter(|(id, _)| unit.watches(id))
        .filter_map(|(id, &exists)| match (exists, unit.tracks(id)) {
            (true, true) => Some(Patch::Update(id.clone())),
            (true, false) => Some(Patch::Add(id.clone())),
            (false, true) => Some(Patch::Remove(id.clone())),
            (false, false) => None,
        })
        .collect()
}

/// Collapse a batch of changed paths into identifiers under `root`.
pub fn changed_ids(root: &Path, output_dir: &Path, paths: &[PathBuf]) -> BTreeMap<String, bool> {
    paths
        .iter()
        .filter(|p| !p.starts_with(output_dir))
        .filter_map(|p| to_identifier(root, p).map(|id| (id, p.is_file())))
        .collect()
}

/// Block for one event, then keep draining until the channel is quiet.
fn next_batch(rx: &mpsc::Receiver<notify::Result<Event>>, quiet: Duration) -> Option<Vec<PathBuf>> {
    let mut paths = Vec::new();
    let mut collect = |res: notify::Result<Event>| match res {
        Ok(event) => paths.extend(event.paths),
        Err(e) => warn!("watch error: {e}"),
    };

    collect(rx.recv().ok()?);
    while let Ok(res) = rx.recv_timeout(quiet) {
        collect(res);
    }

    Some(paths)
}

/// A unit plus what its last failed rebuild left behind.
pub struct WatchedUnit {
    unit: ConcatUnit,
    /// Identifiers whose patches did not all go through
    pending: BTreeSet<String>,
    /// Outputs on disk lag behind the store
    stale: bool,
}

impl WatchedUnit {
    pub fn new(unit: ConcatUnit) -> Self {
        Self { unit, pending: BTreeSet::new(), stale: false }
    }

    pub fn unit(&self) -> &ConcatUnit {
        &self.unit
    }

    /// Apply `changed` plus anything left over from a failed rebuild, then
    /// rewrite the outputs. Returns `None` when there was nothing to do.
    pub fn rebuild(
        &mut self,
        changed: &BTreeMap<String, bool>,
        dry_run: bool,
    ) -> Result<Option<BuildReport>> {
        let mut batch = changed.clone();
        for id in std::mem::take(&mut self.pending) {
            let exists = self.unit.input_root().join(&id).is_file();
            batch.entry(id).or_insert(exists);
        }

        let patches = patches_for(&self.unit, &batch);
        if patches.is_empty() && !self.stale {
            return Ok(None);
        }

        // The store may change before the write fails; retry until a write lands.
        self.stale = true;
        match self.apply_and_write(&patches, dry_run) {
            Ok(report) => {
                self.stale = false;
                Ok(Some(report))
            }
            Err(e) => {
                self.pending.extend(patches.iter().map(|p| p.id().to_string()));
                Err(e)
            }
        }
    }

    fn apply_and_write(&mut self, patches: &[Patch], dry_run: bool) -> Result<BuildReport> {
        let applied = self.unit.apply(patches)?;
        let report = self.unit.write(dry_run)?;
        info!(unit = self.unit.id(), applied, "rebuilt");
        Ok(report)
    }
}

pub fn run(args: WatchArgs, ctx: &AppContext) -> Result<()> {
    let mut workspace = prepare(&args.build)?;

    for unit in &mut workspace.units {
        unit.populate()?;
        print_report(&unit.write(ctx.dry_run)?, ctx);
    }

    let input_root = workspace.input_root.clone();
    let output_dir = workspace.output_dir.clone();
    let mut units: Vec<WatchedUnit> = workspace.units.into_iter().map(WatchedUnit::new).collect();

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).context("Failed to start file watcher")?;
    watcher
        .watch(input_root.as_std_path(), RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {input_root}"))?;

    if !ctx.quiet {
        println!("Watching {input_root} for changes");
    }

    let quiet = Duration::from_millis(args.debounce_ms);

    while let Some(paths) = next_batch(&rx, quiet) {
        let changed = changed_ids(input_root.as_std_path(), output_dir.as_std_path(), &paths);
        debug!(changed = changed.len(), "change batch");

        for watched in &mut units {
            // A failed rebuild keeps the previous output; the next batch retries.
            match watched.rebuild(&changed, ctx.dry_run) {
                Ok(Some(report)) => print_report(&report, ctx),
                Ok(None) => {}
                Err(e) => {
                    warn!(unit = watched.unit().id(), "rebuild failed: {e:#}");
                    if !ctx.quiet {
                        eprintln!("rebuild failed: {e:#}");
                    }
                }
            }
        }
    }

    Ok(())
}
