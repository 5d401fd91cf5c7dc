//! **stitch** - incremental file concatenation with source map assimilation
//!
//! An ordered entry store keeps header files, a sorted body and footer files
//! stable across partial rebuilds. Two strategies render it: plain
//! concatenation, and concatenation with a merged version 3 source map that
//! pulls in the maps of already-transpiled inputs.

/// Command-line interface with clap integration
pub mod cli;

/// Store, strategies and the position-map pipeline
pub mod core {
    /// Fatal errors, external-map warnings and warning sinks
    pub mod error;
    pub use error::{
        CollectingSink, ConcatError, ConfigError, ExternalMapError, ExternalMapWarning, PatchOp,
        TracingSink, WarningSink,
    };

    /// Entries and output zones
    pub mod entry;
    pub use entry::{Entry, Zone};

    /// Ordered entry store with recompute-on-read ordering
    pub mod store;
    pub use store::{BodyComparator, BodyOrder, OrderedEntryStore, PatternOrder, StoreConfig, StoreState};

    /// Base64 VLQ codec
    pub mod vlq;

    /// `sourceMappingURL` comment detection and rendering
    pub mod map_comment;
    pub use map_comment::CommentStyle;

    /// Map generation: identity shortcut, assimilation, merge cache
    pub mod mapping;
    pub use mapping::{EncoderCache, GeneratorOptions, MappingGenerator, MasterMap};

    /// Plain concatenation strategy
    pub mod plain;
    pub use plain::{ConcatOptions, PlainAssembler};

    /// Map-aware concatenation strategy
    pub mod source_map;
    pub use source_map::{Assembled, PositionMapAssembler, SourceMapOptions};

    /// Concatenation units: strategy selection, population, patches, output
    pub mod unit;
    pub use unit::{ConcatUnit, Patch, Strategy, UnitOptions};
}

/// Infrastructure - configuration, I/O, and input discovery
pub mod infra {
    /// Layered configuration (file + STITCH_ environment)
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// File reads (memory-mapped above 1 MiB), atomic writes, FileAccess seam
    pub mod io;
    pub use io::{FileAccess, FsAccess, MemoryAccess, read_file_smart};

    /// Newline counting and UTF-16 widths
    pub mod line_index;
    pub use line_index::LineStats;

    /// Gitignore-aware input walking
    pub mod walk;
    pub use walk::FileWalker;
}

/// Subcommand handlers
pub mod cli_ext {
    /// One-shot build of every configured unit
    pub mod build_cmd;

    /// Incremental rebuilds on filesystem changes
    pub mod watch_cmd;
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use cli_ext::build_cmd::run as build_run;
pub use cli_ext::watch_cmd::run as watch_run;
pub use infra::{Config, FileWalker, load_config};

// Core types for external consumers
pub use core::{ConcatError, ConcatUnit, PlainAssembler, PositionMapAssembler};
