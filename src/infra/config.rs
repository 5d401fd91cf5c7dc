use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};
use crate::core::map_comment::CommentStyle;

/// Config file names, searched in priority order. The first one found wins.
pub const CONFIG_FILES: [&str; 4] = ["stitch.toml", "stitch.yaml", "stitch.json", ".stitch.toml"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// Directory the input identifiers are relative to
    pub input_dir: PathBuf,

    /// Directory outputs and maps are written to
    pub output_dir: PathBuf,

    /// Ignore patterns applied on top of .gitignore
    pub ignore_patterns: Vec<String>,

    /// Include dotfiles when walking inputs
    pub include_hidden: bool,

    /// Walk into symlinked directories
    pub follow_symlinks: bool,

    /// Hints memoized by the shared merge cache
    pub cache_capacity: u64,

    /// One concatenation per entry
    pub units: Vec<UnitConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitConfig
{
    /// Output name relative to `output_dir`
    pub output_file: String,

    /// Globs selecting body files; empty selects everything
    pub inputs: Vec<String>,

    pub header: Option<String>,
    pub footer: Option<String>,
    pub header_files: Vec<String>,
    pub footer_files: Vec<String>,
    pub separator: String,

    /// Accept a unit whose inputs match nothing
    pub allow_none: bool,

    /// Body ordering globs; empty means lexicographic
    pub body_order: Vec<String>,

    /// Upstream mapping streams above this size are never memoized
    pub max_tracked_size: usize,

    pub source_maps: SourceMapConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceMapConfig
{
    pub enabled: bool,

    /// Output extensions that get a map
    pub extensions: Vec<String>,

    pub map_comment_type: CommentStyle,
    pub map_url: Option<String>,
    pub map_file: Option<String>,
    pub source_root: Option<String>,
}

impl Default for Config
{
    fn default() -> Self
    {
        Self {
            input_dir: PathBuf::from("."),
            output_dir: PathBuf::from("dist"),
            ignore_patterns: vec![
                "node_modules/**".to_string(),
                "dist/**".to_string(),
                "target/**".to_string(),
                ".git/**".to_string(),
                ".DS_Store".to_string(),
            ],
            include_hidden: false,
            follow_symlinks: false,
            cache_capacity: 10_000,
            units: Vec::new(),
        }
    }
}

impl Default for UnitConfig
{
    fn default() -> Self
    {
        Self {
            output_file: String::new(),
            inputs: Vec::new(),
            header: None,
            footer: None,
            header_files: Vec::new(),
            footer_files: Vec::new(),
            separator: "\n".to_string(),
            allow_none: false,
            body_order: Vec::new(),
            max_tracked_size: 10 * 1024 * 1024,
            source_maps: SourceMapConfig::default(),
        }
    }
}

impl Default for SourceMapConfig
{
    fn default() -> Self
    {
        Self {
            enabled: true,
            extensions: vec!["js".to_string()],
            map_comment_type: CommentStyle::Line,
            map_url: None,
            map_file: None,
            source_root: None,
        }
    }
}

impl Config
{
    /// Starter config written by `stitch init`.
    pub fn starter() -> Self
    {
        Self {
            units: vec![UnitConfig {
                output_file: "app.js".to_string(),
                inputs: vec!["src/**/*.js".to_string()],
                ..UnitConfig::default()
            }],
            ..Self::default()
        }
    }
}

/// Load the first config file found in `dir`, layered with `STITCH_`
/// environment variables (nested keys separated by `__`).
pub fn load_config_from(dir: &Path) -> Result<Config>
{
    let mut builder = config::Config::builder();

    if let Some(path) = CONFIG_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
    {
        builder = builder.add_source(config::File::from(path));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("STITCH")
            .prefix_separator("_")
            .separator("__"),
    );

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

/// Load an explicit config file, layered with environment variables.
pub fn load_config_file(path: &Path) -> Result<Config>
{
    let cfg = config::Config::builder()
        .add_source(config::File::from(path.to_path_buf()))
        .add_source(
            config::Environment::with_prefix("STITCH")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    cfg.try_deserialize()
        .with_context(|| format!("Failed to parse configuration from {}", path.display()))
}

pub fn load_config() -> Result<Config>
{
    load_config_from(Path::new("."))
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join("stitch.toml");

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::starter();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    if ctx.dry_run
    {
        if !ctx.quiet
        {
            println!("Would create config file at {}", config_path.display());
        }
        return Ok(());
    }

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}
