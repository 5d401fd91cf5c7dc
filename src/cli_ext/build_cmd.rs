//! `stitch build`: turn the loaded config into concatenation units and write
//! every output once.

use std::path::Path;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use owo_colors::{OwoColorize, Style};
use tracing::{debug, instrument};

use crate::cli::{AppContext, BuildArgs};
use crate::core::mapping::EncoderCache;
use crate::core::plain::ConcatOptions;
use crate::core::store::{BodyOrder, PatternOrder};
use crate::core::unit::{BuildReport, ConcatUnit, MapSettings, UnitOptions};
use crate::infra::config::{Config, UnitConfig, load_config, load_config_file};

/// Units ready to populate, plus the roots they share.
pub struct Workspace {
    pub input_root: Utf8PathBuf,
    pub output_dir: Utf8PathBuf,
    pub units: Vec<ConcatUnit>,
}

fn utf8(path: std::path::PathBuf, what: &str) -> Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path)
        .map_err(|p| anyhow::anyhow!("{what} {} is not valid UTF-8", p.display()))
}

/// Unit options from one `[[units]]` table.
pub fn unit_options(
    unit: &UnitConfig,
    config: &Config,
    input_root: &Utf8PathBuf,
    output_dir: &Utf8PathBuf,
    ignore: &[String],
    cache: &EncoderCache,
) -> Result<UnitOptions> {
    let body_order = if unit.body_order.is_empty() {
        BodyOrder::Lexicographic
    } else {
        BodyOrder::Patterns(PatternOrder::new(&unit.body_order)?)
    };

    let concat = ConcatOptions {
        output_name: unit.output_file.clone(),
        separator: unit.separator.clone(),
        header: unit.header.clone(),
        footer: unit.footer.clone(),
        header_files: unit.header_files.clone(),
        footer_files: unit.footer_files.clone(),
        allow_empty: unit.allow_none,
        body_order,
    };

    let maps = &unit.source_maps;
    let mut options = UnitOptions::new(input_root.clone(), output_dir.clone(), concat);
    options.inputs = unit.inputs.clone();
    options.ignore = ignore.to_vec();
    options.include_hidden = config.include_hidden;
    options.follow_symlinks = config.follow_symlinks;
    options.allow_none = unit.allow_none;
    options.max_tracked_size = unit.max_tracked_size;
    options.cache = Some(cache.clone());
    options.maps = MapSettings {
        enabled: maps.enabled,
        extensions: maps.extensions.clone(),
        comment_style: maps.map_comment_type,
        map_url: maps.map_url.clone(),
        map_file: maps.map_file.clone(),
        source_root: maps.source_root.clone(),
    };

    Ok(options)
}

/// Load config, apply CLI overrides and create the selected units.
#[instrument(skip_all)]
pub fn prepare(args: &BuildArgs) -> Result<Workspace> {
    let mut config = match &args.config {
        Some(path) => load_config_file(path)?,
        None => load_config()?,
    };

    if args.no_source_maps {
        for unit in &mut config.units {
            unit.source_maps.enabled = false;
        }
    }

    let input_dir = args
        .input_dir
        .clone()
        .unwrap_or_else(|| config.input_dir.clone());
    let input_root = dunce::canonicalize(&input_dir)
        .with_context(|| format!("Input directory {} does not exist", input_dir.display()))?;
    let input_root = utf8(input_root, "input directory")?;

    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.output_dir.clone());
    let output_dir = utf8(std::path::absolute(&output_dir)?, "output directory")?;

    if config.units.is_empty() {
        anyhow::bail!("No units configured. Run `stitch init` to create a starter config.");
    }

    // Outputs written inside the input tree must never be read back as inputs.
    let mut ignore = config.ignore_patterns.clone();
    if let Ok(rel) = output_dir.strip_prefix(&input_root)
        && !rel.as_str().is_empty()
    {
        ignore.push(format!("{rel}/**"));
    }

    let cache = EncoderCache::new(config.cache_capacity);
    let mut units = Vec::new();

    for (index, unit) in config.units.iter().enumerate() {
        if !args.units.is_empty() && !args.units.contains(&unit.output_file) {
            continue;
        }

        let options = unit_options(unit, &config, &input_root, &output_dir, &ignore, &cache)?;
        let unit = ConcatUnit::new(index as u64 + 1, options)
            .with_context(|| format!("Invalid unit `{}`", unit.output_file))?;
        units.push(unit);
    }

    if units.is_empty() {
        anyhow::bail!("No configured unit matches {:?}", args.units);
    }

    debug!(units = units.len(), input = %input_root, output = %output_dir, "workspace ready");

    Ok(Workspace { input_root, output_dir, units })
}

pub(crate) fn print_report(report: &BuildReport, ctx: &AppContext) {
    if ctx.quiet {
        return;
    }

    let (label, style) = if ctx.dry_run {
        ("would write", Style::new().yellow())
    } else {
        ("wrote", Style::new().green())
    };
    let style = if ctx.no_color { Style::new() } else { style };

    println!(
        "{} {} ({} entries, {} bytes)",
        label.style(style),
        display(&report.output),
        report.entries,
        report.bytes
    );
    if let Some(map) = &report.map {
        println!("{} {}", label.style(style), display(map));
    }
}

fn display(path: &Utf8PathBuf) -> String {
    let cwd = std::env::current_dir().ok();
    cwd.as_deref()
        .and_then(|cwd| path.as_std_path().strip_prefix(cwd).ok())
        .unwrap_or(Path::new(path.as_str()))
        .display()
        .to_string()
}

pub fn run(args: BuildArgs, ctx: &AppContext) -> Result<()> {
    let mut workspace = prepare(&args)?;

    for unit in &mut workspace.units {
        unit.populate()?;
        let report = unit.write(ctx.dry_run)?;
        print_report(&report, ctx);
    }

    Ok(())
}
