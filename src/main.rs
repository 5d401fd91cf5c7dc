use anyhow::Result;
use clap::Parser;
use miette::{GraphicalReportHandler, GraphicalTheme};
use owo_colors::OwoColorize;
use stitch::cli::{AppContext, Cli, Commands};
use stitch::core::ConcatError;
use tracing_subscriber::EnvFilter;

fn init_tracing(ctx: &AppContext) {
    let fallback = if ctx.quiet {
        "error"
    } else if ctx.verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_env("STITCH_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!ctx.no_color)
        .with_target(false)
        .init();
}

/// Library errors get a miette report; everything else the anyhow chain.
fn report(err: &anyhow::Error, ctx: &AppContext) {
    if let Some(diag) = err
        .chain()
        .find_map(|e| e.downcast_ref::<ConcatError>())
    {
        let handler = if ctx.no_color {
            GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor())
        } else {
            GraphicalReportHandler::new()
        };

        let mut out = String::new();
        if handler.render_report(&mut out, diag).is_ok() {
            eprintln!("{err}");
            eprint!("{out}");
            return;
        }
    }

    if ctx.no_color {
        eprintln!("error: {err:#}");
    } else {
        eprintln!("{} {err:#}", "error:".red().bold());
    }
}

fn run(cli: Cli, ctx: &AppContext) -> Result<()> {
    match cli.command {
        Commands::Build(args) => stitch::build_run(args, ctx),
        Commands::Watch(args) => stitch::watch_run(args, ctx),
        Commands::Init(args) => stitch::infra::config::init(args, ctx),
    }
}

fn main() {
    let cli = Cli::parse();

    // Build a context once, pass everywhere
    let ctx = cli.context();
    init_tracing(&ctx);

    if let Err(err) = run(cli, &ctx) {
        report(&err, &ctx);
        std::process::exit(1);
    }
}
