//! `dih`: parameters, validation, rendering and narration for the book.

mod commands;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

use dih_book::Book;
use dih_core::errors::{BookError, ConfigError, DihErrorCode};
use dih_core::{CliOverrides, DihConfig};

use commands::params::ParamsCommand;
use commands::Context;

#[derive(Parser, Debug)]
#[command(name = "dih", version)]
#[command(about = "Build tooling for the DIH book: parameters, checks, rendering, narration")]
struct Cli {
    /// Book root directory
    #[arg(long, global = true, value_name = "DIR", default_value = ".")]
    root: PathBuf,

    /// Project config file (default: <root>/dih.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Rendered output directory (default: <root>/_book)
    #[arg(long, global = true, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Report format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Console)]
    format: OutputFormat,

    /// Disable colored console output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Console,
    Json,
}

impl OutputFormat {
    fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Console => "console",
            OutputFormat::Json => "json",
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Inspect the parameter registry
    #[command(subcommand)]
    Params(ParamsCommand),

    /// Generate the Quarto variables file
    Variables {
        /// Only report whether the file is out of date
        #[arg(long)]
        check: bool,
    },

    /// Generate the parameters and calculations appendix
    Appendix,

    /// Check sources before rendering, or the output after
    Validate {
        /// Check the rendered output directory instead of the sources
        #[arg(long)]
        post: bool,
    },

    /// Report where parameters are used, unknown and hand-typed values
    Audit,

    /// Extract the bibliography into references.json
    References,

    /// Write narration text chunks for the audiobook
    Narrate {
        /// Only this chapter (path relative to the book root)
        #[arg(long, value_name = "FILE")]
        chapter: Option<PathBuf>,
    },

    /// Validate, then render the book under supervision
    Render(commands::render::RenderArgs),
}

fn main() -> ExitCode {
    dih_core::tracing::init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("error: {}", describe(&err));
            ExitCode::from(2)
        }
    }
}

/// `Ok(false)` means the command ran but found problems.
fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut overrides = CliOverrides {
        output_dir: cli.output_dir.clone(),
        ..CliOverrides::default()
    };
    if let Commands::Render(ref args) = cli.command {
        args.apply(&mut overrides);
    }

    let config = match cli.config {
        Some(ref path) => {
            if !path.exists() {
                return Err(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                }
                .into());
            }
            DihConfig::load_with(path, Some(&overrides))?
        }
        None => DihConfig::load(&cli.root, Some(&overrides))?,
    };
    debug!(root = %cli.root.display(), ?config, "configuration resolved");

    let use_color = !cli.no_color
        && std::env::var_os("NO_COLOR").is_none()
        && std::io::stdout().is_terminal();
    let ctx = Context::new(Book::new(cli.root, config), cli.format, use_color)?;

    match cli.command {
        Commands::Params(cmd) => commands::params::run(&ctx, cmd),
        Commands::Variables { check } => commands::generate::variables(&ctx, check),
        Commands::Appendix => commands::generate::appendix(&ctx),
        Commands::Validate { post } => commands::check::validate(&ctx, post),
        Commands::Audit => commands::check::audit(&ctx),
        Commands::References => commands::generate::references(&ctx),
        Commands::Narrate { chapter } => commands::narrate::run(&ctx, chapter.as_deref()),
        Commands::Render(args) => commands::render::run(&ctx, &args),
    }
}

/// Library errors print as `[CODE] message`, anything else with its chain.
fn describe(err: &anyhow::Error) -> String {
    if let Some(e) = err.downcast_ref::<BookError>() {
        return e.tagged_string();
    }
    if let Some(e) = err.downcast_ref::<ConfigError>() {
        return e.tagged_string();
    }
    if let Some(e) = err.downcast_ref::<dih_core::errors::ParameterError>() {
        return e.tagged_string();
    }
    if let Some(e) = err.downcast_ref::<dih_core::errors::ExportError>() {
        return e.tagged_string();
    }
    format!("{err:#}")
}
