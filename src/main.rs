//! `idl-bindgen` command line.
//!
//! Set `IDL_BINDGEN_LOG` to control logging (default `info`):
//!
//! ```bash
//! IDL_BINDGEN_LOG=debug idl-bindgen generate --source idl --output out
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use idl_bindgen::{
    discover, report_error, BindgenConfig, GenerateError, GenerateOptions, GenerationReport,
    Orchestrator, OutputWriter, Target, CONFIG_FILE,
};

#[derive(Parser, Debug)]
#[command(
    name = "idl-bindgen",
    version,
    about = "Generate bindings from IDL declaration files"
)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze, resolve and write generated files
    Generate {
        /// Directory holding the *.d.ts inputs
        #[arg(short, long)]
        source: Option<PathBuf>,
        /// Output directory (one subdirectory per target)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Targets to run (repeatable; default: all)
        #[arg(short, long = "target", value_enum)]
        targets: Vec<Target>,
        /// Component stems to emit (repeatable; default: all)
        #[arg(long = "component", value_name = "STEM")]
        components: Vec<String>,
        /// Skip an `Interface.member` (repeatable)
        #[arg(long = "deny", value_name = "INTERFACE.MEMBER")]
        deny: Vec<String>,
    },
    /// Analyze and resolve without emitting
    Check {
        /// Directory holding the *.d.ts inputs
        #[arg(short, long)]
        source: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("IDL_BINDGEN_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_target(false)
                .with_level(true),
        )
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every unit succeeded.
fn run(cli: Cli) -> Result<bool> {
    let mut config = BindgenConfig::load_from_path(&cli.config)?.unwrap_or_default();

    match cli.command {
        Command::Generate {
            source,
            output,
            targets,
            components,
            deny,
        } => {
            if source.is_some() {
                config.generate.source = source;
            }
            if output.is_some() {
                config.generate.output = output;
            }
            if !targets.is_empty() {
                config.generate.targets = Some(targets);
            }
            if !components.is_empty() {
                config.generate.components = Some(components);
            }
            config.deny.members.extend(deny);

            let units = discover(config.generate.source_dir())?;
            let mut orchestrator = Orchestrator::new(GenerateOptions::from_config(&config))?;
            let mut report = match orchestrator.generate(units) {
                Ok(report) => report,
                Err(err) => return Err(reported(err, &orchestrator)),
            };
            let writer = OutputWriter::new(config.generate.output_dir());
            orchestrator
                .write(&mut report, &writer)
                .with_context(|| format!("writing to {}", writer.root().display()))?;
            print_summary(&report, Some(writer.root()))?;
            Ok(report.failures.is_empty())
        }
        Command::Check { source } => {
            if source.is_some() {
                config.generate.source = source;
            }
            let units = discover(config.generate.source_dir())?;
            let mut orchestrator = Orchestrator::new(GenerateOptions::from_config(&config))?;
            let report = match orchestrator.check(units) {
                Ok(report) => report,
                Err(err) => return Err(reported(err, &orchestrator)),
            };
            print_summary(&report, None)?;
            Ok(report.failures.is_empty())
        }
    }
}

/// Render a batch error against its sources and turn it into a short exit error.
fn reported(err: GenerateError, orchestrator: &Orchestrator<'_>) -> anyhow::Error {
    report_error(&err, orchestrator.units());
    anyhow::anyhow!("generation aborted")
}

fn print_summary(report: &GenerationReport, output: Option<&Path>) -> Result<()> {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

    for failure in &report.failures {
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true))?;
        write!(stdout, "skipped")?;
        stdout.reset()?;
        writeln!(stdout, " {failure}")?;
    }

    let color = if report.failures.is_empty() {
        Color::Green
    } else {
        Color::Yellow
    };
    stdout.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
    match output {
        Some(_) => write!(stdout, "Generated")?,
        None => write!(stdout, "Checked")?,
    }
    stdout.reset()?;

    write!(
        stdout,
        " {} units, {} declarations, {} components",
        report.units,
        report.declarations,
        report.components.len()
    )?;
    if let Some(output) = output {
        write!(
            stdout,
            "; {} files in {} ({} written, {} unchanged)",
            report.file_count(),
            output.display(),
            report.written,
            report.unchanged
        )?;
    }
    if !report.failures.is_empty() {
        write!(stdout, "; {} failed", report.failures.len())?;
    }
    writeln!(stdout)?;
    Ok(())
}
