//! nanoconv - SFZ to layered sampler instrument converter
//!
//! Resolves SFZ instruments into the control > global > group > region
//! layout of the target sampler and writes loop points into the samples.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use nanoconv_cli::{convert::convert, Config, ConfirmOverwrite, OverwritePolicy};
use nanoconv_sfz::{ConversionSession, Schema};

#[derive(Parser)]
#[command(name = "nanoconv")]
#[command(author, version, about = "Convert SFZ instruments for layered samplers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (default: ~/.config/nanoconv/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved instrument
    Resolve {
        /// SFZ file to resolve
        #[arg(value_name = "SOURCE")]
        source: PathBuf,

        /// Prefix for sample paths when the file sets no default_path
        #[arg(long)]
        default_path: Option<String>,
    },
    /// Convert an instrument and its samples into a directory
    Convert {
        /// SFZ file to convert
        #[arg(value_name = "SOURCE")]
        source: PathBuf,

        /// Output directory (must differ from the source directory)
        #[arg(short, long, value_name = "DIR")]
        destination: PathBuf,

        /// What to do with existing files
        #[arg(long, value_enum)]
        overwrite: Option<OverwritePolicy>,

        /// Prefix for sample paths when the file sets no default_path
        #[arg(long)]
        default_path: Option<String>,
    },
    /// Write a loop into a single WAV file
    Loop {
        /// WAV file to read
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Where to write the looped file
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// First sample frame of the loop
        #[arg(long)]
        start: u32,

        /// Last sample frame of the loop
        #[arg(long)]
        end: u32,
    },
    /// Create a default configuration file
    Init,
    /// Show the configuration file path
    ConfigPath,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();

    match cli.command {
        Commands::Init => {
            let path = Config::create_default_config_file()?;
            println!("Created default config at: {}", path.display());
            Ok(())
        }
        Commands::ConfigPath => {
            let path = Config::config_path()?;
            println!("{}", path.display());
            Ok(())
        }
        Commands::Loop {
            input,
            output,
            start,
            end,
        } => write_loop(&input, &output, start, end),
        Commands::Resolve {
            source,
            default_path,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if default_path.is_some() {
                config.conversion.default_path = default_path;
            }
            resolve(&source, config)
        }
        Commands::Convert {
            source,
            destination,
            overwrite,
            default_path,
        } => {
            // Apply CLI overrides
            let mut config = load_config(cli.config.as_deref())?;
            if default_path.is_some() {
                config.conversion.default_path = default_path;
            }
            if let Some(overwrite) = overwrite {
                config.output.overwrite = overwrite;
            }
            run_convert(&source, &destination, config)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(Config::load_or_default()),
    }
}

fn resolve(source: &Path, config: Config) -> Result<()> {
    let content = fs::read(source).with_context(|| format!("Failed to read {}", source.display()))?;
    let session = ConversionSession::new(Schema::standard(), config.conversion);
    let resolution = session
        .resolve_bytes(&content)
        .with_context(|| format!("Failed to resolve {}", source.display()))?;

    for violation in &resolution.violations {
        log::info!("Dropped unsupported opcode {}", violation);
    }
    print!("{}", resolution.tree);
    Ok(())
}

fn run_convert(source: &Path, destination: &Path, config: Config) -> Result<()> {
    log::info!("Converting {} into {}", source.display(), destination.display());

    let session = ConversionSession::new(Schema::standard(), config.conversion);
    let confirm: ConfirmOverwrite = Box::new(ask_overwrite);
    let report = convert(
        source,
        destination,
        &session,
        config.output.overwrite,
        Some(confirm),
    )?;

    for failure in &report.loop_failures {
        log::warn!("Copied without a loop: {}", failure);
    }
    for failure in &report.failures {
        log::warn!("{}", failure);
    }
    println!(
        "Wrote {} ({} samples, {} loops, {} unsupported opcodes dropped)",
        report.instrument.display(),
        report.samples_written,
        report.loops_written,
        report.dropped_opcodes
    );
    if !report.failures.is_empty() {
        anyhow::bail!("{} samples could not be converted", report.failures.len());
    }
    Ok(())
}

fn write_loop(input: &Path, output: &Path, start: u32, end: u32) -> Result<()> {
    let bytes = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let looped = nanoconv_riff::add_loop_to_wave(&bytes, start, end)
        .with_context(|| format!("Failed to add a loop to {}", input.display()))?;
    fs::write(output, looped).with_context(|| format!("Failed to write {}", output.display()))?;
    log::info!("Wrote loop {}..{} into {}", start, end, output.display());
    Ok(())
}

fn ask_overwrite(path: &Path) -> bool {
    print!("Overwrite {}? [y/N] ", path.display());
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
