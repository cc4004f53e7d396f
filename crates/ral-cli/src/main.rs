//! RAL compiler CLI entry point.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rhizome_ral_compiler::{CompileOutput, CompilerConfig, Unit};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ralc")]
#[command(about = "Compile RAL units to CAOS")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a resolved unit (JSON) to CAOS
    Compile {
        /// Input unit file (or - for stdin)
        file: String,

        /// Compiler config (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output file (defaults to the input with a .cos extension)
        #[arg(short, long, conflicts_with = "stdout")]
        out: Option<String>,

        /// Write to stdout instead of file
        #[arg(long)]
        stdout: bool,

        /// Print diagnostics as JSON
        #[arg(long)]
        json_diagnostics: bool,
    },

    /// Check a unit for errors without writing output
    Check {
        /// Input unit file (or - for stdin)
        file: String,

        /// Compiler config (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print diagnostics as JSON
        #[arg(long)]
        json_diagnostics: bool,
    },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rhizome_ral=info,ralc=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e}");
            eprintln!("ralc: {e}");
            ExitCode::from(2)
        }
    }
}

/// Returns whether the unit compiled without errors.
fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Compile {
            file,
            config,
            out,
            stdout,
            json_diagnostics,
        } => {
            let output = compile_file(&file, config)?;
            report(&output, json_diagnostics)?;
            if !output.is_ok() {
                return Ok(false);
            }

            if stdout {
                print!("{}", output.code);
            } else {
                let out_path = match out {
                    Some(path) => path,
                    None if file == "-" => "output.cos".to_string(),
                    None => file
                        .strip_suffix(".json")
                        .map_or_else(|| format!("{file}.cos"), |stem| format!("{stem}.cos")),
                };
                std::fs::write(&out_path, &output.code)?;
                info!(path = %out_path, "wrote output");
                println!("Wrote: {out_path}");
            }
            Ok(true)
        }

        Commands::Check {
            file,
            config,
            json_diagnostics,
        } => {
            let output = compile_file(&file, config)?;
            report(&output, json_diagnostics)?;
            Ok(output.is_ok())
        }
    }
}

fn compile_file(
    file: &str,
    config: Option<PathBuf>,
) -> Result<CompileOutput, Box<dyn std::error::Error>> {
    let config = match config {
        Some(path) => CompilerConfig::from_file(path)?,
        None => CompilerConfig::default(),
    };
    let input = if file == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(file)?
    };

    let unit = Unit::from_json(&input)?;
    info!(
        file,
        declarations = unit.declarations.len(),
        events = unit.events.len(),
        "compiling unit"
    );
    Ok(unit.compile(&config))
}

fn report(output: &CompileOutput, json: bool) -> Result<(), serde_json::Error> {
    if json {
        if !output.diagnostics.is_empty() {
            eprintln!("{}", serde_json::to_string_pretty(&output.diagnostics)?);
        }
    } else {
        for diagnostic in &output.diagnostics {
            eprintln!("{diagnostic}");
        }
    }
    Ok(())
}
