//! Retrograde - audio reversal and pitch/speed playback from the shell
//!
//! ## Subcommands
//!
//! - `reverse <INPUT> <OUTPUT>`: write the time-reversed input as WAV
//! - `info <INPUT>`: print the container or decoded track format
//! - `render <INPUT> <OUTPUT>`: offline pass through the pitch/speed graph
//! - `serve`: answer JSON messages on stdin, one reply line each on stdout
//!
//! Set RUST_LOG for finer control over log output; `--verbose` raises the
//! default filter to debug.

mod info;
mod render;
mod serve;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use retrograde_core::config::{self, Config};

#[derive(Parser)]
#[command(name = "retrograde")]
#[command(about = "Frame-accurate audio reversal and playback control", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reverse an audio file into a WAV file
    Reverse {
        /// Audio file to reverse (WAV is reversed directly, anything else is decoded)
        input: PathBuf,
        /// Destination WAV file
        output: PathBuf,
    },
    /// Show the format of an audio file
    Info {
        input: PathBuf,
    },
    /// Render a file through the playback graph at a given pitch and speed
    Render {
        input: PathBuf,
        /// Destination WAV file
        output: PathBuf,
        /// Pitch ratio (0.5 to 2.0)
        #[arg(long, default_value_t = 1.0)]
        pitch: f32,
        /// Speed ratio (0.25 to 4.0)
        #[arg(long, default_value_t = 1.0)]
        speed: f32,
    },
    /// Serve reversal and playback requests as JSON lines on stdin/stdout
    Serve,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();

    let config_path = cli.config.unwrap_or_else(config::default_config_path);
    let config = Config::load(&config_path);

    match cli.command {
        Commands::Reverse { input, output } => {
            if retrograde_core::reverse(&input, &output) {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Info { input } => {
            println!("{}", info::describe(&input)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Render {
            input,
            output,
            pitch,
            speed,
        } => {
            render::run(&input, &output, pitch, speed)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Serve => {
            log::info!("retrograde serve: reading messages from stdin");
            serve::run(&config, io::stdin().lock(), io::stdout())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
