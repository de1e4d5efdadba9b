//! `wgscan`: prefix sums and 2D convolution on the GPU.
//!
//! ```bash
//! # Inclusive prefix sum of "N x1 .. xN"
//! wgscan scan input.txt -o output.txt
//!
//! # Convolution of "n m A M"
//! wgscan convolve input.txt
//!
//! # Without a GPU
//! wgscan --backend host scan < input.txt
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::executor::block_on;
use tracing::info;
use tracing_subscriber::EnvFilter;

use wgscan::{
    convolve, io, scan_inclusive, Backend, CompileOptions, DeviceExecutor, HostExecutor, Power,
    RunConfig, WgContext, WgpuExecutor, DEFAULT_BLOCK_SIZE,
};

#[derive(Parser, Debug)]
#[command(name = "wgscan")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Device that runs the kernels
    #[arg(long, value_enum, env = "WGSCAN_BACKEND", default_value = "gpu")]
    backend: Backend,

    /// Scan work-group size and per-level reduction factor
    #[arg(long, env = "WGSCAN_BLOCK_SIZE", default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,

    /// Adapter preference
    #[arg(long, value_enum, default_value = "high")]
    power: Power,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Inclusive prefix sum of a count followed by that many numbers
    Scan {
        /// Input file (stdin if omitted)
        input: Option<PathBuf>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Zero-padded correlation of an n x n matrix with an m x m mask
    Convolve {
        /// Input file (stdin if omitted)
        input: Option<PathBuf>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn open_input(path: Option<&PathBuf>) -> Result<Box<dyn Read>> {
    let reader: Box<dyn Read> = match path {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        )),
        None => Box::new(std::io::stdin().lock()),
    };
    Ok(reader)
}

fn open_output(path: Option<&PathBuf>) -> Result<Box<dyn Write>> {
    let writer: Box<dyn Write> = match path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(std::io::stdout().lock()),
    };
    Ok(writer)
}

fn run_with<E: DeviceExecutor>(executor: &E, command: &Commands) -> Result<()> {
    match command {
        Commands::Scan { input, output } => {
            let mut array = io::read_array(open_input(input.as_ref())?)?;
            info!(len = array.len(), "scanning");
            scan_inclusive(executor, &mut array)?;
            io::write_array(open_output(output.as_ref())?, &array)?;
        }
        Commands::Convolve { input, output } => {
            let (a, mask) = io::read_convolution_input(open_input(input.as_ref())?)?;
            info!(n = a.size(), m = mask.size(), "convolving");
            let c = convolve(executor, &a, &mask)?;
            io::write_matrix(open_output(output.as_ref())?, &c)?;
        }
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let config = RunConfig {
        block_size: cli.block_size,
        backend: cli.backend,
        power: cli.power,
    };
    config.validate()?;

    match config.backend {
        Backend::Gpu => {
            let context = block_on(WgContext::with_power_preference(config.power.into()))?;
            let executor = WgpuExecutor::new(
                context,
                CompileOptions {
                    block_size: config.block_size,
                },
            )?;
            run_with(&executor, &cli.command)
        }
        Backend::Host => {
            let executor = HostExecutor::new(config.block_size)?;
            run_with(&executor, &cli.command)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e
                .downcast_ref::<wgscan::Error>()
                .map_or(wgscan::error::code::IO, wgscan::Error::code);
            eprintln!("{e:#} : {code}");
            ExitCode::FAILURE
        }
    }
}
