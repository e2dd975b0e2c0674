//! dcpenc - DCI JPEG2000 frame encoder
//!
//! Encodes PNG frames into cinema-profile J2K codestreams, locally or on
//! encode servers, and runs the encode server itself.

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "dcpenc")]
#[command(author, version, about = "DCI JPEG2000 frame encoder")]
#[command(long_about = "
Encodes frames into JPEG2000 codestreams for 2K digital cinema packages.
Frames can be encoded on this machine or shipped to encode servers.

Examples:
  dcpenc encode frames/*.png -o j2c/                 # Encode locally
  dcpenc encode f.png -o j2c/ --fps 25 --lut rec709
  dcpenc encode frames/*.png -o j2c/ -w 1998 -H 1080 --padding 10
  dcpenc encode frames/*.png -o j2c/ --server render1 --server render2:7000
  dcpenc serve --port 6192 --threads 8              # Run an encode server
  dcpenc params --fps 24 --bandwidth 125000000      # Show codec parameters
  RUST_LOG=dcpenc_dist=debug dcpenc serve
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (repeat for more: -v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Also write log output to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode PNG frames to J2K files
    #[command(visible_alias = "e")]
    Encode(EncodeArgs),

    /// Run an encode server
    #[command(visible_alias = "s")]
    Serve(ServeArgs),

    /// Print the codec parameters derived for a frame rate and bandwidth
    #[command(visible_alias = "p")]
    Params(ParamsArgs),
}

/// Arguments for the `encode` command.
#[derive(Args)]
struct EncodeArgs {
    /// Input PNG frames, in frame order
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory for `<index>.j2c` files
    #[arg(short, long)]
    output: PathBuf,

    /// Source frame rate
    #[arg(long, default_value = "24")]
    fps: f32,

    /// Bandwidth target in bits per second (default: from config)
    #[arg(short, long)]
    bandwidth: Option<u64>,

    /// Colour profile: srgb, rec709 or a LUT index (default: from config)
    #[arg(short, long)]
    lut: Option<String>,

    /// Output width (default: input width)
    #[arg(short, long)]
    width: Option<u32>,

    /// Output height (default: input height)
    #[arg(short = 'H', long)]
    height: Option<u32>,

    /// Black columns on each side of the picture
    #[arg(long, default_value = "0")]
    padding: u32,

    /// Scaler: point, area, bilinear, fastbicubic, bicubic, lanczos
    #[arg(long, default_value = "bicubic")]
    scaler: String,

    /// Post-process chain, e.g. hb,vb,dr
    #[arg(long)]
    post_process: Option<String>,

    /// Encode server as host[:port]; repeat to spread frames (default: from config)
    #[arg(short, long)]
    server: Vec<String>,

    /// Encode everything on this machine, ignoring configured servers
    #[arg(long)]
    local: bool,

    /// Index of the first frame
    #[arg(long, default_value = "0")]
    start_index: u32,

    /// Frames encoded in parallel (default: from config)
    #[arg(short = 'j', long)]
    threads: Option<usize>,
}

/// Arguments for the `serve` command.
#[derive(Args)]
struct ServeArgs {
    /// Listen port (default: from config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Listen address
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Encode worker threads (default: from config)
    #[arg(short = 'j', long)]
    threads: Option<usize>,
}

/// Arguments for the `params` command.
#[derive(Args)]
struct ParamsArgs {
    /// Source frame rate
    #[arg(long, default_value = "24")]
    fps: f32,

    /// Bandwidth target in bits per second (default: from config)
    #[arg(short, long)]
    bandwidth: Option<u64>,

    /// Frame width
    #[arg(short, long, default_value = "1998")]
    width: u32,

    /// Frame height
    #[arg(short = 'H', long, default_value = "1080")]
    height: u32,
}

/// Installs the global subscriber: stderr, plus `log_file` when given.
///
/// `RUST_LOG` wins over the `-v` level.
fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let stderr = fmt::layer().with_writer(std::io::stderr).with_target(verbose > 2);

    let Some(path) = log_file else {
        tracing_subscriber::registry().with(filter).with(stderr).init();
        return Ok(None);
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let name = path
        .file_name()
        .with_context(|| format!("Log file {} has no file name", path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();
    Ok(Some(guard))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.verbose, cli.log_file.as_deref())?;
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Encode(args) => commands::encode::run(args, &config, cli.verbose),
        Commands::Serve(args) => commands::serve::run(args, &config, cli.verbose),
        Commands::Params(args) => commands::params::run(args, &config, cli.verbose),
    }
}
