//! Frame encoding command.
//!
//! Frames are spread round-robin over the configured encode servers. A frame
//! whose server fails is encoded on this machine instead.

use crate::EncodeArgs;
use anyhow::{bail, Context, Result};
use dcpenc_core::{ColourLut, Config, FrameJob, Image, Scaler, ServerDescriptor, Size};
use dcpenc_dist::FrameEncoder;
use dcpenc_io::EncodedData;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Settings shared by every frame of one run.
#[derive(Debug)]
struct Plan {
    output: PathBuf,
    width: Option<u32>,
    height: Option<u32>,
    padding: u32,
    scaler: Scaler,
    fps: f32,
    post_process: Option<String>,
    lut: ColourLut,
    bandwidth: u64,
    start_index: u32,
    encoders: Vec<FrameEncoder>,
}

impl Plan {
    fn new(args: &EncodeArgs, config: &Config) -> Result<Self> {
        let lut = match &args.lut {
            Some(s) => super::parse_lut(s)?,
            None => config.colour_lut()?,
        };
        let scaler: Scaler = args.scaler.parse()?;

        let servers: Vec<ServerDescriptor> = if args.local {
            Vec::new()
        } else if args.server.is_empty() {
            config.server_descriptors()?
        } else {
            args.server
                .iter()
                .map(|s| ServerDescriptor::parse(s, config.server_port))
                .collect::<dcpenc_core::Result<_>>()?
        };
        let timeout = config.socket_timeout();
        let mut encoders: Vec<FrameEncoder> = servers
            .into_iter()
            .map(|s| FrameEncoder::remote(s, timeout))
            .collect();
        if encoders.is_empty() {
            encoders.push(FrameEncoder::Local);
        }

        Ok(Self {
            output: args.output.clone(),
            width: args.width,
            height: args.height,
            padding: args.padding,
            scaler,
            fps: args.fps,
            post_process: args.post_process.clone(),
            lut,
            bandwidth: args.bandwidth.unwrap_or(config.j2k_bandwidth),
            start_index: args.start_index,
            encoders,
        })
    }

    fn encoder_for(&self, index: usize) -> &FrameEncoder {
        &self.encoders[index % self.encoders.len()]
    }

    fn job(&self, image: Image, frame: u32) -> Result<FrameJob> {
        let input = image.size();
        let out_size = Size::new(
            self.width.unwrap_or(input.width),
            self.height.unwrap_or(input.height),
        );
        let job = FrameJob::builder(image, out_size, frame)
            .padding(self.padding)
            .scaler(self.scaler)
            .frame_rate(self.fps)
            .post_process(self.post_process.as_deref())
            .colour_lut(self.lut)
            .bandwidth(self.bandwidth)
            .build()?;
        Ok(job)
    }

    fn encode_file(&self, index: usize, input: &Path) -> Result<PathBuf> {
        let frame = self
            .start_index
            .checked_add(u32::try_from(index)?)
            .context("Frame index overflow")?;
        trace!(frame, input = %input.display(), "encode_file");

        let image = super::load_png(input)?;
        let job = self
            .job(image, frame)
            .with_context(|| format!("Invalid job for {}", input.display()))?;
        let encoded = encode_with_fallback(self.encoder_for(index), &job)
            .with_context(|| format!("Failed to encode {}", input.display()))?;
        let path = encoded
            .write(&self.output, frame)
            .with_context(|| format!("Failed to write frame {frame}"))?;
        debug!(frame, path = %path.display(), bytes = encoded.len(), origin = %encoded.origin(), "frame written");
        Ok(path)
    }
}

/// Encodes with `encoder`, retrying on this machine if a server fails.
fn encode_with_fallback(encoder: &FrameEncoder, job: &FrameJob) -> dcpenc_core::Result<EncodedData> {
    match encoder.encode(job) {
        Err(e) if encoder.is_remote() && e.is_network() => {
            warn!(frame = job.frame(), "{encoder} failed ({e}); encoding locally");
            FrameEncoder::Local.encode(job)
        }
        other => other,
    }
}

/// Runs the encode command.
pub fn run(args: EncodeArgs, config: &Config, verbose: u8) -> Result<()> {
    trace!(inputs = args.inputs.len(), output = %args.output.display(), "encode::run");

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    let plan = Plan::new(&args, config)?;
    let threads = args.threads.unwrap_or(config.num_local_encoding_threads);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("Failed to configure thread pool")?;

    info!(
        frames = args.inputs.len(),
        threads = pool.current_num_threads(),
        encoders = plan.encoders.len(),
        lut = %plan.lut,
        bandwidth = plan.bandwidth,
        "Starting encode"
    );
    if verbose > 0 {
        println!(
            "Encoding {} frames to {} ({})",
            args.inputs.len(),
            args.output.display(),
            plan.encoders
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let started = Instant::now();
    let results: Vec<Result<PathBuf>> = pool.install(|| {
        args.inputs
            .par_iter()
            .enumerate()
            .map(|(index, input)| plan.encode_file(index, input))
            .collect()
    });

    let mut success = 0;
    let mut failed = 0;
    for r in results {
        match r {
            Ok(path) => {
                success += 1;
                if verbose > 1 {
                    println!("  {}", path.display());
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("Error: {e:#}");
            }
        }
    }

    let elapsed = started.elapsed().as_secs_f64();
    info!(success, failed, elapsed, "Encode complete");
    println!("Encoded: {success} frames, {failed} failed in {elapsed:.1}s");

    if failed > 0 {
        bail!("{failed} frames failed");
    }
    Ok(())
}
