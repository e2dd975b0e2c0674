//! Codec parameter report.

use crate::ParamsArgs;
use anyhow::{Context, Result};
use dcpenc_core::params::DCI_PRECISION;
use dcpenc_core::{CodecParameters, Config};
use tracing::trace;

/// Prints the parameters the encoder would use.
pub fn run(args: ParamsArgs, config: &Config, verbose: u8) -> Result<()> {
    trace!(fps = args.fps, "params::run");

    let bandwidth = args.bandwidth.unwrap_or(config.j2k_bandwidth);
    let params = CodecParameters::build(args.fps, bandwidth, args.width, args.height, DCI_PRECISION)
        .context("Invalid codec parameters")?;
    print!("{}", format_params(&params, verbose > 0));
    Ok(())
}

fn format_params(p: &CodecParameters, detailed: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!("Frame rate:      {} fps\n", p.frames_per_second));
    out.push_str(&format!("Bandwidth:       {} bit/s\n", p.bandwidth));
    out.push_str(&format!("Size:            {}x{} @ {} bits\n", p.width, p.height, p.precision));
    out.push_str(&format!("max_cs_len:      {} bytes\n", p.max_cs_len));
    out.push_str(&format!("max_comp_size:   {} bytes\n", p.max_comp_size));
    out.push_str(&format!("Rate:            {:.3}\n", p.rate));
    if detailed {
        out.push_str(&format!("Code block:      {}x{}\n", p.code_block.0, p.code_block.1));
        out.push_str(&format!("Progression:     {:?}\n", p.progression));
        out.push_str(&format!("Wavelet:         {:?}\n", p.wavelet));
        out.push_str(&format!("MCT:             {}\n", p.mct));
        out.push_str(&format!("Profile:         {:?}\n", p.profile));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_budget() {
        let params = CodecParameters::build(24.0, 125_000_000, 1998, 1080, DCI_PRECISION).unwrap();
        let text = format_params(&params, false);
        assert!(text.contains("max_cs_len:      651041 bytes"), "{text}");
        assert!(text.contains("max_comp_size:   520833 bytes"), "{text}");
        assert!(!text.contains("Progression"));
        assert!(format_params(&params, true).contains("Progression:     Cprl"));
    }
}
