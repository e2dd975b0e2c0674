//! Local frame encoding.
//!
//! [`encode_locally`] takes a [`FrameJob`] all the way to a codestream on
//! the calling thread: post-process, scale into the output container,
//! convert to X'Y'Z', derive the codec parameters and compress.

use dcpenc_color::{convert_frame, XyzFrame};
use dcpenc_core::params::DCI_PRECISION;
use dcpenc_core::{CodecParameters, Error, FrameJob, Result};
use dcpenc_io::EncodedData;
use sha2::{Digest, Sha256};
use tracing::{debug, info, trace};

use crate::container::{Compressor, EncoderParameters, ImageContainer, OutputStream};

/// Encodes one frame on this thread.
pub fn encode_locally(job: &FrameJob) -> Result<EncodedData> {
    let frame = job.frame();
    let rgb = job.prepare_rgb()?;
    let xyz = convert_frame(&rgb, job.colour_lut())?;
    let params = job.codec_parameters()?;
    debug!(
        frame,
        size = %xyz.size(),
        fps = params.frames_per_second,
        max_cs_len = params.max_cs_len,
        rate = params.rate,
        "encoding frame"
    );

    let encoded = compress(&xyz, &params, frame)?;
    info!("Finished locally-encoded frame {frame}");
    Ok(encoded)
}

/// Compresses prepared X'Y'Z' planes with `params`.
///
/// The codec sees the frame exactly as given; its size must match
/// `params.width` by `params.height`.
pub fn compress(xyz: &XyzFrame, params: &CodecParameters, frame: u32) -> Result<EncodedData> {
    let size = xyz.size();
    if (size.width, size.height) != (params.width, params.height) {
        return Err(Error::invalid_parameter(format!(
            "frame {frame} is {size} but codec parameters are for {}x{}",
            params.width, params.height
        )));
    }
    if params.precision != DCI_PRECISION {
        return Err(Error::invalid_parameter(format!(
            "precision {} is not the DCI {DCI_PRECISION} bits",
            params.precision
        )));
    }

    if tracing::enabled!(tracing::Level::TRACE) {
        for (c, name) in xyz.components().iter().zip(["X", "Y", "Z"]) {
            let mut hasher = Sha256::new();
            for v in c {
                hasher.update(v.to_le_bytes());
            }
            trace!(frame, component = name, sha256 = %format!("{:x}", hasher.finalize()), "J2K input");
        }
    }

    let image = ImageContainer::new(xyz, params.precision, frame)?;
    let mut parameters = EncoderParameters::new(params)?;
    let mut compressor = Compressor::new(frame)?;
    compressor.setup(&mut parameters, &image)?;

    let mut stream = OutputStream::new(frame)?;
    compressor.compress(&image, &mut stream)?;
    let bytes = stream.take_bytes();
    if bytes.is_empty() {
        return Err(Error::encode(frame, "codec produced no output"));
    }

    let encoded = EncodedData::from_codec(bytes);
    trace!(frame, bytes = encoded.len(), sha256 = %encoded.digest(), "J2K output");
    Ok(encoded)
}
