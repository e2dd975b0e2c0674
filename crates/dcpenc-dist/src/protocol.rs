//! Encode request header.
//!
//! A request is one line of space-separated ASCII fields terminated by NUL,
//! followed immediately by the raw bytes of every image plane:
//!
//! ```text
//! encode <in_w> <in_h> <pix_fmt> <out_w> <out_h> <padding> <scaler> <frame> <fps> <post|none> <lut> <bandwidth> <line_size>...
//! ```
//!
//! | Field       | Meaning                                           |
//! |-------------|---------------------------------------------------|
//! | `pix_fmt`   | FFmpeg pixel format number                        |
//! | `scaler`    | scaler id, e.g. `bicubic`                         |
//! | `post`      | post-process chain, `none` when absent            |
//! | `lut`       | colour LUT index                                  |
//! | `line_size` | stride of each plane in bytes, one per plane      |

use std::fmt;

use dcpenc_core::{ColourLut, Error, FrameJob, Image, PixelFormat, Result, Scaler, Size};

/// Request verb.
pub const COMMAND: &str = "encode";

/// Longest accepted request header, terminator included.
pub const MAX_HEADER_LEN: usize = 1024;

/// Largest accepted input width or height.
pub const MAX_DIMENSION: u32 = 8192;

/// Largest accepted payload across all planes of one request.
pub const MAX_PAYLOAD_LEN: usize = 256 * 1024 * 1024;

/// Fields before the per-plane line sizes.
const FIXED_FIELDS: usize = 13;

/// Header of one encode request.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeRequest {
    /// Size of the shipped image.
    pub input_size: Size,
    /// Layout of the shipped image.
    pub pixel_format: PixelFormat,
    /// DCP container size.
    pub out_size: Size,
    /// Black columns on each side.
    pub padding: u32,
    /// Resampling filter.
    pub scaler: Scaler,
    /// Frame index.
    pub frame: u32,
    /// Integer frame rate.
    pub frames_per_second: u32,
    /// Post-process chain.
    pub post_process: Option<String>,
    /// Colour profile.
    pub colour_lut: ColourLut,
    /// Bandwidth target in bits per second.
    pub bandwidth: u64,
    /// Stride of each plane.
    pub line_sizes: Vec<usize>,
}

impl EncodeRequest {
    /// Describes `job` and the layout of its image.
    pub fn from_job(job: &FrameJob) -> Self {
        let image = job.image();
        Self {
            input_size: image.size(),
            pixel_format: image.pixel_format(),
            out_size: job.out_size(),
            padding: job.padding(),
            scaler: job.scaler(),
            frame: job.frame(),
            frames_per_second: job.frames_per_second(),
            post_process: job.post_process().map(|s| s.split_whitespace().collect()),
            colour_lut: job.colour_lut(),
            bandwidth: job.bandwidth(),
            line_sizes: image.planes().iter().map(|p| p.line_size()).collect(),
        }
    }

    /// Header text without the terminating NUL.
    pub fn to_header(&self) -> String {
        self.to_string()
    }

    /// Header bytes as sent, NUL included.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut bytes = self.to_header().into_bytes();
        bytes.push(0);
        bytes
    }

    /// Number of payload bytes following the header, per plane.
    ///
    /// Fails when a plane or the whole payload would exceed
    /// [`MAX_PAYLOAD_LEN`].
    pub fn plane_lengths(&self) -> Result<Vec<usize>> {
        let mut total = 0usize;
        let mut lengths = Vec::with_capacity(self.line_sizes.len());
        for (i, &stride) in self.line_sizes.iter().enumerate() {
            let lines = self.pixel_format.plane_lines(i, self.input_size);
            let len = stride
                .checked_mul(lines)
                .and_then(|len| total.checked_add(len).map(|t| (len, t)))
                .filter(|&(_, t)| t <= MAX_PAYLOAD_LEN);
            let Some((len, sum)) = len else {
                return Err(Error::invalid_parameter(format!(
                    "plane {i} of {stride} x {lines} bytes exceeds the {MAX_PAYLOAD_LEN} byte payload limit"
                )));
            };
            total = sum;
            lengths.push(len);
        }
        Ok(lengths)
    }

    /// Parses a header received from `peer`, terminator already stripped.
    pub fn parse(peer: &str, header: &[u8]) -> Result<Self> {
        let bad = |reason: String| Error::protocol(peer, reason);

        let text = std::str::from_utf8(header)
            .map_err(|_| bad("request header is not ASCII".into()))?;
        let fields: Vec<&str> = text.split_ascii_whitespace().collect();
        if fields.first() != Some(&COMMAND) {
            return Err(bad(format!("unknown request '{}'", truncate(text))));
        }
        if fields.len() < FIXED_FIELDS {
            return Err(bad(format!(
                "request has {} fields, expected at least {}",
                fields.len(),
                FIXED_FIELDS + 1
            )));
        }

        let pixel_format = PixelFormat::from_ffmpeg_id(number(peer, "pixel format", fields[3])?)
            .map_err(|e| bad(e.to_string()))?;
        let input_size = Size::new(
            number(peer, "input width", fields[1])?,
            number(peer, "input height", fields[2])?,
        );
        if input_size.width == 0
            || input_size.height == 0
            || input_size.width > MAX_DIMENSION
            || input_size.height > MAX_DIMENSION
        {
            return Err(bad(format!(
                "input size {}x{} outside 1..={MAX_DIMENSION}",
                input_size.width, input_size.height
            )));
        }
        let out_size = Size::new(
            number(peer, "output width", fields[4])?,
            number(peer, "output height", fields[5])?,
        );
        let scaler = Scaler::from_id(fields[7]).map_err(|e| bad(e.to_string()))?;
        let post_process = match fields[10] {
            "none" => None,
            chain => Some(chain.to_string()),
        };
        let colour_lut =
            ColourLut::from_index(number(peer, "colour LUT", fields[11])?).map_err(|e| bad(e.to_string()))?;

        let line_sizes = fields[FIXED_FIELDS..]
            .iter()
            .map(|f| number(peer, "line size", f))
            .collect::<Result<Vec<usize>>>()?;
        if line_sizes.len() != pixel_format.planes() {
            return Err(bad(format!(
                "{pixel_format} has {} planes but {} line sizes were sent",
                pixel_format.planes(),
                line_sizes.len()
            )));
        }
        for (i, &stride) in line_sizes.iter().enumerate() {
            let min = pixel_format.min_line_size(i, input_size);
            if stride < min {
                return Err(bad(format!("plane {i} line size {stride} is below {min}")));
            }
        }

        let request = Self {
            input_size,
            pixel_format,
            out_size,
            padding: number(peer, "padding", fields[6])?,
            scaler,
            frame: number(peer, "frame", fields[8])?,
            frames_per_second: number(peer, "frames per second", fields[9])?,
            post_process,
            colour_lut,
            bandwidth: number(peer, "bandwidth", fields[12])?,
            line_sizes,
        };
        request.plane_lengths().map_err(|e| bad(e.to_string()))?;
        Ok(request)
    }

    /// Rebuilds the job from this header and the received plane bytes.
    pub fn into_job(self, planes: Vec<Vec<u8>>) -> Result<FrameJob> {
        let image = Image::from_planes(
            self.pixel_format,
            self.input_size,
            self.line_sizes.into_iter().zip(planes).collect(),
        )?;
        FrameJob::builder(image, self.out_size, self.frame)
            .padding(self.padding)
            .scaler(self.scaler)
            .frame_rate(self.frames_per_second as f32)
            .post_process(self.post_process)
            .colour_lut(self.colour_lut)
            .bandwidth(self.bandwidth)
            .build()
    }
}

impl fmt::Display for EncodeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{COMMAND} {} {} {} {} {} {} {} {} {} {} {} {}",
            self.input_size.width,
            self.input_size.height,
            self.pixel_format.ffmpeg_id(),
            self.out_size.width,
            self.out_size.height,
            self.padding,
            self.scaler.id(),
            self.frame,
            self.frames_per_second,
            self.post_process.as_deref().unwrap_or("none"),
            self.colour_lut.index(),
            self.bandwidth,
        )?;
        for stride in &self.line_sizes {
            write!(f, " {stride}")?;
        }
        Ok(())
    }
}

fn number<T: std::str::FromStr>(peer: &str, what: &str, field: &str) -> Result<T> {
    field
        .parse()
        .map_err(|_| Error::protocol(peer, format!("bad {what} '{field}'")))
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(32) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> FrameJob {
        let image = Image::solid_rgb(Size::new(4, 2), [1, 2, 3]).unwrap();
        FrameJob::builder(image, Size::new(8, 4), 17)
            .padding(1)
            .scaler(Scaler::Lanczos)
            .frame_rate(25.0)
            .colour_lut(ColourLut::Rec709)
            .bandwidth(100_000_000)
            .build()
            .unwrap()
    }

    #[test]
    fn test_header_text() {
        let request = EncodeRequest::from_job(&job());
        assert_eq!(
            request.to_header(),
            "encode 4 2 2 8 4 1 lanczos 17 25 none 1 100000000 12"
        );
        assert_eq!(request.to_wire().last(), Some(&0));
        assert_eq!(request.plane_lengths().unwrap(), vec![24]);
    }

    #[test]
    fn test_parse_rebuilds_job() {
        let original = job();
        let request = EncodeRequest::from_job(&original);
        let parsed = EncodeRequest::parse("peer", request.to_header().as_bytes()).unwrap();
        assert_eq!(parsed, request);

        let planes = original
            .image()
            .planes()
            .iter()
            .map(|p| p.data().to_vec())
            .collect();
        assert_eq!(parsed.into_job(planes).unwrap(), original);
    }

    #[test]
    fn test_parse_yuv_with_post_process() {
        let header = b"encode 16 8 0 32 16 0 bicubic 3 24 hb,vb 0 250000000 16 8 8";
        let request = EncodeRequest::parse("peer", header).unwrap();
        assert_eq!(request.pixel_format, PixelFormat::Yuv420p);
        assert_eq!(request.post_process.as_deref(), Some("hb,vb"));
        assert_eq!(request.plane_lengths().unwrap(), vec![128, 32, 32]);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let cases: [&[u8]; 6] = [
            b"decode 4 2 2 8 4 0 bicubic 0 24 none 0 1 12",
            b"encode 4 2 2 8 4 0 bicubic 0 24 none 0 1",
            b"encode 4 2 9 8 4 0 bicubic 0 24 none 0 1 12",
            b"encode 4 2 2 8 4 0 sinc 0 24 none 0 1 12",
            b"encode 4 2 2 8 4 0 bicubic 0 24 none 7 1 12",
            b"encode 4 2 2 8 4 0 bicubic 0 24 none 0 1 12 12",
        ];
        for header in cases {
            let err = EncodeRequest::parse("peer", header).unwrap_err();
            assert!(err.is_network(), "{err}");
        }
        assert!(EncodeRequest::parse("peer", &[0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_parse_rejects_oversized_requests() {
        let cases: [&[u8]; 5] = [
            b"encode 4 2 2 8 4 0 bicubic 0 24 none 0 250000000 18446744073709551615",
            b"encode 4 2 2 8 4 0 bicubic 0 24 none 0 250000000 4000000000000",
            b"encode 4 2 2 8 4 0 bicubic 0 24 none 0 250000000 11",
            b"encode 0 2 2 8 4 0 bicubic 0 24 none 0 250000000 12",
            b"encode 8193 2 2 8 4 0 bicubic 0 24 none 0 250000000 24579",
        ];
        for header in cases {
            let err = EncodeRequest::parse("peer", header).unwrap_err();
            assert!(matches!(err, Error::Protocol { .. }), "{err}");
        }

        let largest = format!(
            "encode {MAX_DIMENSION} {MAX_DIMENSION} 2 8 4 0 bicubic 0 24 none 0 250000000 {}",
            MAX_DIMENSION * 3
        );
        let request = EncodeRequest::parse("peer", largest.as_bytes()).unwrap();
        let total: usize = request.plane_lengths().unwrap().iter().sum();
        assert!(total <= MAX_PAYLOAD_LEN);
    }

    #[test]
    fn test_plane_lengths_rejects_overflow() {
        let mut request = EncodeRequest::from_job(&job());
        request.line_sizes = vec![usize::MAX];
        assert!(request.plane_lengths().unwrap_err().is_invalid_parameter());
    }

    #[test]
    fn test_into_job_checks_plane_sizes() {
        let request = EncodeRequest::from_job(&job());
        let err = request.into_job(vec![vec![0; 5]]).unwrap_err();
        assert!(err.is_invalid_parameter());
    }
}
