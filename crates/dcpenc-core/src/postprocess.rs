//! Post-processing filters applied to decoded frames before scaling.
//!
//! A post-process string is a chain of filter names separated by `,` or
//! `/`, each optionally followed by `:`-separated options, e.g.
//! `"hb:a,vb:a,dr:a,al"`. Options are accepted for compatibility and
//! otherwise ignored.
//!
//! | Name | Effect |
//! |------|--------|
//! | `hb` | horizontal deblock across 8-pixel block edges |
//! | `vb` | vertical deblock across 8-line block edges |
//! | `dr` | dering: smooth flat areas with a 3x3 average |
//! | `al` | auto levels: stretch luma (or RGB) to the full range |
//! | `lb` | linear blend deinterlace |
//! | `md` | median deinterlace |
//! | `tn` | noise reduction: 3x3 median |
//! | `de`, `default` | `hb,vb,dr,al` |
//!
//! Filters run on every sample channel of every plane, except `al` which
//! only touches luma on Y'CbCr input.

use tracing::debug;

use crate::{Error, Image, Result};

/// Largest step across a block edge that deblocking will smooth.
const DEBLOCK_THRESHOLD: i32 = 24;

/// Largest deviation from the local mean that deringing will smooth.
const DERING_THRESHOLD: i32 = 16;

/// Block size of the codecs whose artefacts the deblock filters target.
const BLOCK: usize = 8;

/// A single post-processing filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    /// Horizontal deblocking.
    HorizontalDeblock,
    /// Vertical deblocking.
    VerticalDeblock,
    /// Deringing.
    Dering,
    /// Automatic level stretch.
    AutoLevels,
    /// Linear blend deinterlacer.
    LinearBlend,
    /// Median deinterlacer.
    MedianDeinterlace,
    /// 3x3 median noise reduction.
    Denoise,
}

impl PostFilter {
    fn from_name(name: &str) -> Result<&'static [PostFilter]> {
        use PostFilter::*;
        let filters: &'static [PostFilter] = match name {
            "hb" => &[HorizontalDeblock],
            "vb" => &[VerticalDeblock],
            "dr" => &[Dering],
            "al" => &[AutoLevels],
            "lb" => &[LinearBlend],
            "md" => &[MedianDeinterlace],
            "tn" => &[Denoise],
            "de" | "default" => &[HorizontalDeblock, VerticalDeblock, Dering, AutoLevels],
            other => {
                return Err(Error::invalid_parameter(format!(
                    "unknown post-process filter '{other}'"
                )));
            }
        };
        Ok(filters)
    }
}

/// Parses a post-process string into a filter chain.
///
/// # Example
///
/// ```rust
/// use dcpenc_core::postprocess::{parse, PostFilter};
///
/// let chain = parse("hb:a,vb:a/al").unwrap();
/// assert_eq!(chain, vec![
///     PostFilter::HorizontalDeblock,
///     PostFilter::VerticalDeblock,
///     PostFilter::AutoLevels,
/// ]);
/// ```
pub fn parse(spec: &str) -> Result<Vec<PostFilter>> {
    let mut chain = Vec::new();
    for item in spec.split([',', '/']).map(str::trim).filter(|s| !s.is_empty()) {
        let name = item.split(':').next().unwrap_or(item);
        chain.extend_from_slice(PostFilter::from_name(name)?);
    }
    if chain.is_empty() {
        return Err(Error::invalid_parameter("empty post-process string"));
    }
    Ok(chain)
}

impl Image {
    /// Returns a copy of this image with the post-process chain applied.
    pub fn post_process(&self, spec: &str) -> Result<Image> {
        let chain = parse(spec)?;
        debug!(spec, filters = chain.len(), "post-processing frame");

        let mut out = self.clone();
        let format = self.pixel_format();
        let size = self.size();
        for filter in chain {
            for i in 0..out.components() {
                if filter == PostFilter::AutoLevels && format.is_yuv() && i > 0 {
                    continue;
                }
                let mut view = PlaneView {
                    width: format.plane_width(i, size),
                    channels: format.bytes_per_pixel(i),
                    lines: out.lines(i),
                    line_size: out.line_size(i),
                    data: out.plane_mut(i).data_mut(),
                };
                match filter {
                    PostFilter::HorizontalDeblock => view.deblock_horizontal(),
                    PostFilter::VerticalDeblock => view.deblock_vertical(),
                    PostFilter::Dering => view.dering(),
                    PostFilter::AutoLevels => {
                        let (lo, hi) = if format.is_yuv() { (16, 235) } else { (0, 255) };
                        view.auto_levels(lo, hi);
                    }
                    PostFilter::LinearBlend => view.linear_blend(),
                    PostFilter::MedianDeinterlace => view.median_deinterlace(),
                    PostFilter::Denoise => view.median3x3(),
                }
            }
        }
        Ok(out)
    }
}

/// Strided view over one plane, addressed by pixel, line and channel.
struct PlaneView<'a> {
    width: usize,
    channels: usize,
    lines: usize,
    line_size: usize,
    data: &'a mut [u8],
}

impl PlaneView<'_> {
    #[inline]
    fn index(&self, x: usize, y: usize, c: usize) -> usize {
        y * self.line_size + x * self.channels + c
    }

    #[inline]
    fn get(&self, x: usize, y: usize, c: usize) -> i32 {
        self.data[self.index(x, y, c)] as i32
    }

    #[inline]
    fn set(&mut self, x: usize, y: usize, c: usize, v: i32) {
        let i = self.index(x, y, c);
        self.data[i] = v.clamp(0, 255) as u8;
    }

    fn deblock_horizontal(&mut self) {
        for y in 0..self.lines {
            for edge in (BLOCK..self.width).step_by(BLOCK) {
                for c in 0..self.channels {
                    self.smooth_edge((edge - 1, y), (edge, y), c);
                }
            }
        }
    }

    fn deblock_vertical(&mut self) {
        for edge in (BLOCK..self.lines).step_by(BLOCK) {
            for x in 0..self.width {
                for c in 0..self.channels {
                    self.smooth_edge((x, edge - 1), (x, edge), c);
                }
            }
        }
    }

    /// Pulls the two samples either side of a block edge towards each other
    /// when the step is small enough to be a compression artefact.
    fn smooth_edge(&mut self, a: (usize, usize), b: (usize, usize), c: usize) {
        let va = self.get(a.0, a.1, c);
        let vb = self.get(b.0, b.1, c);
        if (va - vb).abs() < DEBLOCK_THRESHOLD {
            self.set(a.0, a.1, c, (3 * va + vb + 2) / 4);
            self.set(b.0, b.1, c, (va + 3 * vb + 2) / 4);
        }
    }

    fn dering(&mut self) {
        let src = self.data.to_vec();
        let at = |x: usize, y: usize, c: usize| src[y * self.line_size + x * self.channels + c] as i32;
        let mut updates = Vec::new();
        for y in 1..self.lines.saturating_sub(1) {
            for x in 1..self.width.saturating_sub(1) {
                for c in 0..self.channels {
                    let mut sum = 0;
                    for dy in 0..3 {
                        for dx in 0..3 {
                            sum += at(x + dx - 1, y + dy - 1, c);
                        }
                    }
                    let mean = (sum + 4) / 9;
                    if (at(x, y, c) - mean).abs() <= DERING_THRESHOLD {
                        updates.push((x, y, c, mean));
                    }
                }
            }
        }
        for (x, y, c, v) in updates {
            self.set(x, y, c, v);
        }
    }

    fn auto_levels(&mut self, lo: i32, hi: i32) {
        for c in 0..self.channels {
            let (mut min, mut max) = (255, 0);
            for y in 0..self.lines {
                for x in 0..self.width {
                    let v = self.get(x, y, c);
                    min = min.min(v);
                    max = max.max(v);
                }
            }
            if max <= min {
                continue;
            }
            for y in 0..self.lines {
                for x in 0..self.width {
                    let v = self.get(x, y, c);
                    let stretched = lo + ((v - min) * (hi - lo) + (max - min) / 2) / (max - min);
                    self.set(x, y, c, stretched);
                }
            }
        }
    }

    fn linear_blend(&mut self) {
        let src = self.data.to_vec();
        let last = self.lines.saturating_sub(1);
        for y in 0..self.lines {
            let up = y.saturating_sub(1);
            let down = (y + 1).min(last);
            for x in 0..self.width {
                for c in 0..self.channels {
                    let a = src[self.index(x, up, c)] as i32;
                    let b = src[self.index(x, y, c)] as i32;
                    let d = src[self.index(x, down, c)] as i32;
                    self.set(x, y, c, (a + 2 * b + d + 2) / 4);
                }
            }
        }
    }

    fn median3x3(&mut self) {
        let src = self.data.to_vec();
        for y in 1..self.lines.saturating_sub(1) {
            for x in 1..self.width.saturating_sub(1) {
                for c in 0..self.channels {
                    let mut v = [0u8; 9];
                    for (k, slot) in v.iter_mut().enumerate() {
                        *slot = src[self.index(x + k % 3 - 1, y + k / 3 - 1, c)];
                    }
                    v.sort_unstable();
                    self.set(x, y, c, v[4] as i32);
                }
            }
        }
    }

    fn median_deinterlace(&mut self) {
        let src = self.data.to_vec();
        for y in (1..self.lines.saturating_sub(1)).step_by(2) {
            for x in 0..self.width {
                for c in 0..self.channels {
                    let mut v = [
                        src[self.index(x, y - 1, c)],
                        src[self.index(x, y, c)],
                        src[self.index(x, y + 1, c)],
                    ];
                    v.sort_unstable();
                    self.set(x, y, c, v[1] as i32);
                }
            }
        }
    }
}
