//! Owned OpenJPEG handles.
//!
//! Each handle is released by its `Drop` impl, so every early return in the
//! encoder tears down whatever was already created.

use std::ffi::{c_char, c_void, CStr, CString};
use std::ptr::NonNull;

use dcpenc_color::XyzFrame;
use dcpenc_core::params::{CodecParameters, Profile, Progression, Wavelet};
use dcpenc_core::{Error, Result};
use openjpeg_sys as opj;
use tracing::{debug, warn};

/// `Rsiz` value of the 2K digital cinema profile.
const PROFILE_CINEMA_2K: u16 = 0x0003;

/// Comment written into every codestream.
const CODESTREAM_COMMENT: &str = "dcpenc";

/// Initial capacity of the in-memory output stream.
const STREAM_CHUNK: usize = 1 << 20;

/// Coding style flag: precinct sizes are signalled explicitly.
const CODING_STYLE_PRECINCTS: i32 = 0x01;

/// Three 12-bit component planes handed to the codec.
pub(crate) struct ImageContainer {
    raw: NonNull<opj::opj_image_t>,
}

impl ImageContainer {
    /// Allocates an sRGB-tagged image and copies the XYZ planes in.
    pub(crate) fn new(xyz: &XyzFrame, precision: u32, frame: u32) -> Result<Self> {
        let size = xyz.size();
        let mut params: [opj::opj_image_cmptparm_t; 3] = std::array::from_fn(|_| {
            // SAFETY: plain C struct of integers; all-zero is a valid value.
            let mut p: opj::opj_image_cmptparm_t = unsafe { std::mem::zeroed() };
            p.dx = 1;
            p.dy = 1;
            p.w = size.width;
            p.h = size.height;
            p.x0 = 0;
            p.y0 = 0;
            p.prec = precision;
            p.sgnd = 0;
            p
        });

        // SAFETY: `params` holds three initialised descriptors.
        let raw = unsafe {
            opj::opj_image_create(3, params.as_mut_ptr(), opj::COLOR_SPACE::OPJ_CLRSPC_SRGB)
        };
        let raw = NonNull::new(raw)
            .ok_or_else(|| Error::encode(frame, "could not create image container"))?;
        let mut image = Self { raw };

        // SAFETY: the image was just created with three components of
        // `width * height` samples each and is exclusively owned here.
        unsafe {
            let img = image.raw.as_mut();
            img.x0 = 0;
            img.y0 = 0;
            img.x1 = size.width;
            img.y1 = size.height;

            let comps = std::slice::from_raw_parts_mut(img.comps, 3);
            for (comp, src) in comps.iter_mut().zip(xyz.components()) {
                if comp.data.is_null() {
                    return Err(Error::encode(frame, "image container has no sample buffer"));
                }
                let dst = std::slice::from_raw_parts_mut(comp.data, size.area());
                dst.copy_from_slice(src);
            }
        }

        Ok(image)
    }

    pub(crate) fn as_ptr(&self) -> *mut opj::opj_image_t {
        self.raw.as_ptr()
    }
}

impl Drop for ImageContainer {
    fn drop(&mut self) {
        // SAFETY: created by opj_image_create and destroyed exactly once.
        unsafe { opj::opj_image_destroy(self.raw.as_ptr()) }
    }
}

/// Encoder settings, with the comment string they point at kept alive.
pub(crate) struct EncoderParameters {
    raw: Box<opj::opj_cparameters_t>,
    _comment: CString,
}

impl EncoderParameters {
    /// Library defaults overlaid with the cinema coding layout and the
    /// rate-control targets of `params`.
    pub(crate) fn new(params: &CodecParameters) -> Result<Self> {
        let comment = CString::new(CODESTREAM_COMMENT)
            .map_err(|e| Error::invalid_parameter(format!("codestream comment: {e}")))?;

        let mut raw = Box::<opj::opj_cparameters_t>::new_uninit();
        // SAFETY: opj_set_default_encoder_parameters initialises every field.
        let mut raw = unsafe {
            opj::opj_set_default_encoder_parameters(raw.as_mut_ptr());
            raw.assume_init()
        };

        let (cblk_w, cblk_h) = params.code_block;
        let p = raw.as_mut();
        p.tile_size_on = 0;
        p.cp_tdx = 1;
        p.cp_tdy = 1;
        p.tp_flag = b'C' as c_char;
        p.tp_on = 1;
        p.cp_tx0 = 0;
        p.cp_ty0 = 0;
        p.image_offset_x0 = 0;
        p.image_offset_y0 = 0;
        p.cblockw_init = cblk_w as i32;
        p.cblockh_init = cblk_h as i32;
        p.csty |= CODING_STYLE_PRECINCTS;
        p.prog_order = match params.progression {
            Progression::Cprl => opj::PROG_ORDER::OPJ_CPRL,
        };
        p.roi_compno = -1;
        p.subsampling_dx = 1;
        p.subsampling_dy = 1;
        p.irreversible = match params.wavelet {
            Wavelet::Irreversible97 => 1,
        };
        p.tcp_numlayers = 1;
        p.tcp_rates[0] = params.rate;
        p.cp_disto_alloc = 1;
        p.rsiz = match params.profile {
            Profile::Cinema2k => PROFILE_CINEMA_2K,
        };
        p.tcp_mct = params.mct as c_char;
        p.max_comp_size = params.max_comp_size as i32;
        p.max_cs_size = params.max_cs_len as i32;
        p.cp_comment = comment.as_ptr() as *mut c_char;

        Ok(Self {
            raw,
            _comment: comment,
        })
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut opj::opj_cparameters_t {
        self.raw.as_mut()
    }
}

/// Messages the codec reported through its callbacks.
#[derive(Default)]
struct Diagnostics {
    last_error: Option<String>,
}

/// A J2K compression context.
pub(crate) struct Compressor {
    raw: NonNull<opj::opj_codec_t>,
    diagnostics: Box<Diagnostics>,
    frame: u32,
}

impl Compressor {
    pub(crate) fn new(frame: u32) -> Result<Self> {
        // SAFETY: plain constructor call.
        let raw = unsafe { opj::opj_create_compress(opj::CODEC_FORMAT::OPJ_CODEC_J2K) };
        let raw = NonNull::new(raw)
            .ok_or_else(|| Error::encode(frame, "could not create J2K compressor"))?;
        let mut compressor = Self {
            raw,
            diagnostics: Box::default(),
            frame,
        };

        let client = compressor.diagnostics.as_mut() as *mut Diagnostics as *mut c_void;
        // SAFETY: `diagnostics` is boxed so its address is stable, and it
        // lives as long as the codec.
        unsafe {
            opj::opj_set_info_handler(compressor.raw.as_ptr(), Some(info_handler), client);
            opj::opj_set_warning_handler(compressor.raw.as_ptr(), Some(warning_handler), client);
            opj::opj_set_error_handler(compressor.raw.as_ptr(), Some(error_handler), client);
        }
        Ok(compressor)
    }

    /// Configures the codec for `image`.
    pub(crate) fn setup(&mut self, params: &mut EncoderParameters, image: &ImageContainer) -> Result<()> {
        // SAFETY: all three handles are live and owned by the caller.
        let ok = unsafe { opj::opj_setup_encoder(self.raw.as_ptr(), params.as_mut_ptr(), image.as_ptr()) };
        self.check(ok, "encoder setup failed")
    }

    /// Runs start / encode / end over `stream`.
    pub(crate) fn compress(&mut self, image: &ImageContainer, stream: &mut OutputStream) -> Result<()> {
        // SAFETY: handles are live; the stream's sink outlives these calls.
        unsafe {
            let ok = opj::opj_start_compress(self.raw.as_ptr(), image.as_ptr(), stream.as_ptr());
            self.check(ok, "could not start compression")?;
            let ok = opj::opj_encode(self.raw.as_ptr(), stream.as_ptr());
            self.check(ok, "compression failed")?;
            let ok = opj::opj_end_compress(self.raw.as_ptr(), stream.as_ptr());
            self.check(ok, "could not finish compression")
        }
    }

    fn check(&mut self, ok: opj::OPJ_BOOL, what: &str) -> Result<()> {
        if ok != 0 {
            return Ok(());
        }
        let reason = match self.diagnostics.last_error.take() {
            Some(detail) => format!("{what}: {detail}"),
            None => what.to_string(),
        };
        Err(Error::encode(self.frame, reason))
    }
}

impl Drop for Compressor {
    fn drop(&mut self) {
        // SAFETY: created by opj_create_compress and destroyed exactly once.
        unsafe { opj::opj_destroy_codec(self.raw.as_ptr()) }
    }
}

/// Growable byte buffer the output stream writes into.
#[derive(Default)]
struct Sink {
    data: Vec<u8>,
    position: usize,
}

impl Sink {
    fn write(&mut self, bytes: &[u8]) {
        let end = self.position + bytes.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.position..end].copy_from_slice(bytes);
        self.position = end;
    }
}

/// An OpenJPEG output stream backed by memory.
pub(crate) struct OutputStream {
    raw: NonNull<opj::opj_stream_t>,
    sink: Box<Sink>,
}

impl OutputStream {
    pub(crate) fn new(frame: u32) -> Result<Self> {
        // SAFETY: plain constructor call; 0 selects an output stream.
        let raw = unsafe { opj::opj_stream_create(STREAM_CHUNK, 0) };
        let raw = NonNull::new(raw)
            .ok_or_else(|| Error::encode(frame, "could not create output stream"))?;
        let mut stream = Self {
            raw,
            sink: Box::default(),
        };

        let user = stream.sink.as_mut() as *mut Sink as *mut c_void;
        // SAFETY: the sink is boxed, owned by this value and outlives the
        // stream, which is destroyed first in Drop. No free function is
        // registered because the box frees itself.
        unsafe {
            opj::opj_stream_set_write_function(raw.as_ptr(), Some(stream_write));
            opj::opj_stream_set_skip_function(raw.as_ptr(), Some(stream_skip));
            opj::opj_stream_set_seek_function(raw.as_ptr(), Some(stream_seek));
            opj::opj_stream_set_user_data(raw.as_ptr(), user, None);
        }
        Ok(stream)
    }

    fn as_ptr(&mut self) -> *mut opj::opj_stream_t {
        self.raw.as_ptr()
    }

    /// Moves the written codestream out.
    pub(crate) fn take_bytes(&mut self) -> Vec<u8> {
        self.sink.position = 0;
        std::mem::take(&mut self.sink.data)
    }
}

impl Drop for OutputStream {
    fn drop(&mut self) {
        // SAFETY: created by opj_stream_create and destroyed exactly once.
        unsafe { opj::opj_stream_destroy(self.raw.as_ptr()) }
    }
}

unsafe extern "C" fn stream_write(buffer: *mut c_void, len: usize, user: *mut c_void) -> usize {
    // SAFETY: `user` is the Sink registered in OutputStream::new and
    // `buffer` holds `len` readable bytes for the duration of the call.
    unsafe {
        let sink = &mut *(user as *mut Sink);
        sink.write(std::slice::from_raw_parts(buffer as *const u8, len));
    }
    len
}

unsafe extern "C" fn stream_skip(len: i64, user: *mut c_void) -> i64 {
    // SAFETY: see stream_write.
    let sink = unsafe { &mut *(user as *mut Sink) };
    let target = sink.position as i64 + len;
    if target < 0 {
        return -1;
    }
    sink.position = target as usize;
    len
}

unsafe extern "C" fn stream_seek(position: i64, user: *mut c_void) -> opj::OPJ_BOOL {
    // SAFETY: see stream_write.
    let sink = unsafe { &mut *(user as *mut Sink) };
    if position < 0 {
        return 0;
    }
    sink.position = position as usize;
    1
}

fn message(msg: *const c_char) -> Option<String> {
    if msg.is_null() {
        return None;
    }
    // SAFETY: OpenJPEG passes NUL-terminated strings.
    let text = unsafe { CStr::from_ptr(msg) }.to_string_lossy();
    Some(text.trim_end().to_string())
}

unsafe extern "C" fn info_handler(msg: *const c_char, _client: *mut c_void) {
    if let Some(text) = message(msg) {
        debug!(target: "openjpeg", "{text}");
    }
}

unsafe extern "C" fn warning_handler(msg: *const c_char, _client: *mut c_void) {
    if let Some(text) = message(msg) {
        warn!(target: "openjpeg", "{text}");
    }
}

unsafe extern "C" fn error_handler(msg: *const c_char, client: *mut c_void) {
    if let Some(text) = message(msg) {
        tracing::error!(target: "openjpeg", "{text}");
        if !client.is_null() {
            // SAFETY: `client` is the Diagnostics registered in Compressor::new.
            let diagnostics = unsafe { &mut *(client as *mut Diagnostics) };
            diagnostics.last_error = Some(text);
        }
    }
}
