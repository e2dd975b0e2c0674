//! End-to-end tests for the dcpenc crates.
//!
//! Local encodes are decoded again with OpenJPEG (through `jpeg2k`) and
//! compared against the colour pipeline; remote encodes run against fake
//! and real encode servers on the loopback interface.

#[cfg(test)]
mod remote;

#[cfg(test)]
mod tests {
    use dcpenc_color::rgb_to_xyz;
    use dcpenc_core::{ColourLut, FrameJob, Image, PixelFormat, Scaler, Size};
    use dcpenc_io::{frame_path, EncodedData};
    use dcpenc_j2k::encode_locally;
    use tempfile::tempdir;

    /// Decodes a codestream into its three components.
    fn decode(data: &EncodedData) -> (u32, u32, [Vec<i32>; 3]) {
        let image = jpeg2k::Image::from_bytes(data.data()).expect("decode");
        let comps = image.components();
        assert_eq!(comps.len(), 3);
        for c in comps {
            assert_eq!(c.precision(), 12);
        }
        (
            image.width(),
            image.height(),
            [
                comps[0].data().to_vec(),
                comps[1].data().to_vec(),
                comps[2].data().to_vec(),
            ],
        )
    }

    fn assert_close(actual: i32, expected: i32, what: &str) {
        assert!(
            (actual - expected).abs() <= 8,
            "{what}: decoded {actual}, expected {expected}"
        );
    }

    /// Flat frames survive encode and decode with the pipeline's values.
    #[test]
    fn test_local_roundtrip_flat() {
        for (rgb, lut) in [
            ([128, 64, 200], ColourLut::Srgb),
            ([255, 0, 0], ColourLut::Rec709),
            ([255, 255, 255], ColourLut::Srgb),
        ] {
            let image = Image::solid_rgb(Size::new(128, 64), rgb).unwrap();
            let job = FrameJob::builder(image, Size::new(128, 64), 1)
                .colour_lut(lut)
                .build()
                .unwrap();
            let encoded = encode_locally(&job).unwrap();

            let (w, h, comps) = decode(&encoded);
            assert_eq!((w, h), (128, 64));
            let expected = rgb_to_xyz(rgb, lut);
            for (c, name) in ["X", "Y", "Z"].iter().enumerate() {
                for &v in comps[c].iter().step_by(97) {
                    assert_close(v, expected[c], name);
                }
            }
        }
    }

    /// Scaling into the container leaves black padding columns.
    #[test]
    fn test_local_scaled_and_padded() {
        let image = Image::solid_rgb(Size::new(64, 32), [255, 255, 255]).unwrap();
        let job = FrameJob::builder(image, Size::new(128, 64), 2)
            .padding(16)
            .scaler(Scaler::Bilinear)
            .build()
            .unwrap();
        let (w, h, comps) = decode(&encode_locally(&job).unwrap());
        assert_eq!((w, h), (128, 64));

        let white = rgb_to_xyz([255, 255, 255], ColourLut::Srgb);
        let row = 32 * 128;
        for c in 0..3 {
            assert_close(comps[c][row + 2], 0, "padding");
            assert_close(comps[c][row + 125], 0, "padding");
            assert_close(comps[c][row + 64], white[c], "picture");
        }
    }

    #[test]
    fn test_local_yuv_input() {
        let mut image = Image::new(PixelFormat::Yuv420p, Size::new(128, 64)).unwrap();
        for (p, value) in [(0, 235), (1, 128), (2, 128)] {
            for y in 0..image.lines(p) {
                image.plane_mut(p).line_mut(y).fill(value);
            }
        }
        let job = FrameJob::builder(image, Size::new(128, 64), 3).build().unwrap();
        let (w, h, comps) = decode(&encode_locally(&job).unwrap());
        assert_eq!((w, h), (128, 64));
        let white = rgb_to_xyz([255, 255, 255], ColourLut::Srgb);
        assert_close(comps[1][40 * 128 + 70], white[1], "Y");
    }

    #[test]
    fn test_encode_and_publish() {
        let dir = tempdir().unwrap();
        let image = Image::solid_rgb(Size::new(128, 64), [16, 235, 128]).unwrap();
        let job = FrameJob::builder(image, Size::new(128, 64), 99)
            .post_process(Some("hb,vb"))
            .build()
            .unwrap();
        let encoded = encode_locally(&job).unwrap();
        let path = encoded.write(dir.path(), job.frame()).unwrap();

        assert_eq!(path, frame_path(dir.path(), 99));
        assert_eq!(std::fs::read(&path).unwrap(), encoded.data());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("00000099.j2c")]);
    }

    #[test]
    fn test_parallel_jobs_are_independent() {
        let frames: Vec<Vec<u8>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4u32)
                .map(|i| {
                    s.spawn(move || {
                        let image = Image::solid_rgb(Size::new(128, 64), [40, 80, 120]).unwrap();
                        let job = FrameJob::builder(image, Size::new(128, 64), i).build().unwrap();
                        encode_locally(&job).unwrap().into_vec()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for f in &frames[1..] {
            assert_eq!(f, &frames[0]);
        }
    }
}
