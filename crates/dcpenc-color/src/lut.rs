//! Process-wide lookup tables.
//!
//! Built on first use and never modified afterwards, so they are shared
//! freely between encoder threads.

use std::sync::OnceLock;

use dcpenc_core::ColourLut;
use tracing::debug;

use crate::transfer::{dci_oetf, rec709_eotf, srgb_eotf};

/// Bits of the table index.
pub const LUT_BITS: u32 = 12;

/// Entries per table.
pub const LUT_SIZE: usize = 1 << LUT_BITS;

/// Largest 12-bit code value.
pub const LUT_MAX: usize = LUT_SIZE - 1;

/// Input gamma tables, one per [`ColourLut`].
pub struct InputTables {
    tables: [Box<[f64]>; ColourLut::COUNT],
}

impl InputTables {
    fn build() -> Self {
        let table = |eotf: fn(f64) -> f64| -> Box<[f64]> {
            (0..LUT_SIZE).map(|i| eotf(i as f64 / LUT_MAX as f64)).collect()
        };
        debug!(entries = LUT_SIZE, "building input gamma tables");
        Self {
            tables: ColourLut::ALL.map(|lut| match lut {
                ColourLut::Srgb => table(srgb_eotf),
                ColourLut::Rec709 => table(rec709_eotf),
            }),
        }
    }

    /// Table for one profile.
    #[inline]
    pub fn get(&self, lut: ColourLut) -> &[f64] {
        &self.tables[lut.index()]
    }
}

/// Shared input gamma tables.
pub fn input_tables() -> &'static InputTables {
    static INSTANCE: OnceLock<InputTables> = OnceLock::new();
    INSTANCE.get_or_init(InputTables::build)
}

/// Linear 12-bit XYZ to DCI-encoded 12-bit X'Y'Z', rounded.
pub fn output_table() -> &'static [u16] {
    static INSTANCE: OnceLock<Box<[u16]>> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        debug!(entries = LUT_SIZE, "building DCI output gamma table");
        (0..LUT_SIZE)
            .map(|i| (dci_oetf(i as f64 / LUT_MAX as f64) * LUT_MAX as f64).round() as u16)
            .collect()
    })
}
