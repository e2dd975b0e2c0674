//! Transfer functions used to build the lookup tables.
//!
//! Everything is `f64` so the tables are bit-reproducible across hosts.

/// sRGB EOTF: decodes gamma-encoded sRGB [0, 1] to linear [0, 1].
///
/// # Formula
///
/// ```text
/// if V <= 0.04045:
///     L = V / 12.92
/// else:
///     L = ((V + 0.055) / 1.055)^2.4
/// ```
///
/// # Reference
///
/// IEC 61966-2-1:1999
#[inline]
pub fn srgb_eotf(v: f64) -> f64 {
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

/// Rec.709 inverse OETF: decodes Rec.709 [0, 1] to linear [0, 1].
///
/// # Formula
///
/// ```text
/// if V < 0.081:
///     L = V / 4.5
/// else:
///     L = ((V + 0.099) / 1.099)^(1 / 0.45)
/// ```
#[inline]
pub fn rec709_eotf(v: f64) -> f64 {
    if v < 0.081 {
        v / 4.5
    } else {
        ((v + 0.099) / 1.099).powf(1.0 / 0.45)
    }
}

/// Gamma of the DCI X'Y'Z' encoding.
pub const DCI_GAMMA: f64 = 2.6;

/// DCI output encoding: linear [0, 1] to X'Y'Z' [0, 1].
#[inline]
pub fn dci_oetf(l: f64) -> f64 {
    l.powf(1.0 / DCI_GAMMA)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_endpoints() {
        for f in [srgb_eotf, rec709_eotf, dci_oetf] {
            assert_abs_diff_eq!(f(0.0), 0.0);
            assert_abs_diff_eq!(f(1.0), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_linear_segments() {
        assert_abs_diff_eq!(srgb_eotf(0.04), 0.04 / 12.92);
        assert_abs_diff_eq!(rec709_eotf(0.08), 0.08 / 4.5);
    }

    #[test]
    fn test_midpoints() {
        assert_abs_diff_eq!(srgb_eotf(0.5), 0.214, epsilon = 1e-3);
        assert_abs_diff_eq!(rec709_eotf(0.5), 0.2597, epsilon = 1e-3);
    }
}
