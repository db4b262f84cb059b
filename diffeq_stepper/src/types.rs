//! Numeric type used on the device and its lossless text form.

pub use compute_manager::Real;

/// Delimiter between columns when states are written as text.
pub const DEFAULT_DELIMITER: char = '\t';

/// Number of significant decimal digits needed to read back a bit-identical [`Real`].
pub fn real_to_text_digits() -> usize {
    #[cfg(not(feature = "single-precision"))]
    {
        17
    }
    #[cfg(feature = "single-precision")]
    {
        9
    }
}

/// Scientific notation with enough digits to round-trip.
pub fn format_real(value: Real) -> String {
    format!("{:.*e}", real_to_text_digits() - 1, value)
}

/// Complex number as `(re,im)`, both parts formatted like [`format_real`].
pub fn format_complex(re: Real, im: Real) -> String {
    format!("({},{})", format_real(re), format_real(im))
}
