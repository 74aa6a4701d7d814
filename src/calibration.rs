//! Linear calibration between raw sensor counts and pressure
//!
//! The sensor maps pressure linearly onto a fraction of its 24-bit output range. Which
//! fraction depends on the transfer function of the part, printed in its order code as
//! `A`, `B` or `C`. The pressure end points come from the datasheet of the specific part
//! and must be given in PSI.

#[cfg(feature = "defmt")]
use defmt::debug;

/// Transfer function of the sensor
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferFunction {
    /// 10% to 90% of 2^24 counts
    #[default]
    A,
    /// 2.5% to 22.5% of 2^24 counts
    B,
    /// 20% to 80% of 2^24 counts
    C,
}

impl TransferFunction {
    /// Count values at minimum and maximum pressure
    #[must_use]
    pub fn count_bounds(self) -> (u32, u32) {
        match self {
            TransferFunction::A => (1_677_722, 15_099_494),
            TransferFunction::B => (419_430, 3_774_874),
            TransferFunction::C => (3_355_443, 13_421_773),
        }
    }
}

/// Selects by the letter in the part's order code
///
/// Anything other than an upper case `B` or `C` selects [`TransferFunction::A`].
impl From<char> for TransferFunction {
    fn from(letter: char) -> Self {
        match letter {
            'B' => TransferFunction::B,
            'C' => TransferFunction::C,
            _ => TransferFunction::A,
        }
    }
}

/// Calibration state of a sensor
///
/// Created from a [`TransferFunction`] and the pressure range of the part, then optionally
/// corrected at runtime with [`Self::set_zero`] and [`Self::set_cal_factor`].
///
/// The two corrections update different derived values and are applied in order:
/// calling [`Self::set_zero`] after [`Self::set_cal_factor`] recomputes the scale factor
/// from the pressure span, discarding the earlier factor.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    min_pressure: f32,
    max_pressure: f32,
    min_counts: u32,
    max_counts: u32,
    delta_counts: i64,
    delta_pressure: f32,
    scale_factor: f32,
}

impl Calibration {
    /// Calibration for a part with the given transfer function and pressure range, in PSI
    ///
    /// `min_pressure == max_pressure` leaves a zero scale factor, so every reading converts
    /// to `min_pressure`.
    #[must_use]
    pub fn new(transfer_function: TransferFunction, min_pressure: f32, max_pressure: f32) -> Self {
        let (min_counts, max_counts) = transfer_function.count_bounds();
        let delta_counts = span(min_counts, max_counts);
        let delta_pressure = max_pressure - min_pressure;
        let new = Self {
            min_pressure,
            max_pressure,
            min_counts,
            max_counts,
            delta_counts,
            delta_pressure,
            scale_factor: scale(delta_pressure, delta_counts),
        };
        #[cfg(feature = "defmt")]
        debug!("Selected calibration {}", new);
        new
    }

    /// Replace the count value at minimum pressure
    ///
    /// Use the raw reading taken at a known zero-pressure condition to correct offset
    /// drift. The pressure range is kept and the scale factor follows the new count span.
    ///
    /// Any count is accepted. A zero point at or above full scale leaves a negative or
    /// non-finite scale factor.
    pub fn set_zero(&mut self, zero: u32) {
        #[cfg(feature = "defmt")]
        debug!("Setting zero to {} counts", zero);
        self.min_counts = zero;
        self.delta_counts = span(self.min_counts, self.max_counts);
        self.scale_factor = scale(self.delta_pressure, self.delta_counts);
    }

    /// Replace the scale factor, in PSI per count
    ///
    /// Use a factor measured against an external pressure reference to correct the slope.
    /// The count span is kept and the maximum pressure follows the new factor.
    #[allow(clippy::cast_precision_loss)]
    pub fn set_cal_factor(&mut self, factor: f32) {
        #[cfg(feature = "defmt")]
        debug!("Setting calibration factor to {}", factor);
        self.scale_factor = factor;
        self.delta_pressure = factor * self.delta_counts as f32;
        self.max_pressure = self.min_pressure + self.delta_pressure;
    }

    /// Convert a raw count to PSI
    ///
    /// Counts below the zero point give pressures below `min_pressure`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_base_pressure(&self, counts: u32) -> f32 {
        let offset = i64::from(counts) - i64::from(self.min_counts);
        offset as f32 * self.scale_factor + self.min_pressure
    }

    /// Pressure at the zero point, in PSI
    #[must_use]
    pub fn min_pressure(&self) -> f32 {
        self.min_pressure
    }

    /// Pressure at full scale, in PSI
    #[must_use]
    pub fn max_pressure(&self) -> f32 {
        self.max_pressure
    }

    /// Count value at the zero point
    #[must_use]
    pub fn min_counts(&self) -> u32 {
        self.min_counts
    }

    /// Count value at full scale
    #[must_use]
    pub fn max_counts(&self) -> u32 {
        self.max_counts
    }

    /// `max_counts - min_counts`
    ///
    /// Negative if the zero point was set above full scale.
    #[must_use]
    pub fn delta_counts(&self) -> i64 {
        self.delta_counts
    }

    /// `max_pressure - min_pressure`, in PSI
    #[must_use]
    pub fn delta_pressure(&self) -> f32 {
        self.delta_pressure
    }

    /// PSI per count
    #[must_use]
    pub fn scale_factor(&self) -> f32 {
        self.scale_factor
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::new(TransferFunction::A, 0.0, 25.0)
    }
}

fn span(min_counts: u32, max_counts: u32) -> i64 {
    i64::from(max_counts) - i64::from(min_counts)
}

#[allow(clippy::cast_precision_loss)]
fn scale(delta_pressure: f32, delta_counts: i64) -> f32 {
    delta_pressure / delta_counts as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use test_case::test_case;

    #[test_case(TransferFunction::A, 1_677_722, 15_099_494)]
    #[test_case(TransferFunction::B, 419_430, 3_774_874)]
    #[test_case(TransferFunction::C, 3_355_443, 13_421_773)]
    fn count_table(tf: TransferFunction, min: u32, max: u32) {
        let cal = Calibration::new(tf, 0.0, 25.0);
        assert_eq!(cal.min_counts(), min);
        assert_eq!(cal.max_counts(), max);
    }

    #[test_case('A', TransferFunction::A)]
    #[test_case('B', TransferFunction::B)]
    #[test_case('b', TransferFunction::A ; "lower case b")]
    #[test_case('c', TransferFunction::A ; "lower case c")]
    #[test_case('C', TransferFunction::C)]
    #[test_case('Z', TransferFunction::A ; "unknown letter")]
    #[test_case('\0', TransferFunction::A ; "nul")]
    fn from_letter(letter: char, expected: TransferFunction) {
        assert_eq!(TransferFunction::from(letter), expected);
    }

    #[test]
    fn default_is_a_zero_to_25() {
        let cal = Calibration::default();
        assert_eq!(cal, Calibration::new(TransferFunction::A, 0.0, 25.0));
        assert_eq!(cal.min_pressure(), 0.0);
        assert_eq!(cal.max_pressure(), 25.0);
        assert_eq!(cal.delta_counts(), 13_421_772);
    }

    #[test_case(TransferFunction::A, 0.0, 25.0)]
    #[test_case(TransferFunction::B, 0.0, 60.0)]
    #[test_case(TransferFunction::C, -15.0, 15.0)]
    #[test_case(TransferFunction::A, 2.5, 30.0)]
    fn end_points(tf: TransferFunction, min: f32, max: f32) {
        let cal = Calibration::new(tf, min, max);
        assert_approx_eq!(cal.to_base_pressure(cal.min_counts()), min, 1e-4);
        assert_approx_eq!(cal.to_base_pressure(cal.max_counts()), max, 1e-4);
    }

    #[test]
    fn default_round_trip() {
        let cal = Calibration::default();
        assert_eq!(cal.to_base_pressure(1_677_722), 0.0);
        assert_approx_eq!(cal.to_base_pressure(15_099_494), 25.0, 1e-4);
        assert_approx_eq!(cal.to_base_pressure(0x80_0000), 12.5, 1e-4);
    }

    #[test]
    fn below_zero_is_negative() {
        let cal = Calibration::default();
        assert!(cal.to_base_pressure(0) < 0.0);
        assert_approx_eq!(cal.to_base_pressure(0), -3.125, 1e-3);
    }

    #[test]
    fn set_zero_moves_offset_and_slope() {
        let mut cal = Calibration::default();
        let before = cal.scale_factor();
        cal.set_zero(1_700_000);

        assert_eq!(cal.min_counts(), 1_700_000);
        assert_eq!(cal.max_counts(), 15_099_494);
        assert_eq!(cal.min_pressure(), 0.0);
        assert_eq!(cal.max_pressure(), 25.0);
        assert_eq!(cal.delta_counts(), 15_099_494 - 1_700_000);
        assert!(cal.scale_factor() > before);
        assert_eq!(cal.to_base_pressure(1_700_000), 0.0);
        assert_approx_eq!(cal.to_base_pressure(15_099_494), 25.0, 1e-4);
    }

    #[test]
    fn set_zero_above_full_scale() {
        let mut cal = Calibration::default();
        cal.set_zero(0x0100_0000);

        assert_eq!(cal.min_counts(), 0x0100_0000);
        assert_eq!(cal.delta_counts(), 15_099_494 - 0x0100_0000);
        assert!(cal.scale_factor() < 0.0);
        assert_eq!(cal.to_base_pressure(0x0100_0000), 0.0);
        assert_approx_eq!(cal.to_base_pressure(15_099_494), 25.0, 1e-4);
    }

    #[test]
    fn set_cal_factor_moves_max_pressure() {
        let mut cal = Calibration::new(TransferFunction::A, 1.0, 25.0);
        cal.set_cal_factor(2.0e-6);

        assert_eq!(cal.scale_factor(), 2.0e-6);
        assert_eq!(cal.min_counts(), 1_677_722);
        assert_eq!(cal.max_counts(), 15_099_494);
        assert_eq!(cal.min_pressure(), 1.0);
        assert_approx_eq!(cal.delta_pressure(), 2.0e-6 * 13_421_772.0, 1e-4);
        assert_approx_eq!(cal.max_pressure(), 1.0 + 2.0e-6 * 13_421_772.0, 1e-4);
    }

    #[test]
    fn set_zero_after_cal_factor_uses_new_span() {
        let mut cal = Calibration::default();
        cal.set_cal_factor(2.0e-6);
        let span = cal.delta_pressure();
        cal.set_zero(1_000_000);

        assert_approx_eq!(cal.max_pressure(), span, 1e-4);
        assert_approx_eq!(
            cal.scale_factor(),
            span / 14_099_494.0,
            1e-9
        );
    }

    #[test]
    fn degenerate_span_is_not_finite() {
        let mut cal = Calibration::default();
        cal.set_zero(cal.max_counts());
        assert_eq!(cal.delta_counts(), 0);
        assert!(!cal.scale_factor().is_finite());
    }
}
