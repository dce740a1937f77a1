//! # Unit Conversion
//!
//! Maps raw 16-bit sensor words to physical values and derives the dew point.
//!
//! ## Formulas
//!
//! ```text
//! T  [°C] = 175 * raw / 65536 - 45
//! RH [%]  = 100 * raw / 65536
//! ```
//!
//! The dew point uses the Magnus formula with separate coefficient pairs
//! above and below 0 °C:
//!
//! ```text
//! Td = Tn * (ln(RH/100) + m*T/(Tn+T)) / (m - ln(RH/100) - m*T/(Tn+T))
//! ```
//!
//! ## Usage
//!
//! ```
//! use shtw1_bridge::sensor::convert::{dew_point, humidity, temperature};
//!
//! assert_eq!(temperature(0), -45.0);
//! assert_eq!(humidity(32768), 50.0);
//! assert!(dew_point(20.0, 0.0).is_none());
//! ```

/// Full-scale divisor of a sensor word
const FULL_SCALE: f32 = 65536.0;

/// Magnus coefficients above 0 °C
const T_PLUS: f32 = 243.12;
const M_PLUS: f32 = 17.62;

/// Magnus coefficients at or below 0 °C
const T_MINUS: f32 = 272.62;
const M_MINUS: f32 = 22.46;

/// Convert a raw temperature word to °C
///
/// Takes the word widened to `u32` so the full-scale ceiling (65536) is
/// representable.
#[must_use]
pub fn temperature(raw: u32) -> f32 {
    175.0 * raw as f32 / FULL_SCALE - 45.0
}

/// Convert a raw humidity word to %RH
#[must_use]
pub fn humidity(raw: u32) -> f32 {
    100.0 * raw as f32 / FULL_SCALE
}

/// Dew point in °C
///
/// # Returns
///
/// `None` when humidity is not positive, when the coefficient sum
/// `Tn + T` is zero, or when the result is not finite.
#[must_use]
pub fn dew_point(temperature_c: f32, humidity_pct: f32) -> Option<f32> {
    if humidity_pct <= 0.0 || !humidity_pct.is_finite() || !temperature_c.is_finite() {
        return None;
    }

    let (tn, m) = if temperature_c > 0.0 {
        (T_PLUS, M_PLUS)
    } else {
        (T_MINUS, M_MINUS)
    };

    let denominator_t = tn + temperature_c;
    if denominator_t == 0.0 {
        return None;
    }

    let log_rh = (humidity_pct / 100.0).ln();
    let ratio = m * temperature_c / denominator_t;
    let denominator = m - log_rh - ratio;
    if denominator == 0.0 {
        return None;
    }

    let result = tn * (log_rh + ratio) / denominator;
    result.is_finite().then_some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_bounds() {
        assert_eq!(temperature(0), -45.0);
        // 175 * 65536 / 65536 - 45
        assert_eq!(temperature(65536), 130.0);
        assert!((temperature(u32::from(u16::MAX)) - 129.997).abs() < 0.001);
    }

    #[test]
    fn test_temperature_midscale() {
        // 0x6666 is the datasheet example word, about 25 °C
        let t = temperature(0x6666);
        assert!((t - 24.999).abs() < 0.01, "got {}", t);
    }

    #[test]
    fn test_humidity_bounds() {
        assert_eq!(humidity(0), 0.0);
        assert_eq!(humidity(65536), 100.0);
        assert_eq!(humidity(32768), 50.0);
    }

    #[test]
    fn test_dew_point_reference() {
        let dp = dew_point(25.0, 50.0).unwrap();
        assert!((dp - 13.87).abs() < 0.1, "got {}", dp);
    }

    #[test]
    fn test_dew_point_saturated_equals_temperature() {
        let dp = dew_point(18.0, 100.0).unwrap();
        assert!((dp - 18.0).abs() < 0.01, "got {}", dp);
    }

    #[test]
    fn test_dew_point_below_freezing() {
        let dp = dew_point(-10.0, 80.0).unwrap();
        assert!(dp < -10.0 && dp > -15.0, "got {}", dp);
    }

    #[test]
    fn test_dew_point_zero_humidity() {
        for t in [-45.0, -10.0, 0.0, 25.0, 130.0] {
            assert_eq!(dew_point(t, 0.0), None);
        }
        assert_eq!(dew_point(25.0, -1.0), None);
    }

    #[test]
    fn test_dew_point_coefficient_singularity() {
        // T == -T_MINUS makes Tn + T zero
        assert_eq!(dew_point(-272.62, 50.0), None);
    }

    #[test]
    fn test_dew_point_non_finite_input() {
        assert_eq!(dew_point(f32::NAN, 50.0), None);
        assert_eq!(dew_point(20.0, f32::INFINITY), None);
    }
}
