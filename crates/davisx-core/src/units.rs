//! Unit conversion and derived meteorological quantities

/// Round to a fixed number of decimal places, exact halves to even
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    let scaled = value * scale;
    let mut rounded = scaled.round();
    if (rounded - scaled).abs() == 0.5 {
        rounded = 2.0 * (scaled / 2.0).round();
    }
    rounded / scale
}

/// Fahrenheit to Celsius
pub fn f_to_c(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

/// Celsius to Fahrenheit
pub fn c_to_f(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

/// Saturated vapor pressure (hPa) at `temp_c`
pub fn saturation_vapor_pressure(temp_c: f64) -> f64 {
    6.11 * 10f64.powf(7.5 * temp_c / (237.3 + temp_c))
}

/// Dew point in Celsius from temperature (Celsius) and relative humidity
/// in percent (90.5 means 90.5%, not 0.905)
///
/// Returns `None` when the humidity is not positive, where the logarithm
/// is undefined.
pub fn dewpoint_c(temp_c: f64, rel_humidity: f64) -> Option<f64> {
    if rel_humidity <= 0.0 {
        return None;
    }
    let x = (saturation_vapor_pressure(temp_c) * rel_humidity / 611.0).ln();
    Some(237.3 * x / (7.5 * std::f64::consts::LN_10 - x))
}

/// Dew point in Fahrenheit from temperature (Fahrenheit) and relative humidity
pub fn dewpoint_f(temp_f: f64, rel_humidity: f64) -> Option<f64> {
    dewpoint_c(f_to_c(temp_f), rel_humidity).map(c_to_f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_conversion() {
        assert!((f_to_c(32.0) - 0.0).abs() < 0.001);
        assert!((f_to_c(212.0) - 100.0).abs() < 0.001);
        assert!((c_to_f(0.0) - 32.0).abs() < 0.001);
        assert!((c_to_f(f_to_c(71.3)) - 71.3).abs() < 1e-9);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(18.456, 2), 18.46);
        assert_eq!(round_to(268.898, 1), 268.9);
        assert_eq!(round_to(-1.004, 2), -1.0);
    }

    #[test]
    fn test_round_to_exact_halves_go_to_even() {
        assert_eq!(round_to(0.625, 2), 0.62);
        assert_eq!(round_to(0.125, 2), 0.12);
        assert_eq!(round_to(0.375, 2), 0.38);
        assert_eq!(round_to(-0.625, 2), -0.62);
        assert_eq!(round_to(2.5, 0), 2.0);
        assert_eq!(round_to(3.5, 0), 4.0);
    }

    #[test]
    fn test_saturation_vapor_pressure() {
        assert!((saturation_vapor_pressure(0.0) - 6.11).abs() < 1e-9);
        assert!((saturation_vapor_pressure(20.0) - 23.39).abs() < 0.01);
    }

    #[test]
    fn test_dewpoint() {
        let td = dewpoint_c(20.0, 50.0).unwrap();
        assert!((td - 9.27).abs() < 0.05, "dewpoint was {}", td);

        // Saturated air: dew point equals temperature
        let td = dewpoint_c(15.0, 100.0).unwrap();
        assert!((td - 15.0).abs() < 0.01, "dewpoint was {}", td);
    }

    #[test]
    fn test_dewpoint_f() {
        let td = dewpoint_f(68.0, 50.0).unwrap();
        assert!((td - 48.7).abs() < 0.1, "dewpoint was {}", td);
    }

    #[test]
    fn test_dewpoint_without_humidity() {
        assert_eq!(dewpoint_c(20.0, 0.0), None);
    }
}
