//! Saturation vapour pressure and dew point.
//!
//! Below 0 C the ice formula from Hardy, "ITS-90 Formulations for Vapor
//! Pressure, Frostpoint Temperature, Dewpoint Temperature, and Enhancement
//! Factors in the Range -100 to +100 C" (1998) is used. From 0 C up the
//! saturation-pressure equation (30) of the IAPWS Industrial Formulation
//! 1997 applies.

pub const C_OFFSET: f64 = 273.15;
/// -100 C.
pub const MIN_T: f64 = 173.0;
pub const MAX_T: f64 = 678.0;

const MAX_ITERATIONS: usize = 10;
const CONVERGENCE: f64 = 1e-4;

const K0: f64 = -5.8666426e3;
const K1: f64 = 2.232870244e1;
const K2: f64 = 1.39387003e-2;
const K3: f64 = -3.4262402e-5;
const K4: f64 = 2.7040955e-8;
const K5: f64 = 6.7063522e-1;

const N1: f64 = 0.11670521452767e4;
const N2: f64 = -0.72421316703206e6;
const N3: f64 = -0.17073846940092e2;
const N4: f64 = 0.12020824702470e5;
const N5: f64 = -0.32325550322333e7;
const N6: f64 = 0.14915108613530e2;
const N7: f64 = -0.48232657361591e4;
const N8: f64 = 0.40511340542057e6;
const N9: f64 = -0.23855557567849;
const N10: f64 = 0.65017534844798e3;

fn pvs_ice(t: f64) -> f64 {
    let ln_p = K0 / t + K1 + (K2 + (K3 + K4 * t) * t) * t + K5 * t.ln();
    ln_p.exp()
}

fn pvs_water(t: f64) -> f64 {
    let th = t + N9 / (t - N10);
    let a = (th + N1) * th + N2;
    let b = (N3 * th + N4) * th + N5;
    let c = (N6 * th + N7) * th + N8;

    let p = 2.0 * c / (-b + (b * b - 4.0 * a * c).sqrt());
    p.powi(4) * 1e6
}

/// Saturation vapour pressure in Pa for a temperature in K.
///
/// Returns 0 outside `[MIN_T, MAX_T]`.
pub fn pvs(t: f64) -> f64 {
    if !(MIN_T..=MAX_T).contains(&t) {
        0.0
    } else if t < C_OFFSET {
        pvs_ice(t)
    } else {
        pvs_water(t)
    }
}

/// Find `x` with `f(x) == y` starting from `x0` using finite-difference
/// Newton steps. `None` when the iteration budget runs out.
pub fn solve<F>(f: F, y: f64, x0: f64) -> Option<f64>
where
    F: Fn(f64) -> f64,
{
    let mut x = x0;
    for _ in 0..MAX_ITERATIONS {
        let dx = x / 1000.0;
        let z = f(x);
        let x_new = x + dx * (y - z) / (f(x + dx) - z);
        if !x_new.is_finite() {
            return None;
        }
        if ((x_new - x) / x_new).abs() < CONVERGENCE {
            return Some(x_new);
        }
        x = x_new;
    }
    None
}

/// Dew point in C from relative humidity in % and temperature in C.
pub fn dew_point(relative_humidity: f64, temperature: f64) -> Option<f64> {
    let t = temperature + C_OFFSET;
    let target = relative_humidity / 100.0 * pvs(t);
    solve(pvs, target, t).map(|dew| dew - C_OFFSET)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pvs_reference_points() {
        // Triple point of water is 611.657 Pa.
        assert!((pvs(273.16) - 611.657).abs() < 0.5);
        // Boiling point at standard pressure.
        assert!((pvs(373.124) - 101_325.0).abs() < 50.0);
        // Ice branch just below freezing.
        assert!((pvs(263.15) - 259.9).abs() < 1.0);
    }

    #[test]
    fn test_pvs_outside_range_is_zero() {
        assert_eq!(pvs(172.9), 0.0);
        assert_eq!(pvs(678.1), 0.0);
    }

    #[test]
    fn test_saturated_air_dew_point_equals_temperature() {
        for temperature in [-40.0, -5.0, 0.0, 11.0, 25.0, 60.0] {
            let dew = dew_point(100.0, temperature).unwrap();
            assert!((dew - temperature).abs() < 0.05, "{temperature} -> {dew}");
        }
    }

    #[test]
    fn test_dew_point_known_value() {
        // 20 C at 50 % RH gives a dew point near 9.3 C.
        let dew = dew_point(50.0, 20.0).unwrap();
        assert!((dew - 9.26).abs() < 0.1, "{dew}");
    }

    #[test]
    fn test_dew_point_monotonic_in_humidity() {
        let mut previous = f64::MIN;
        for humidity in (10..=100).step_by(5) {
            let dew = dew_point(humidity as f64, 15.0).unwrap();
            assert!(dew >= previous, "{humidity} -> {dew} < {previous}");
            previous = dew;
        }
    }

    #[test]
    fn test_solver_reports_no_convergence() {
        // pvs is 0 below 173 K, so there is nothing to step along.
        assert_eq!(dew_point(50.0, -120.0), None);
        assert_eq!(solve(|_| 1.0, 2.0, 300.0), None);
    }
}
