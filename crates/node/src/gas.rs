//! Gas/vapour estimates derived from the raw MQ-135 reading.
//!
//! The sensor is uncalibrated; each estimate is a linear rescaling of the
//! 12-bit ADC value onto a fixed full-scale range, rounded to 2 decimals.

use serde::Serialize;

/// Full-scale value of the 12-bit ADC.
pub const ADC_MAX: u16 = 4095;

pub const CO_SCALE: f64 = 1000.0;
pub const CO2_SCALE: f64 = 800.0;
pub const NH4_SCALE: f64 = 500.0;
pub const ALCOHOL_SCALE: f64 = 300.0;
pub const TOLUENE_SCALE: f64 = 200.0;
pub const ACETONE_SCALE: f64 = 100.0;

/// Field order and JSON keys match what dashboards already consume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GasConcentrations {
    pub co: f64,
    pub co2: f64,
    pub nh4: f64,
    #[serde(rename = "Alcohol")]
    pub alcohol: f64,
    #[serde(rename = "Tolueno")]
    pub toluene: f64,
    #[serde(rename = "Aceton")]
    pub acetone: f64,
}

impl GasConcentrations {
    pub fn from_raw(raw: u16) -> Self {
        Self {
            co: estimate(raw, CO_SCALE),
            co2: estimate(raw, CO2_SCALE),
            nh4: estimate(raw, NH4_SCALE),
            alcohol: estimate(raw, ALCOHOL_SCALE),
            toluene: estimate(raw, TOLUENE_SCALE),
            acetone: estimate(raw, ACETONE_SCALE),
        }
    }
}

fn estimate(raw: u16, scale: f64) -> f64 {
    round_to(f64::from(raw) / f64::from(ADC_MAX) * scale, 2)
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn all(g: &GasConcentrations) -> [f64; 6] {
        [g.co, g.co2, g.nh4, g.alcohol, g.toluene, g.acetone]
    }

    #[test]
    fn zero_raw_is_all_zero() {
        assert_eq!(all(&GasConcentrations::from_raw(0)), [0.0; 6]);
    }

    #[test]
    fn full_scale_raw_hits_each_scale() {
        let g = GasConcentrations::from_raw(ADC_MAX);
        assert_eq!(all(&g), [1000.0, 800.0, 500.0, 300.0, 200.0, 100.0]);
    }

    #[test]
    fn midscale_values_are_rounded_to_two_places() {
        // 2048 / 4095 * 1000 = 500.1221...
        let g = GasConcentrations::from_raw(2048);
        assert_eq!(g.co, 500.12);
        assert_eq!(g.co2, 400.10);
        assert_eq!(g.acetone, 50.01);
    }

    #[test]
    fn every_raw_value_matches_formula_and_is_monotonic() {
        let scales = [
            CO_SCALE,
            CO2_SCALE,
            NH4_SCALE,
            ALCOHOL_SCALE,
            TOLUENE_SCALE,
            ACETONE_SCALE,
        ];
        let mut prev = all(&GasConcentrations::from_raw(0));
        for raw in 0..=ADC_MAX {
            let cur = all(&GasConcentrations::from_raw(raw));
            for (i, scale) in scales.iter().enumerate() {
                let expected = ((f64::from(raw) / 4095.0 * scale) * 100.0).round() / 100.0;
                assert_eq!(cur[i], expected, "raw={raw} scale={scale}");
                assert!(cur[i] >= prev[i], "not monotonic at raw={raw} scale={scale}");
            }
            prev = cur;
        }
    }

    #[test]
    fn serializes_with_dashboard_keys() {
        let json = serde_json::to_value(GasConcentrations::from_raw(0)).unwrap();
        let obj = json.as_object().unwrap();
        let keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        for key in ["co", "co2", "nh4", "Alcohol", "Tolueno", "Aceton"] {
            assert!(keys.contains(&key), "missing key {key}");
        }
        assert_eq!(obj.len(), 6);
    }

    #[test]
    fn round_to_one_decimal() {
        assert_eq!(round_to(27.349, 1), 27.3);
        assert_eq!(round_to(27.36, 1), 27.4);
    }
}
