//! Stateful sensor simulator for running the node without hardware.
//!
//! Models plausible room behaviour:
//! - Temporal coherence via random walk with mean reversion
//! - Per-reading electronic noise on the ADC channels
//! - Day/night cycle on the light sensor
//! - Occasional DHT read failures (timeouts, checksum errors)

use std::fmt;
use std::time::Instant;

use crate::error::SensorError;
use crate::gas::ADC_MAX;
use crate::sensors::SensorAdapter;

/// Light day/night cycle length.  Short so a dev session sees both phases.
const DIURNAL_PERIOD_S: f64 = 600.0;

/// Light day/night swing in ADC units.
const DIURNAL_AMPLITUDE: f64 = 300.0;

// ---------------------------------------------------------------------------
// Gaussian approximation (no extra dependency)
// ---------------------------------------------------------------------------

/// Approximate a sample from N(0,1) using the Irwin-Hall method:
/// sum of 12 uniform [0,1) values minus 6.
fn approx_std_normal() -> f64 {
    let mut sum: f64 = 0.0;
    for _ in 0..12 {
        sum += fastrand::f64();
    }
    sum - 6.0
}

fn gaussian(mean: f64, sigma: f64) -> f64 {
    mean + sigma * approx_std_normal()
}

// ---------------------------------------------------------------------------
// Scenario presets
// ---------------------------------------------------------------------------

/// Simulation profiles selectable via `[sim] scenario` or `SIM_SCENARIO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Warm room, clean air, daylight.  Nothing triggers.
    Normal,
    /// Temperature sits above the fan threshold.
    Hot,
    /// Gas reading high enough to sound the alarm.
    Smoky,
    /// LDR reads dark, so the lamp comes on.
    Dark,
    /// Normal readings but the DHT fails roughly a third of the time.
    /// Exercises the fan ERROR path.
    Flaky,
}

impl Scenario {
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "hot" => Self::Hot,
            "smoky" => Self::Smoky,
            "dark" => Self::Dark,
            "flaky" => Self::Flaky,
            _ => Self::Normal, // default
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Hot => write!(f, "hot"),
            Self::Smoky => write!(f, "smoky"),
            Self::Dark => write!(f, "dark"),
            Self::Flaky => write!(f, "flaky"),
        }
    }
}

// ---------------------------------------------------------------------------
// Random walk channel
// ---------------------------------------------------------------------------

struct Walk {
    value: f64,
    center: f64,
    step_sigma: f64,
    mean_reversion: f64,
    min: f64,
    max: f64,
}

impl Walk {
    fn new(center: f64, step_sigma: f64, min: f64, max: f64) -> Self {
        Self {
            value: center,
            center,
            step_sigma,
            mean_reversion: 0.05,
            min,
            max,
        }
    }

    fn step(&mut self) -> f64 {
        let pull = self.mean_reversion * (self.center - self.value);
        let walk = gaussian(0.0, self.step_sigma);
        self.value = (self.value + pull + walk).clamp(self.min, self.max);
        self.value
    }
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

pub struct SimulatedSensors {
    temperature: Walk,
    humidity: Walk,
    gas: Walk,
    light: Walk,
    /// Per-read ADC noise sigma.
    adc_noise: f64,
    dht_failure_prob: f32,
    started: Instant,
}

impl SimulatedSensors {
    pub fn new(scenario: Scenario) -> Self {
        // (temp °C, humidity %, gas raw, light raw, DHT failure probability)
        let (temp, hum, gas, light, fail) = match scenario {
            Scenario::Normal => (29.0, 65.0, 900.0, 1200.0, 0.02_f32),
            Scenario::Hot => (39.0, 45.0, 900.0, 1200.0, 0.02),
            Scenario::Smoky => (30.0, 60.0, 3200.0, 1200.0, 0.02),
            Scenario::Dark => (27.0, 70.0, 700.0, 3200.0, 0.02),
            Scenario::Flaky => (29.0, 65.0, 900.0, 1200.0, 0.30),
        };

        let adc_max = f64::from(ADC_MAX);
        Self {
            temperature: Walk::new(temp, 0.3, -10.0, 60.0),
            humidity: Walk::new(hum, 0.8, 5.0, 95.0),
            gas: Walk::new(gas, 40.0, 0.0, adc_max),
            light: Walk::new(light, 30.0, 0.0, adc_max),
            adc_noise: 15.0,
            dht_failure_prob: fail,
            started: Instant::now(),
        }
    }

    fn adc(&self, base: f64) -> u16 {
        gaussian(base, self.adc_noise)
            .round()
            .clamp(0.0, f64::from(ADC_MAX)) as u16
    }
}

impl SensorAdapter for SimulatedSensors {
    fn read_temperature_humidity(&mut self) -> Result<(f32, f32), SensorError> {
        let t = self.temperature.step();
        let h = self.humidity.step();

        if fastrand::f32() < self.dht_failure_prob {
            return Err(if fastrand::bool() {
                SensorError::NoResponse
            } else {
                SensorError::Checksum
            });
        }

        // DHT11 measuring range; anything outside is a bad frame.
        if !(0.0..=50.0).contains(&t) || !(20.0..=90.0).contains(&h) {
            return Err(SensorError::OutOfRange);
        }

        // DHT11 resolution is 1 °C / 1 %RH.
        Ok((t.round() as f32, h.round() as f32))
    }

    fn read_gas_raw(&mut self) -> u16 {
        let base = self.gas.step();
        self.adc(base)
    }

    fn read_light_raw(&mut self) -> u16 {
        let base = self.light.step();
        let phase =
            2.0 * std::f64::consts::PI * self.started.elapsed().as_secs_f64() / DIURNAL_PERIOD_S;
        self.adc(base + DIURNAL_AMPLITUDE * phase.sin())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
