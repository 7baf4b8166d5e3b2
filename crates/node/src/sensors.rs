//! Sensor adapter port and per-cycle sampling.

use tracing::warn;

use crate::error::SensorError;
use crate::gas::ADC_MAX;

// ---------------------------------------------------------------------------
// Port
// ---------------------------------------------------------------------------

/// Read side of the three physical sensors (DHT temperature/humidity,
/// MQ-135 gas, LDR ambient light).
pub trait SensorAdapter {
    /// Temperature in °C and relative humidity in %.
    fn read_temperature_humidity(&mut self) -> Result<(f32, f32), SensorError>;

    /// Raw 12-bit gas sensor ADC value.
    fn read_gas_raw(&mut self) -> u16;

    /// Raw 12-bit light sensor ADC value.  Higher means darker with the
    /// default divider wiring.
    fn read_light_raw(&mut self) -> u16;
}

// ---------------------------------------------------------------------------
// Sample
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    /// `None` when the temperature/humidity read failed this cycle.
    pub temperature_c: Option<f32>,
    pub humidity_pct: Option<f32>,
    pub gas_raw: u16,
    pub light_raw: u16,
}

/// Read every sensor once.  A temperature/humidity failure is logged and
/// recorded as absent; it never aborts the cycle.
pub fn read_sample<S: SensorAdapter>(sensors: &mut S) -> SensorSample {
    let (temperature_c, humidity_pct) = match sensors.read_temperature_humidity() {
        Ok((t, h)) => (Some(t), Some(h)),
        Err(e) => {
            warn!("temperature/humidity read failed: {e}");
            (None, None)
        }
    };

    // Clamp against bus glitches; the ADC is 12-bit.
    let gas_raw = sensors.read_gas_raw().min(ADC_MAX);
    let light_raw = sensors.read_light_raw().min(ADC_MAX);

    SensorSample {
        temperature_c,
        humidity_pct,
        gas_raw,
        light_raw,
    }
}

// ===========================================================================
// Tests
// ===========================================================================
