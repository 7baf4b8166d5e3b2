//! TOML config file loading, environment overrides and validation.
//!
//! Every section is optional; a missing file means factory defaults.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::controller::{Policy, Timing};
use crate::gas::ADC_MAX;
use crate::link::LinkSettings;
use crate::mqtt::MqttSettings;
use crate::relay::RelayPins;
use crate::sim::Scenario;

// ---------------------------------------------------------------------------
// Config file structures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mqtt: MqttSection,
    pub network: NetworkSection,
    pub timing: TimingSection,
    pub thresholds: ThresholdSection,
    pub relays: RelaySection,
    pub sim: SimSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttSection {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive_secs: u64,
    pub connect_timeout_ms: u32,
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            client_id: "envmon-node".to_string(),
            keep_alive_secs: 30,
            connect_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    /// Interface whose operstate must be `up`, e.g. `wlan0`.
    pub interface: Option<String>,
    pub association_poll_ms: u32,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            interface: None,
            association_poll_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingSection {
    pub sensing_interval_ms: u32,
    pub override_timeout_ms: u32,
    pub loop_sleep_ms: u32,
    /// Delay between failed session connect attempts.
    pub reconnect_delay_ms: u32,
    /// Pause after a mid-loop session failure before reconnecting.
    pub recovery_delay_ms: u32,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            sensing_interval_ms: 5_000,
            override_timeout_ms: 300_000,
            loop_sleep_ms: 100,
            reconnect_delay_ms: 5_000,
            recovery_delay_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThresholdSection {
    pub light_raw: u16,
    pub dark_above_threshold: bool,
    pub fan_on_above_c: f32,
    pub co_alarm_ppm: f64,
    pub co2_alarm_ppm: f64,
}

impl Default for ThresholdSection {
    fn default() -> Self {
        let p = Policy::default();
        Self {
            light_raw: p.light_threshold,
            dark_above_threshold: p.dark_above_threshold,
            fan_on_above_c: p.fan_on_above_c,
            co_alarm_ppm: p.co_alarm_ppm,
            co2_alarm_ppm: p.co2_alarm_ppm,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelaySection {
    pub lamp_gpio: i64,
    pub fan_gpio: i64,
    pub buzzer_gpio: i64,
    pub active_low: bool,
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            lamp_gpio: 5,
            fan_gpio: 18,
            buzzer_gpio: 19,
            active_low: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimSection {
    pub scenario: String,
}

impl Default for SimSection {
    fn default() -> Self {
        Self {
            scenario: "normal".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// GPIO whitelist
// ---------------------------------------------------------------------------

/// BCM GPIO pins available on the Raspberry Pi 40-pin header for general
/// use. GPIO 0-1 are reserved for the ID EEPROM and must never be used.
/// GPIO 28+ are not exposed on the standard header.
const VALID_GPIO_PINS: &[i64] = &[
    2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27,
];

/// Longest duration the wrapping tick arithmetic can compare reliably.
const MAX_TICK_SPAN_MS: u32 = i32::MAX as u32;

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Config {
    /// Validate all sections. Returns `Ok(())` or an error describing every
    /// violation found (not just the first one).
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        self.validate_mqtt(&mut errors);
        self.validate_timing(&mut errors);
        self.validate_thresholds(&mut errors);
        self.validate_relays(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }

    fn validate_mqtt(&self, errors: &mut Vec<String>) {
        let m = &self.mqtt;
        if m.host.trim().is_empty() {
            errors.push("mqtt.host is empty".to_string());
        }
        if m.port == 0 {
            errors.push("mqtt.port must be non-zero".to_string());
        }
        if m.client_id.trim().is_empty() {
            errors.push("mqtt.client_id is empty".to_string());
        }
        if m.keep_alive_secs < 5 {
            errors.push(format!(
                "mqtt.keep_alive_secs must be at least 5, got {}",
                m.keep_alive_secs
            ));
        }
        if m.connect_timeout_ms == 0 {
            errors.push("mqtt.connect_timeout_ms must be positive".to_string());
        }
        if let Some(iface) = &self.network.interface {
            if iface.trim().is_empty() || iface.contains('/') {
                errors.push(format!("network.interface {iface:?} is not a valid name"));
            }
        }
        if self.network.association_poll_ms == 0 {
            errors.push("network.association_poll_ms must be positive".to_string());
        }
    }

    fn validate_timing(&self, errors: &mut Vec<String>) {
        let t = &self.timing;
        for (name, value) in [
            ("sensing_interval_ms", t.sensing_interval_ms),
            ("override_timeout_ms", t.override_timeout_ms),
            ("loop_sleep_ms", t.loop_sleep_ms),
            ("reconnect_delay_ms", t.reconnect_delay_ms),
            ("recovery_delay_ms", t.recovery_delay_ms),
        ] {
            if value == 0 {
                errors.push(format!("timing.{name} must be positive, got 0"));
            } else if value > MAX_TICK_SPAN_MS {
                errors.push(format!(
                    "timing.{name} {value} exceeds the tick counter window ({MAX_TICK_SPAN_MS} ms)"
                ));
            }
        }

        // Zero durations are already reported above.
        if t.loop_sleep_ms > 0
            && t.sensing_interval_ms > 0
            && t.loop_sleep_ms >= t.sensing_interval_ms
        {
            errors.push(format!(
                "timing.loop_sleep_ms ({}) must be shorter than sensing_interval_ms ({})",
                t.loop_sleep_ms, t.sensing_interval_ms
            ));
        }
    }

    fn validate_thresholds(&self, errors: &mut Vec<String>) {
        let th = &self.thresholds;
        if th.light_raw > ADC_MAX {
            errors.push(format!(
                "thresholds.light_raw {} out of ADC range [0, {ADC_MAX}]",
                th.light_raw
            ));
        }
        if !th.fan_on_above_c.is_finite() {
            errors.push("thresholds.fan_on_above_c must be finite".to_string());
        }
        for (name, value) in [
            ("co_alarm_ppm", th.co_alarm_ppm),
            ("co2_alarm_ppm", th.co2_alarm_ppm),
        ] {
            if !value.is_finite() || value < 0.0 {
                errors.push(format!(
                    "thresholds.{name} must be a non-negative number, got {value}"
                ));
            }
        }
    }

    fn validate_relays(&self, errors: &mut Vec<String>) {
        let mut seen_pins: HashSet<i64> = HashSet::new();
        for (name, pin) in [
            ("lamp_gpio", self.relays.lamp_gpio),
            ("fan_gpio", self.relays.fan_gpio),
            ("buzzer_gpio", self.relays.buzzer_gpio),
        ] {
            if !VALID_GPIO_PINS.contains(&pin) {
                errors.push(format!(
                    "relays.{name} {pin} is not a valid BCM GPIO pin (allowed: 2-27)"
                ));
            } else if !seen_pins.insert(pin) {
                errors.push(format!(
                    "relays.{name} {pin} is already used by another relay"
                ));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Derived settings
// ---------------------------------------------------------------------------

impl Config {
    pub fn policy(&self) -> Policy {
        let th = &self.thresholds;
        Policy {
            light_threshold: th.light_raw,
            dark_above_threshold: th.dark_above_threshold,
            fan_on_above_c: th.fan_on_above_c,
            co_alarm_ppm: th.co_alarm_ppm,
            co2_alarm_ppm: th.co2_alarm_ppm,
        }
    }

    pub fn timing(&self) -> Timing {
        Timing {
            sensing_interval_ms: self.timing.sensing_interval_ms,
            override_timeout_ms: self.timing.override_timeout_ms,
        }
    }

    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            association_poll: ms(self.network.association_poll_ms),
            reconnect_delay: ms(self.timing.reconnect_delay_ms),
        }
    }

    pub fn mqtt_settings(&self) -> MqttSettings {
        MqttSettings {
            host: self.mqtt.host.clone(),
            port: self.mqtt.port,
            client_id: self.mqtt.client_id.clone(),
            keep_alive: Duration::from_secs(self.mqtt.keep_alive_secs),
            connect_timeout: ms(self.mqtt.connect_timeout_ms),
        }
    }

    /// Only meaningful after `validate()`: pins are whitelisted to 2..=27.
    pub fn relay_pins(&self) -> RelayPins {
        RelayPins {
            lamp: self.relays.lamp_gpio as u8,
            fan: self.relays.fan_gpio as u8,
            buzzer: self.relays.buzzer_gpio as u8,
        }
    }

    pub fn scenario(&self) -> Scenario {
        Scenario::from_str_lossy(&self.sim.scenario)
    }

    pub fn loop_sleep(&self) -> Duration {
        ms(self.timing.loop_sleep_ms)
    }

    pub fn recovery_delay(&self) -> Duration {
        ms(self.timing.recovery_delay_ms)
    }
}

fn ms(v: u32) -> Duration {
    Duration::from_millis(u64::from(v))
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Parse a TOML config string.  Does not validate.
pub fn parse(contents: &str) -> Result<Config> {
    toml::from_str(contents).context("failed to parse config")
}

/// Read the config file at `path` (defaults when it does not exist), apply
/// environment overrides via `env`, then validate.
pub fn load(path: &str, env: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let mut config = if Path::new(path).exists() {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;
        parse(&contents).with_context(|| format!("in {path}"))?
    } else {
        tracing::info!(path, "no config file, using defaults");
        Config::default()
    };

    apply_env(&mut config, env)?;
    config
        .validate()
        .with_context(|| format!("invalid config: {path}"))?;
    Ok(config)
}

/// Overlay `MQTT_HOST`, `MQTT_PORT`, `MQTT_CLIENT_ID`, `NET_IFACE` and
/// `SIM_SCENARIO` when set.
pub fn apply_env(config: &mut Config, env: impl Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(host) = env("MQTT_HOST") {
        config.mqtt.host = host;
    }
    if let Some(port) = env("MQTT_PORT") {
        config.mqtt.port = port
            .trim()
            .parse()
            .with_context(|| format!("invalid MQTT_PORT: {port:?}"))?;
    }
    if let Some(id) = env("MQTT_CLIENT_ID") {
        config.mqtt.client_id = id;
    }
    if let Some(iface) = env("NET_IFACE") {
        config.network.interface = if iface.is_empty() { None } else { Some(iface) };
    }
    if let Some(scenario) = env("SIM_SCENARIO") {
        config.sim.scenario = scenario;
    }
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
