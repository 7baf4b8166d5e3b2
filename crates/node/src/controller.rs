//! Control loop: manual-override state machine and threshold policy.
//!
//! ## Per-actuator override state machine (lamp, fan)
//!
//! ```text
//!        command msg                 command msg (refresh timestamp)
//! AUTO ──────────────▶ MANUAL ◀──────────────┐
//!  ▲                     │  └─────────────────┘
//!  └─[now - last > timeout, checked every loop iteration]
//! ```
//!
//! The buzzer has no override path: the alarm policy runs every cycle.
//!
//! Nothing here performs I/O on the link.  Command handling and the
//! periodic cycle return [`Outbound`] messages for the caller to publish.

use tracing::{debug, info};

use crate::clock::{elapsed_at_least, elapsed_exceeds, Ticks};
use crate::error::ParseError;
use crate::gas::{round_to, GasConcentrations};
use crate::messages::{parse_command, ActuatorStatus, Outbound, Switch, Target, Telemetry};
use crate::relay::ActuatorAdapter;
use crate::sensors::{read_sample, SensorAdapter};

// ---------------------------------------------------------------------------
// Override state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Auto,
    Manual,
}

/// Override bookkeeping for one actuator.  `last_command` is meaningless
/// while `active` is false.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverrideState {
    active: bool,
    last_command: Ticks,
}

impl OverrideState {
    pub fn mode(&self) -> Mode {
        if self.active {
            Mode::Manual
        } else {
            Mode::Auto
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Enter (or extend) manual mode.
    fn engage(&mut self, now: Ticks) {
        self.active = true;
        self.last_command = now;
    }

    /// Drop back to automatic once the timeout has passed.  Returns `true`
    /// on the MANUAL → AUTO transition.
    fn expire(&mut self, now: Ticks, timeout_ms: u32) -> bool {
        if self.active && elapsed_exceeds(now, self.last_command, timeout_ms) {
            self.active = false;
            return true;
        }
        false
    }
}

/// Everything the control loop carries between iterations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerState {
    pub lamp: OverrideState,
    pub fan: OverrideState,
    pub last_sensing: Ticks,
}

impl ControllerState {
    pub fn new(now: Ticks) -> Self {
        Self {
            lamp: OverrideState::default(),
            fan: OverrideState::default(),
            last_sensing: now,
        }
    }

    pub fn override_state(&self, target: Target) -> &OverrideState {
        match target {
            Target::Lamp => &self.lamp,
            Target::Fan => &self.fan,
        }
    }

    fn override_mut(&mut self, target: Target) -> &mut OverrideState {
        match target {
            Target::Lamp => &mut self.lamp,
            Target::Fan => &mut self.fan,
        }
    }
}

// ---------------------------------------------------------------------------
// Policy & timing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Policy {
    /// LDR raw value that separates light from dark.
    pub light_threshold: u16,
    /// `true` when readings above the threshold mean dark (the usual LDR
    /// divider wiring).  Strict comparison either way.
    pub dark_above_threshold: bool,
    /// Fan runs when temperature is strictly above this.
    pub fan_on_above_c: f32,
    pub co_alarm_ppm: f64,
    pub co2_alarm_ppm: f64,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            light_threshold: 2000,
            dark_above_threshold: true,
            fan_on_above_c: 35.0,
            co_alarm_ppm: 600.0,
            co2_alarm_ppm: 500.0,
        }
    }
}

impl Policy {
    pub fn is_dark(&self, light_raw: u16) -> bool {
        if self.dark_above_threshold {
            light_raw > self.light_threshold
        } else {
            light_raw < self.light_threshold
        }
    }

    pub fn fan_wanted(&self, temperature_c: f32) -> bool {
        temperature_c > self.fan_on_above_c
    }

    pub fn alarm_wanted(&self, gas: &GasConcentrations) -> bool {
        gas.co > self.co_alarm_ppm || gas.co2 > self.co2_alarm_ppm
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub sensing_interval_ms: u32,
    pub override_timeout_ms: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            sensing_interval_ms: 5_000,
            override_timeout_ms: 300_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct Controller<S, A> {
    state: ControllerState,
    sensors: S,
    actuators: A,
    policy: Policy,
    timing: Timing,
}

impl<S: SensorAdapter, A: ActuatorAdapter> Controller<S, A> {
    /// Both actuators start in AUTO; the first cycle runs one sensing
    /// interval after `now`.
    pub fn new(sensors: S, actuators: A, policy: Policy, timing: Timing, now: Ticks) -> Self {
        Self {
            state: ControllerState::new(now),
            sensors,
            actuators,
            policy,
            timing,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// Apply an inbound command.  Unknown topics yield `Ok(None)`; a
    /// malformed payload yields `Err` and leaves state and outputs untouched.
    pub fn handle_command(
        &mut self,
        topic: &str,
        payload: &[u8],
        now: Ticks,
    ) -> Result<Option<Outbound>, ParseError> {
        let Some(target) = Target::from_command_topic(topic) else {
            return Ok(None);
        };
        let switch = parse_command(payload)?;

        let was = self.state.override_state(target).mode();
        self.state.override_mut(target).engage(now);
        self.drive(target, switch.is_on());

        info!(
            actuator = target.name(),
            status = ?switch,
            extended = was == Mode::Manual,
            "manual override"
        );
        Ok(Some(Outbound::Status(target, switch)))
    }

    /// Return timed-out overrides to automatic control.  Emits nothing; the
    /// next cycle re-evaluates policy and reports the result.
    pub fn expire_overrides(&mut self, now: Ticks) {
        let timeout = self.timing.override_timeout_ms;
        for target in [Target::Lamp, Target::Fan] {
            if self.state.override_mut(target).expire(now, timeout) {
                info!(actuator = target.name(), "override timed out, back to automatic");
            }
        }
    }

    pub fn sensing_due(&self, now: Ticks) -> bool {
        elapsed_at_least(now, self.state.last_sensing, self.timing.sensing_interval_ms)
    }

    /// One sensing/decision cycle.  Returns status messages for actuators
    /// under automatic control followed by the telemetry record.
    pub fn run_cycle(&mut self, now: Ticks) -> Vec<Outbound> {
        self.state.last_sensing = now;

        let sample = read_sample(&mut self.sensors);
        let gas = GasConcentrations::from_raw(sample.gas_raw);
        let mut out = Vec::with_capacity(3);

        // ── Lamp ────────────────────────────────────────────────
        let lamp = if self.state.lamp.is_active() {
            ActuatorStatus::Manual
        } else {
            let s = Switch::from_bool(self.policy.is_dark(sample.light_raw));
            self.actuators.set_light(s.is_on());
            out.push(Outbound::Status(Target::Lamp, s));
            s.into()
        };

        // ── Fan ─────────────────────────────────────────────────
        let fan = if self.state.fan.is_active() {
            ActuatorStatus::Manual
        } else if let Some(t) = sample.temperature_c {
            let s = Switch::from_bool(self.policy.fan_wanted(t));
            self.actuators.set_fan(s.is_on());
            out.push(Outbound::Status(Target::Fan, s));
            s.into()
        } else {
            // No reading: leave the fan where it is and say so.
            ActuatorStatus::Error
        };

        // ── Buzzer (no override) ────────────────────────────────
        let buzzer = Switch::from_bool(self.policy.alarm_wanted(&gas));
        self.actuators.set_alarm(buzzer.is_on());

        let telemetry = Telemetry {
            suhu: sample.temperature_c.map(|t| round_to(f64::from(t), 1)),
            kelembapan: sample.humidity_pct.map(|h| round_to(f64::from(h), 1)),
            gas,
            ldr: sample.light_raw,
            lamp,
            fan,
            buzzer,
        };
        debug!(?telemetry, "cycle complete");
        out.push(Outbound::Telemetry(telemetry));
        out
    }

    fn drive(&mut self, target: Target, on: bool) {
        match target {
            Target::Lamp => self.actuators.set_light(on),
            Target::Fan => self.actuators.set_fan(on),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
