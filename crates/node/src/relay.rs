//! Lamp, fan and buzzer outputs via GPIO relays. The `gpio` feature gates
//! the real rppal driver; without it, a mock board records pin levels and
//! logs state changes.

use anyhow::Result;
use std::fmt;
use tracing::info;

#[cfg(feature = "gpio")]
use rppal::gpio::{Gpio, OutputPin};

// ---------------------------------------------------------------------------
// Port
// ---------------------------------------------------------------------------

/// Write side of the three binary outputs.
pub trait ActuatorAdapter {
    fn set_light(&mut self, energized: bool);
    fn set_fan(&mut self, energized: bool);
    fn set_alarm(&mut self, energized: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Lamp,
    Fan,
    Buzzer,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Lamp, Channel::Fan, Channel::Buzzer];

    fn index(self) -> usize {
        match self {
            Self::Lamp => 0,
            Self::Fan => 1,
            Self::Buzzer => 2,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lamp => write!(f, "lamp"),
            Self::Fan => write!(f, "fan"),
            Self::Buzzer => write!(f, "buzzer"),
        }
    }
}

/// BCM pin assignment for each channel.
#[derive(Debug, Clone, Copy)]
pub struct RelayPins {
    pub lamp: u8,
    pub fan: u8,
    pub buzzer: u8,
}

impl RelayPins {
    fn pin(&self, ch: Channel) -> u8 {
        match ch {
            Channel::Lamp => self.lamp,
            Channel::Fan => self.fan,
            Channel::Buzzer => self.buzzer,
        }
    }
}

/// Signal level for a requested relay state.  Active-low boards are
/// energized by driving the pin LOW (0).
pub fn signal_high(energized: bool, active_low: bool) -> bool {
    energized != active_low
}

// ---------------------------------------------------------------------------
// Real GPIO relay board (requires rppal and Raspberry Pi hardware)
// ---------------------------------------------------------------------------
#[cfg(feature = "gpio")]
pub struct RelayBoard {
    pins: [OutputPin; 3], // indexed by Channel
    active_low: bool,
}

#[cfg(feature = "gpio")]
impl RelayBoard {
    pub fn new(pins: RelayPins, active_low: bool) -> Result<Self> {
        let gpio = Gpio::new()?;
        let open = |ch: Channel| -> Result<OutputPin> {
            let mut pin = gpio.get(pins.pin(ch))?.into_output();
            // Fail-safe: de-energized at startup
            if signal_high(false, active_low) {
                pin.set_high();
            } else {
                pin.set_low();
            }
            Ok(pin)
        };
        let pins = [open(Channel::Lamp)?, open(Channel::Fan)?, open(Channel::Buzzer)?];
        info!(active_low, "relay board initialised");
        Ok(Self { pins, active_low })
    }

    pub fn set(&mut self, ch: Channel, energized: bool) {
        let pin = &mut self.pins[ch.index()];
        if signal_high(energized, self.active_low) {
            pin.set_high();
        } else {
            pin.set_low();
        }
    }
}

// ---------------------------------------------------------------------------
// Mock relay board (no hardware, logs state changes)
// ---------------------------------------------------------------------------
#[cfg(not(feature = "gpio"))]
pub struct RelayBoard {
    pub(crate) high: [bool; 3], // signal level per Channel
    active_low: bool,
}

#[cfg(not(feature = "gpio"))]
impl RelayBoard {
    pub fn new(pins: RelayPins, active_low: bool) -> Result<Self> {
        for ch in Channel::ALL {
            info!(channel = %ch, gpio = pins.pin(ch), "[mock-gpio] registered (not wired)");
        }
        let off = signal_high(false, active_low);
        Ok(Self {
            high: [off; 3],
            active_low,
        })
    }

    pub fn set(&mut self, ch: Channel, energized: bool) {
        let level = signal_high(energized, self.active_low);
        let slot = &mut self.high[ch.index()];
        if *slot != level {
            info!(
                channel = %ch,
                level = u8::from(level),
                "[mock-gpio] {ch} {}",
                if energized { "ON" } else { "OFF" }
            );
        }
        *slot = level;
    }
}

impl RelayBoard {
    pub fn all_off(&mut self) {
        for ch in Channel::ALL {
            self.set(ch, false);
        }
    }
}

impl ActuatorAdapter for RelayBoard {
    fn set_light(&mut self, energized: bool) {
        self.set(Channel::Lamp, energized);
    }

    fn set_fan(&mut self, energized: bool) {
        self.set(Channel::Fan, energized);
    }

    fn set_alarm(&mut self, energized: bool) {
        self.set(Channel::Buzzer, energized);
    }
}

// ===========================================================================
// Tests
// ===========================================================================
