//! Define the DomeStatus struct, representing everything a session publishes.

use crate::{command::DigitalIo, sensors::SensorSnapshot};
use std::fmt;

/// Result of a user command that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Already satisfied; nothing left to do.
    Complete,
    /// Accepted; completion is detected on later ticks.
    InProgress,
    /// Redundant with what is already running.
    Ignored,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DomeMotion {
    #[default]
    Ready,
    Homing,
    Derotating,
    MovingToTarget,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ShutterState {
    #[default]
    Unknown,
    Open,
    Closed,
    Moving,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ParkState {
    #[default]
    Unknown,
    Unparked,
    Parking,
    Parked,
    Unparking,
}

/// The 13 digital inputs shown to the operator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InputSensors {
    pub az_counter: bool,
    pub rotate_ccw: bool,
    pub home: bool,
    pub shutter1_open: bool,
    pub shutter1_closed: bool,
    pub shutter2_open: bool,
    pub shutter2_closed: bool,
    pub scope_home: bool,
    pub rain: bool,
    pub cloud: bool,
    pub safe: bool,
    pub rotary_link: bool,
    pub free_input: bool,
}

impl InputSensors {
    pub fn from_digital(state: &[u8]) -> InputSensors {
        InputSensors {
            az_counter: DigitalIo::InEncoder.is_set(state),
            // The card has no line for this one.
            rotate_ccw: false,
            home: DigitalIo::InHome.is_set(state),
            shutter1_open: DigitalIo::InOpen1.is_set(state),
            shutter1_closed: DigitalIo::InClosed1.is_set(state),
            shutter2_open: DigitalIo::InOpen2.is_set(state),
            shutter2_closed: DigitalIo::InClosed2.is_set(state),
            scope_home: DigitalIo::InScopeHome.is_set(state),
            rain: DigitalIo::InRain.is_set(state),
            cloud: DigitalIo::InCloud.is_set(state),
            safe: DigitalIo::InSafe.is_set(state),
            rotary_link: DigitalIo::InRotaryLink.is_set(state),
            free_input: DigitalIo::InFree.is_set(state),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relay {
    Ccd,
    Scope,
    Light,
    Fan,
    Relay1,
    Relay2,
    Relay3,
    Relay4,
}

impl Relay {
    pub fn output(&self) -> DigitalIo {
        match self {
            Relay::Ccd => DigitalIo::OutCcd,
            Relay::Scope => DigitalIo::OutScope,
            Relay::Light => DigitalIo::OutLight,
            Relay::Fan => DigitalIo::OutFan,
            Relay::Relay1 => DigitalIo::OutRelay1,
            Relay::Relay2 => DigitalIo::OutRelay2,
            Relay::Relay3 => DigitalIo::OutRelay3,
            Relay::Relay4 => DigitalIo::OutRelay4,
        }
    }

    pub fn from_name(name: &str) -> Option<Relay> {
        match name.to_lowercase().as_str() {
            "ccd" => Some(Relay::Ccd),
            "scope" | "telescope" => Some(Relay::Scope),
            "light" => Some(Relay::Light),
            "fan" => Some(Relay::Fan),
            "1" | "relay1" => Some(Relay::Relay1),
            "2" | "relay2" => Some(Relay::Relay2),
            "3" | "relay3" => Some(Relay::Relay3),
            "4" | "relay4" => Some(Relay::Relay4),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStates {
    pub ccd: bool,
    pub scope: bool,
    pub light: bool,
    pub fan: bool,
    pub relay1: bool,
    pub relay2: bool,
    pub relay3: bool,
    pub relay4: bool,
}

impl RelayStates {
    pub fn from_digital(state: &[u8]) -> RelayStates {
        RelayStates {
            ccd: Relay::Ccd.output().is_set(state),
            scope: Relay::Scope.output().is_set(state),
            light: Relay::Light.output().is_set(state),
            fan: Relay::Fan.output().is_set(state),
            relay1: Relay::Relay1.output().is_set(state),
            relay2: Relay::Relay2.output().is_set(state),
            relay3: Relay::Relay3.output().is_set(state),
            relay4: Relay::Relay4.output().is_set(state),
        }
    }
}

/// Firmware versions, decoded from integer hundredths.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct FirmwareVersions {
    pub main: f64,
    pub rotary: f64,
}

impl FirmwareVersions {
    pub fn from_hundredths(main: u16, rotary: u16) -> FirmwareVersions {
        FirmwareVersions {
            main: main as f64 / 100.0,
            rotary: rotary as f64 / 100.0,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DomeStatus {
    pub azimuth: f64,
    pub target_azimuth: f64,
    pub motion: DomeMotion,
    pub shutter: ShutterState,
    pub park: ParkState,
    pub inputs: InputSensors,
    pub relays: RelayStates,
    pub sensors: SensorSnapshot,
    pub firmware: FirmwareVersions,
}

impl fmt::Display for DomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dew_point = self
            .sensors
            .dew_point
            .map(|dew| format!("{dew:.2}"))
            .unwrap_or_else(|| "n/a".to_string());
        write!(
            f,
            "AZ {:6.2} TARGET {:6.2} {:?}
SHUTTER {:?} PARK {:?}
Home sensor: {}
Shutter open/closed switches: {}/{}
Rain: {} Cloud: {} Safe: {}
Relays CCD {} SCOPE {} LIGHT {} FAN {} R1 {} R2 {} R3 {} R4 {}
Temperature in/out/humidity sensor: {:.2}/{:.2}/{:.2}
Humidity: {:.2} Pressure: {:.1} Dew point: {}
Link strength: {:.0} Firmware main/rotary: {:.2}/{:.2}",
            self.azimuth,
            self.target_azimuth,
            self.motion,
            self.shutter,
            self.park,
            self.inputs.home as u8,
            self.inputs.shutter1_open as u8,
            self.inputs.shutter1_closed as u8,
            self.inputs.rain as u8,
            self.inputs.cloud as u8,
            self.inputs.safe as u8,
            self.relays.ccd as u8,
            self.relays.scope as u8,
            self.relays.light as u8,
            self.relays.fan as u8,
            self.relays.relay1 as u8,
            self.relays.relay2 as u8,
            self.relays.relay3 as u8,
            self.relays.relay4 as u8,
            self.sensors.temp_in,
            self.sensors.temp_out,
            self.sensors.temp_humidity_sensor,
            self.sensors.humidity,
            self.sensors.pressure,
            dew_point,
            self.sensors.link_strength,
            self.firmware.main,
            self.firmware.rotary,
        )
    }
}
