//! Simulated dome card.
//!
//! Fabricates plausible register values so the control logic can run
//! without hardware. Motion advances by a fixed amount every time the
//! status register is polled, which makes one poll equal one control tick.

use std::collections::VecDeque;

use crate::{
    command::{Command, DigitalIo, DIGITAL_BUFFER_LEN, STATUS_HOMING, STATUS_ROTATING},
    error::{ScopeDomeError, ScopeDomeResult},
};

pub const DEFAULT_STEPS_PER_TURN: u32 = 1000;
pub const DEFAULT_HOME_SENSOR_STEPS: i32 = 120;
/// How far the dome turns per status poll.
pub const DEFAULT_STEPS_PER_POLL: i32 = 40;
/// Status polls needed for the shutter to travel between its limits.
pub const SHUTTER_TRAVEL_POLLS: i32 = 3;
/// Most recent commands kept in the command log.
pub const COMMAND_LOG_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct SimulatorRegisters {
    /// Accumulated rotation since the last counter reset. Clockwise turns it down.
    pub counter: i32,
    /// Counter value at which the home sensor is asserted.
    pub home_counter: i32,
    pub steps_per_turn: u32,
    pub pending_steps: i32,
    pub homing: bool,
    pub digital: [u8; DIGITAL_BUFFER_LEN],
    pub shutter_travel: i32,
    pub link_strength: u8,
    pub shutter_power: f32,
    pub shutter_battery: f32,
    pub card_power: f32,
    pub card_battery: f32,
    pub temp_in: f32,
    pub temp_out: f32,
    pub temp_humidity_sensor: f32,
    pub humidity: f32,
    pub pressure: f32,
    pub firmware_main: u16,
    pub firmware_rotary: u16,
    /// Share of each rotation command the motor loses to slip.
    pub undershoot_percent: u32,
}

impl Default for SimulatorRegisters {
    fn default() -> Self {
        let mut digital = [0u8; DIGITAL_BUFFER_LEN];
        DigitalIo::InClosed1.assign(&mut digital, true);
        DigitalIo::InClosed2.assign(&mut digital, true);
        DigitalIo::InRotaryLink.assign(&mut digital, true);
        DigitalIo::InSafe.assign(&mut digital, true);

        SimulatorRegisters {
            counter: 0,
            home_counter: DEFAULT_HOME_SENSOR_STEPS,
            steps_per_turn: DEFAULT_STEPS_PER_TURN,
            pending_steps: 0,
            homing: false,
            digital,
            shutter_travel: 0,
            link_strength: 87,
            shutter_power: 98.5,
            shutter_battery: 91.0,
            card_power: 99.0,
            card_battery: 95.5,
            temp_in: 12.5,
            temp_out: 9.75,
            temp_humidity_sensor: 11.0,
            humidity: 62.0,
            pressure: 1013.25,
            firmware_main: 523,
            firmware_rotary: 310,
            undershoot_percent: 0,
        }
    }
}

impl SimulatorRegisters {
    fn status_word(&self) -> u16 {
        let mut status = 0;
        if self.pending_steps != 0 || self.homing {
            status |= STATUS_ROTATING;
        }
        if self.homing {
            status |= STATUS_HOMING;
        }
        status
    }

    fn travel(&self, steps: u16) -> i32 {
        let lost = u32::from(steps) * self.undershoot_percent.min(100) / 100;
        (u32::from(steps) - lost) as i32
    }

    /// Move the simulated mechanics forward by one poll.
    fn advance(&mut self, steps_per_poll: i32) {
        let turn = self.steps_per_turn.max(1) as i32;

        if self.homing {
            // Seek clockwise until the home sensor lines up.
            let distance = (self.counter - self.home_counter).rem_euclid(turn);
            if distance <= steps_per_poll {
                self.counter -= distance;
                self.homing = false;
            } else {
                self.counter -= steps_per_poll;
            }
        } else if self.pending_steps != 0 {
            let step = self.pending_steps.clamp(-steps_per_poll, steps_per_poll);
            self.counter += step;
            self.pending_steps -= step;
        }

        let at_home = (self.counter - self.home_counter).rem_euclid(turn) == 0;
        DigitalIo::InHome.assign(&mut self.digital, at_home);
        DigitalIo::InEncoder.assign(&mut self.digital, self.counter & 1 == 1);

        let opening = DigitalIo::OutOpen1.is_set(&self.digital);
        let closing = DigitalIo::OutClose1.is_set(&self.digital);
        if opening && !closing {
            self.shutter_travel = (self.shutter_travel + 1).min(SHUTTER_TRAVEL_POLLS);
        } else if closing && !opening {
            self.shutter_travel = (self.shutter_travel - 1).max(0);
        }
        let fully_open = self.shutter_travel == SHUTTER_TRAVEL_POLLS;
        DigitalIo::InOpen1.assign(&mut self.digital, fully_open);
        DigitalIo::InClosed1.assign(&mut self.digital, self.shutter_travel == 0);
    }
}

#[derive(Debug)]
pub struct SimulatedCard {
    pub registers: SimulatorRegisters,
    steps_per_poll: i32,
    staged_reply: Vec<u8>,
    command_log: VecDeque<(Command, Vec<u8>)>,
    failures_to_inject: usize,
}

impl Default for SimulatedCard {
    fn default() -> Self {
        SimulatedCard::new(SimulatorRegisters::default())
    }
}

impl SimulatedCard {
    pub fn new(registers: SimulatorRegisters) -> SimulatedCard {
        SimulatedCard {
            registers,
            steps_per_poll: DEFAULT_STEPS_PER_POLL,
            staged_reply: Vec::new(),
            command_log: VecDeque::with_capacity(COMMAND_LOG_CAPACITY),
            failures_to_inject: 0,
        }
    }

    pub fn with_steps_per_poll(mut self, steps_per_poll: i32) -> SimulatedCard {
        self.steps_per_poll = steps_per_poll.max(1);
        self
    }

    pub fn detect(&mut self) -> bool {
        true
    }

    /// Make the next `count` writes fail as if the link dropped.
    pub fn inject_failures(&mut self, count: usize) {
        self.failures_to_inject = count;
    }

    /// Every command written to the card, with its payload, oldest first.
    pub fn command_log(&mut self) -> &[(Command, Vec<u8>)] {
        self.command_log.make_contiguous()
    }

    pub fn count_commands(&self, command: Command) -> usize {
        self.command_log
            .iter()
            .filter(|(logged, _)| *logged == command)
            .count()
    }

    pub fn clear_command_log(&mut self) {
        self.command_log.clear();
    }

    pub fn set_input(&mut self, line: DigitalIo, on: bool) {
        line.assign(&mut self.registers.digital, on);
    }

    pub fn write(&mut self, command: Command) -> ScopeDomeResult<()> {
        self.write_buf(command, &[])
    }

    pub fn write_buf(&mut self, command: Command, payload: &[u8]) -> ScopeDomeResult<()> {
        if self.failures_to_inject > 0 {
            self.failures_to_inject -= 1;
            self.staged_reply.clear();
            return Err(ScopeDomeError::new(&format!(
                "Simulated link failure on {command:?}."
            )));
        }
        if self.command_log.len() == COMMAND_LOG_CAPACITY {
            self.command_log.pop_front();
        }
        self.command_log.push_back((command, payload.to_vec()));
        self.staged_reply = self.exchange(command, payload)?;
        Ok(())
    }

    pub fn read(&mut self, _command: Command) -> ScopeDomeResult<()> {
        Ok(())
    }

    pub fn read_buf(&mut self, command: Command, len: usize) -> ScopeDomeResult<Vec<u8>> {
        let reply = std::mem::take(&mut self.staged_reply);
        if reply.len() != len {
            return Err(ScopeDomeError::new(&format!(
                "Simulated reply to {command:?} has {} bytes; expected {len}.",
                reply.len()
            )));
        }
        Ok(reply)
    }

    /// Apply a command and return the register bytes it answers with.
    ///
    /// An empty reply means the command is acknowledged only.
    pub fn exchange(&mut self, command: Command, payload: &[u8]) -> ScopeDomeResult<Vec<u8>> {
        let steps_per_poll = self.steps_per_poll;
        let registers = &mut self.registers;
        let reply = match command {
            Command::ConnectionTest | Command::Ack => Vec::new(),
            Command::GetStatus => {
                registers.advance(steps_per_poll);
                registers.status_word().to_le_bytes().to_vec()
            }
            Command::GetCounter => {
                let turn = registers.steps_per_turn.max(1) as i32;
                ((registers.counter % turn) as i16).to_le_bytes().to_vec()
            }
            Command::GetCounterExt => registers.counter.to_le_bytes().to_vec(),
            Command::GetImpPerTurn => registers.steps_per_turn.to_le_bytes().to_vec(),
            Command::GetHomeSensorPosition => registers.home_counter.to_le_bytes().to_vec(),
            Command::GetAllDigitalExt => registers.digital.to_vec(),
            Command::GetLinkStrength => vec![registers.link_strength],
            Command::GetAnalog1 => registers.shutter_power.to_le_bytes().to_vec(),
            Command::GetAnalog2 => registers.shutter_battery.to_le_bytes().to_vec(),
            Command::GetMainAnalog1 => registers.card_power.to_le_bytes().to_vec(),
            Command::GetMainAnalog2 => registers.card_battery.to_le_bytes().to_vec(),
            Command::GetTempIn => registers.temp_in.to_le_bytes().to_vec(),
            Command::GetTempOut => registers.temp_out.to_le_bytes().to_vec(),
            Command::GetTempHum => registers.temp_humidity_sensor.to_le_bytes().to_vec(),
            Command::GetHum => registers.humidity.to_le_bytes().to_vec(),
            Command::GetPressure => registers.pressure.to_le_bytes().to_vec(),
            Command::GetVersionFirmware => registers.firmware_main.to_le_bytes().to_vec(),
            Command::GetVersionFirmwareRotary => registers.firmware_rotary.to_le_bytes().to_vec(),
            Command::ResetCounter => {
                let turn = registers.steps_per_turn.max(1) as i32;
                registers.home_counter =
                    (registers.home_counter - registers.counter).rem_euclid(turn);
                registers.counter = 0;
                Vec::new()
            }
            Command::CWRotation => {
                registers.pending_steps = -registers.travel(steps_from(payload)?);
                Vec::new()
            }
            Command::CCWRotation => {
                registers.pending_steps = registers.travel(steps_from(payload)?);
                Vec::new()
            }
            Command::FindHome => {
                registers.pending_steps = 0;
                registers.homing = true;
                Vec::new()
            }
            Command::Stop => {
                registers.pending_steps = 0;
                registers.homing = false;
                Vec::new()
            }
            Command::SetDigitalChannel | Command::ClearDigitalChannel => {
                let channel = *payload.first().ok_or_else(|| {
                    ScopeDomeError::new(&format!("{command:?} needs a channel byte."))
                })?;
                let on = command == Command::SetDigitalChannel;
                let channel = channel as usize;
                if channel >= DIGITAL_BUFFER_LEN * 8 {
                    return Err(ScopeDomeError::new(&format!(
                        "Digital channel {channel} out of range."
                    )));
                }
                let bit = 1 << (channel & 7);
                if on {
                    registers.digital[channel >> 3] |= bit;
                } else {
                    registers.digital[channel >> 3] &= !bit;
                }
                Vec::new()
            }
            Command::FunctionNotSupported
            | Command::MotionConflict
            | Command::ParamError
            | Command::FuncBufferError => {
                return Err(ScopeDomeError::new(&format!(
                    "{command:?} is a reply code, not a request."
                )));
            }
        };
        Ok(reply)
    }
}

fn steps_from(payload: &[u8]) -> ScopeDomeResult<u16> {
    let bytes: [u8; 2] = payload
        .try_into()
        .map_err(|_| ScopeDomeError::new("Rotation command needs a 2 byte step count."))?;
    Ok(u16::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(card: &mut SimulatedCard) -> u16 {
        card.write(Command::GetStatus).unwrap();
        u16::from_le_bytes(card.read_buf(Command::GetStatus, 2).unwrap().try_into().unwrap())
    }

    #[test]
    fn test_rotation_advances_per_poll() {
        let mut card = SimulatedCard::default().with_steps_per_poll(10);

        card.write_buf(Command::CWRotation, &25u16.to_le_bytes()).unwrap();

        assert_eq!(status(&mut card) & STATUS_ROTATING, STATUS_ROTATING);
        assert_eq!(card.registers.counter, -10);
        status(&mut card);
        status(&mut card);
        assert_eq!(card.registers.counter, -25);
        assert_eq!(status(&mut card) & STATUS_ROTATING, 0);
    }

    #[test]
    fn test_undershoot_loses_share_of_rotation() {
        let mut registers = SimulatorRegisters::default();
        registers.undershoot_percent = 10;
        let mut card = SimulatedCard::new(registers).with_steps_per_poll(100);

        card.write_buf(Command::CCWRotation, &250u16.to_le_bytes()).unwrap();
        while status(&mut card) & STATUS_ROTATING != 0 {}

        assert_eq!(card.registers.counter, 225);
    }

    #[test]
    fn test_homing_finds_sensor_and_reset_zeroes_counter() {
        let mut card = SimulatedCard::default().with_steps_per_poll(100);

        card.write(Command::FindHome).unwrap();
        while status(&mut card) & STATUS_HOMING != 0 {}

        assert!(DigitalIo::InHome.is_set(&card.registers.digital));

        card.write(Command::ResetCounter).unwrap();
        assert_eq!(card.registers.counter, 0);
        assert_eq!(card.registers.home_counter, 0);
    }

    #[test]
    fn test_shutter_travels_to_open_limit() {
        let mut card = SimulatedCard::default();

        card.write_buf(Command::SetDigitalChannel, &[DigitalIo::OutOpen1.index()]).unwrap();
        for _ in 0..SHUTTER_TRAVEL_POLLS {
            status(&mut card);
        }

        assert!(DigitalIo::InOpen1.is_set(&card.registers.digital));
        assert!(!DigitalIo::InClosed1.is_set(&card.registers.digital));
    }

    #[test]
    fn test_injected_failure() {
        let mut card = SimulatedCard::default();
        card.inject_failures(1);

        assert!(card.write(Command::GetStatus).is_err());
        assert!(card.read_buf(Command::GetStatus, 2).is_err());
        assert!(card.write(Command::GetStatus).is_ok());
        assert_eq!(card.count_commands(Command::GetStatus), 1);
    }

    #[test]
    fn test_counter_wraps_within_one_turn() {
        let mut registers = SimulatorRegisters::default();
        registers.counter = 2250;
        let mut card = SimulatedCard::new(registers);

        card.write(Command::GetCounter).unwrap();
        let short = card.read_buf(Command::GetCounter, 2).unwrap();

        assert_eq!(i16::from_le_bytes([short[0], short[1]]), 250);
    }

    #[test]
    fn test_command_log_keeps_most_recent() {
        let mut card = SimulatedCard::default();

        for _ in 0..COMMAND_LOG_CAPACITY {
            card.write(Command::GetStatus).unwrap();
        }
        card.write(Command::Stop).unwrap();

        assert_eq!(card.command_log().len(), COMMAND_LOG_CAPACITY);
        assert_eq!(card.count_commands(Command::GetStatus), COMMAND_LOG_CAPACITY - 1);
        assert_eq!(card.command_log().last().unwrap(), &(Command::Stop, Vec::new()));
    }
}
