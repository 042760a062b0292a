//! The dome control session.
//!
//! A `ScopeDome` owns the command channel and every piece of per-session
//! state. It is driven from outside: `tick` is called on a fixed cadence
//! and user commands are plain method calls in between ticks.

use crate::{
    card::DomeCard,
    channel::CommandChannel,
    command::{Command, DigitalIo, DIGITAL_BUFFER_LEN, STATUS_HOMING, STATUS_ROTATING},
    config::{DomeConfig, DEFAULT_PARK_AZIMUTH},
    error::{ScopeDomeError, ScopeDomeResult},
    inertia::InertiaTable,
    position::{normalize360, shortest_delta, PositionTracker},
    sensors::SensorSnapshot,
    shutter::{Shutter, ShutterEvent, ShutterOperation},
    status::{
        CommandOutcome, DomeMotion, DomeStatus, FirmwareVersions, InputSensors, ParkState, Relay,
        RelayStates, ShutterState,
    },
};

pub struct ScopeDome {
    channel: CommandChannel,
    tracker: PositionTracker,
    inertia: InertiaTable,
    shutter: Shutter,
    config: DomeConfig,
    status: DomeStatus,
    /// Ready, Homing or Derotating. Moving to a target is `busy`.
    motion: DomeMotion,
    busy: bool,
    ticks: u64,
    digital: [u8; DIGITAL_BUFFER_LEN],
}

impl ScopeDome {
    pub async fn connect(
        card: DomeCard,
        config: DomeConfig,
        inertia: InertiaTable,
    ) -> ScopeDomeResult<ScopeDome> {
        let mut channel = CommandChannel::new(card);
        if !channel.detect().await {
            return Err(ScopeDomeError::new(&format!(
                "No dome card answered on the {} link.",
                channel.card().name()
            )));
        }
        log::info!("Connected to {} dome card.", channel.card().name());

        if !inertia.is_monotonic() {
            log::warn!("Inertia table is not monotonic; compensation may be erratic.");
        }

        let mut dome = ScopeDome {
            channel,
            tracker: PositionTracker::new(config.home_azimuth_deg),
            inertia,
            shutter: Shutter::default(),
            config,
            status: DomeStatus::default(),
            motion: DomeMotion::Ready,
            busy: false,
            ticks: 0,
            digital: [0; DIGITAL_BUFFER_LEN],
        };

        match dome.tracker.refresh_azimuth(&mut dome.channel).await {
            Ok(azimuth) => {
                dome.status.azimuth = azimuth;
                dome.status.target_azimuth = azimuth;
            }
            Err(error) => log::warn!("Azimuth unknown at connect: {error}"),
        }

        dome.read_digital().await;
        dome.shutter.update(&dome.digital, &mut dome.channel).await?;

        let main = dome.channel.read_u16(Command::GetVersionFirmware).await;
        let rotary = dome.channel.read_u16(Command::GetVersionFirmwareRotary).await;
        dome.status.firmware = FirmwareVersions::from_hundredths(main, rotary);
        log::info!(
            "Firmware main {:.2} rotary {:.2}",
            dome.status.firmware.main,
            dome.status.firmware.rotary
        );

        dome.publish();
        Ok(dome)
    }

    pub fn status(&self) -> &DomeStatus {
        &self.status
    }

    pub fn config(&self) -> &DomeConfig {
        &self.config
    }

    pub fn motion(&self) -> DomeMotion {
        self.status.motion
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// One pass of the control loop: read, then act at most once.
    pub async fn tick(&mut self) -> ScopeDomeResult<()> {
        let status_word = self.channel.read_u16(Command::GetStatus).await;
        let azimuth = self.tracker.refresh_azimuth(&mut self.channel).await;
        self.read_digital().await;

        let event = self.shutter.update(&self.digital, &mut self.channel).await?;
        if let Some(event) = event {
            self.on_shutter_event(event);
        }

        if self.ticks % self.config.sensor_poll_ticks.max(1) as u64 == 0 {
            self.status.sensors = SensorSnapshot::poll(&mut self.channel).await;
        }
        self.ticks += 1;

        // Without calibration there is nothing to steer by.
        let azimuth = match azimuth {
            Ok(azimuth) => azimuth,
            Err(error) => {
                self.publish();
                return Err(error);
            }
        };
        self.status.azimuth = azimuth;

        let result = match self.motion {
            DomeMotion::Homing => self.check_homing(status_word).await,
            DomeMotion::Derotating => self.check_derotation(status_word).await,
            _ if self.busy => self.check_target(status_word).await,
            _ => Ok(()),
        };
        self.publish();
        result
    }

    async fn check_homing(&mut self, status_word: u16) -> ScopeDomeResult<()> {
        let home = DigitalIo::InHome.is_set(&self.digital);
        if status_word & STATUS_HOMING != 0 || !home {
            return Ok(());
        }

        log::info!("Home sensor found.");
        self.channel.write_command(Command::ResetCounter).await?;
        self.status.azimuth = self.tracker.home_offset_deg;
        self.status.target_azimuth = self.tracker.home_offset_deg;
        self.motion = DomeMotion::Ready;
        Ok(())
    }

    async fn check_derotation(&mut self, status_word: u16) -> ScopeDomeResult<()> {
        if status_word & STATUS_ROTATING != 0 {
            return Ok(());
        }

        let rotation = self.channel.read_s32(Command::GetCounterExt).await;
        if rotation.unsigned_abs() < self.config.derotate_deadband {
            log::info!("Derotation complete at {rotation}.");
            self.motion = DomeMotion::Ready;
            return Ok(());
        }

        let requested = rotation.unsigned_abs().min(u16::MAX as u32) as u16;
        let steps = self.inertia.compensate(requested);
        let command = if rotation > 0 {
            Command::CWRotation
        } else {
            Command::CCWRotation
        };
        log::debug!("Derotating {rotation}: {command:?} {steps} (requested {requested}).");
        self.channel.write_u16(command, steps).await
    }

    async fn check_target(&mut self, status_word: u16) -> ScopeDomeResult<()> {
        if status_word & STATUS_ROTATING != 0 {
            return Ok(());
        }

        let target = self.status.target_azimuth;
        let delta = shortest_delta(self.status.azimuth, target);
        if delta.abs() > self.config.azimuth_tolerance_deg {
            log::debug!("Stopped {delta:.2} short of {target:.2}; refining.");
            self.move_to(target).await?;
            return Ok(());
        }

        log::info!("Dome reached requested azimuth {target:.2}.");
        self.status.azimuth = target;
        self.busy = false;
        if self.status.park == ParkState::Parking {
            self.finish_park().await?;
        }
        Ok(())
    }

    fn on_shutter_event(&mut self, event: ShutterEvent) {
        match (event, self.status.park) {
            (ShutterEvent::Closed, ParkState::Parking) if !self.busy => {
                log::info!("Dome parked.");
                self.status.park = ParkState::Parked;
            }
            (ShutterEvent::Opened, ParkState::Unparking) => {
                log::info!("Dome unparked.");
                self.status.park = ParkState::Unparked;
            }
            _ => {}
        }
    }

    /// Refresh the digital snapshot. A failed read keeps the previous one.
    async fn read_digital(&mut self) {
        let state = self
            .channel
            .read_buffer(Command::GetAllDigitalExt, DIGITAL_BUFFER_LEN)
            .await;
        match state {
            Some(state) => {
                for (slot, byte) in self.digital.iter_mut().zip(state) {
                    *slot = byte;
                }
            }
            None => log::warn!("Digital inputs unavailable; keeping last snapshot."),
        }
    }

    fn publish(&mut self) {
        self.status.motion = match self.motion {
            DomeMotion::Ready if self.busy => DomeMotion::MovingToTarget,
            motion => motion,
        };
        self.status.shutter = self.shutter.state();
        self.status.inputs = InputSensors::from_digital(&self.digital);
        self.status.relays = RelayStates::from_digital(&self.digital);
    }

    fn reject_if_parked(&self) -> ScopeDomeResult<()> {
        if self.status.park == ParkState::Parked {
            return Err(ScopeDomeError::new("Dome is parked; unpark it first."));
        }
        Ok(())
    }

    pub async fn find_home(&mut self) -> ScopeDomeResult<CommandOutcome> {
        self.reject_if_parked()?;
        if self.motion == DomeMotion::Homing {
            log::info!("Already homing.");
            return Ok(CommandOutcome::Ignored);
        }

        self.busy = false;
        self.channel.write_command(Command::FindHome).await?;
        log::info!("Seeking home sensor.");
        self.motion = DomeMotion::Homing;
        self.publish();
        Ok(CommandOutcome::InProgress)
    }

    pub async fn derotate(&mut self) -> ScopeDomeResult<CommandOutcome> {
        self.reject_if_parked()?;
        if self.motion == DomeMotion::Derotating {
            log::info!("Already derotating.");
            return Ok(CommandOutcome::Ignored);
        }

        log::info!("Derotating.");
        self.busy = false;
        self.motion = DomeMotion::Derotating;
        self.publish();
        Ok(CommandOutcome::InProgress)
    }

    pub async fn move_abs(&mut self, azimuth: f64) -> ScopeDomeResult<CommandOutcome> {
        self.reject_if_parked()?;
        let outcome = self.move_to(azimuth).await;
        self.publish();
        outcome
    }

    pub async fn move_rel(&mut self, delta: f64) -> ScopeDomeResult<CommandOutcome> {
        self.move_abs(normalize360(self.status.azimuth + delta)).await
    }

    async fn move_to(&mut self, azimuth: f64) -> ScopeDomeResult<CommandOutcome> {
        let target = normalize360(azimuth);
        self.status.target_azimuth = target;
        self.motion = DomeMotion::Ready;

        let steps_per_turn = self.tracker.calibration(&mut self.channel).await?;
        let delta = shortest_delta(self.status.azimuth, target);
        if delta.abs() <= self.config.azimuth_tolerance_deg {
            self.busy = false;
            return Ok(CommandOutcome::Complete);
        }

        let requested = self
            .tracker
            .degrees_to_steps(steps_per_turn, delta)
            .round()
            .min(u16::MAX as f64) as u16;
        let steps = self.inertia.compensate(requested);
        let command = if delta > 0.0 {
            Command::CWRotation
        } else {
            Command::CCWRotation
        };
        log::debug!(
            "Move {:.2} -> {target:.2}: delta {delta:.2}, {command:?} {steps} (requested {requested}).",
            self.status.azimuth
        );

        self.channel.write_u16(command, steps).await?;
        self.busy = true;
        Ok(CommandOutcome::InProgress)
    }

    pub async fn park(&mut self) -> ScopeDomeResult<CommandOutcome> {
        if self.status.park == ParkState::Parked {
            return Ok(CommandOutcome::Ignored);
        }

        log::info!("Parking at {:.2}.", self.config.park_azimuth_deg);
        self.status.park = ParkState::Parking;
        let outcome = match self.move_to(self.config.park_azimuth_deg).await? {
            CommandOutcome::Complete => self.finish_park().await?,
            outcome => outcome,
        };
        self.publish();
        Ok(outcome)
    }

    /// Called with the dome at the park azimuth.
    async fn finish_park(&mut self) -> ScopeDomeResult<CommandOutcome> {
        if self.config.park_controls_shutter && self.shutter.state() != ShutterState::Closed {
            let outcome = self
                .shutter
                .command(ShutterOperation::Close, &self.digital, &mut self.channel)
                .await?;
            if outcome == CommandOutcome::InProgress {
                return Ok(outcome);
            }
        }
        log::info!("Dome parked.");
        self.status.park = ParkState::Parked;
        Ok(CommandOutcome::Complete)
    }

    pub async fn unpark(&mut self) -> ScopeDomeResult<CommandOutcome> {
        if !self.config.park_controls_shutter {
            self.status.park = ParkState::Unparked;
            return Ok(CommandOutcome::Complete);
        }

        self.status.park = ParkState::Unparking;
        let outcome = self
            .shutter
            .command(ShutterOperation::Open, &self.digital, &mut self.channel)
            .await?;
        if outcome == CommandOutcome::Complete {
            self.status.park = ParkState::Unparked;
        }
        self.publish();
        Ok(outcome)
    }

    /// Stop the motor and drop whatever motion was in progress.
    pub async fn abort(&mut self) -> ScopeDomeResult<CommandOutcome> {
        let stopped = self.channel.write_command(Command::Stop).await;

        log::info!("Motion aborted.");
        self.motion = DomeMotion::Ready;
        self.busy = false;
        if matches!(self.status.park, ParkState::Parking | ParkState::Unparking) {
            self.status.park = ParkState::Unknown;
        }
        self.publish();
        stopped.map(|_| CommandOutcome::Complete)
    }

    pub async fn control_shutter(
        &mut self,
        operation: ShutterOperation,
    ) -> ScopeDomeResult<CommandOutcome> {
        let outcome = self
            .shutter
            .command(operation, &self.digital, &mut self.channel)
            .await;
        self.publish();
        outcome
    }

    pub async fn set_relay(&mut self, relay: Relay, on: bool) -> ScopeDomeResult<CommandOutcome> {
        self.channel.set_output_state(relay.output(), on).await?;
        relay.output().assign(&mut self.digital, on);
        self.publish();
        Ok(CommandOutcome::Complete)
    }

    /// Azimuth assigned to the home sensor. Applies from the next tick.
    pub fn set_home_offset(&mut self, azimuth: f64) {
        self.tracker.home_offset_deg = azimuth;
        self.config.home_azimuth_deg = azimuth;
    }

    pub fn set_park_shutter(&mut self, enabled: bool) {
        self.config.park_controls_shutter = enabled;
    }

    pub fn set_park_to_current(&mut self) {
        self.config.park_azimuth_deg = self.status.azimuth;
        log::info!("Park position set to {:.2}.", self.config.park_azimuth_deg);
    }

    pub fn set_default_park(&mut self) {
        self.config.park_azimuth_deg = DEFAULT_PARK_AZIMUTH;
        log::info!("Park position set to default {DEFAULT_PARK_AZIMUTH:.2}.");
    }
}
