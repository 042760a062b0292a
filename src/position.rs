//! Azimuth derived from the card's rotary step counter.

use crate::{
    channel::CommandChannel,
    command::Command,
    error::{ScopeDomeError, ScopeDomeResult},
};

/// Map any angle into `[0, 360)`.
pub fn normalize360(degrees: f64) -> f64 {
    let wrapped = degrees % 360.0;
    let wrapped = if wrapped < 0.0 { wrapped + 360.0 } else { wrapped };
    // -1e-20 % 360 + 360 rounds to exactly 360.
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Signed shortest rotation from `from` to `to`, in `(-180, 180]`.
pub fn shortest_delta(from: f64, to: f64) -> f64 {
    let mut delta = to - from;
    while delta > 180.0 {
        delta -= 360.0;
    }
    while delta <= -180.0 {
        delta += 360.0;
    }
    delta
}

#[derive(Debug, Clone, Default)]
pub struct PositionTracker {
    steps_per_turn: Option<u32>,
    home_sensor_steps: i32,
    pub home_offset_deg: f64,
}

impl PositionTracker {
    pub fn new(home_offset_deg: f64) -> PositionTracker {
        PositionTracker {
            steps_per_turn: None,
            home_sensor_steps: 0,
            home_offset_deg,
        }
    }

    pub fn steps_per_turn(&self) -> Option<u32> {
        self.steps_per_turn
    }

    pub fn home_sensor_steps(&self) -> i32 {
        self.home_sensor_steps
    }

    /// Azimuth for a counter value. Counter 0 is at the home sensor and
    /// the counter runs opposite to increasing azimuth.
    pub fn azimuth_from_counter(&self, steps_per_turn: u32, counter: i32) -> f64 {
        normalize360(counter as f64 * (-360.0 / steps_per_turn as f64) + self.home_offset_deg)
    }

    pub fn degrees_to_steps(&self, steps_per_turn: u32, degrees: f64) -> f64 {
        degrees.abs() * steps_per_turn as f64 / 360.0
    }

    pub async fn calibration(&mut self, channel: &mut CommandChannel) -> ScopeDomeResult<u32> {
        if let Some(steps_per_turn) = self.steps_per_turn {
            return Ok(steps_per_turn);
        }

        let steps_per_turn = channel.read_u32(Command::GetImpPerTurn).await;
        log::info!("Steps per turn read as {steps_per_turn}");
        self.home_sensor_steps = channel.read_s32(Command::GetHomeSensorPosition).await;
        log::info!("Home position read as {}", self.home_sensor_steps);

        if steps_per_turn == 0 {
            log::error!("Card reported zero steps per turn; will query again next poll.");
            return Err(ScopeDomeError::new("Steps per turn unavailable."));
        }
        self.steps_per_turn = Some(steps_per_turn);
        Ok(steps_per_turn)
    }

    pub async fn refresh_azimuth(&mut self, channel: &mut CommandChannel) -> ScopeDomeResult<f64> {
        let steps_per_turn = self.calibration(channel).await?;
        let counter = channel.read_s16(Command::GetCounter).await;
        Ok(self.azimuth_from_counter(steps_per_turn, counter as i32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        card::DomeCard,
        simulator::{SimulatedCard, SimulatorRegisters},
    };

    #[test]
    fn test_normalize360_range_and_congruence() {
        for value in [-725.5, -360.0, -90.0, -1e-20, 0.0, 45.0, 359.999, 360.0, 1085.25] {
            let normalized = normalize360(value);
            assert!((0.0..360.0).contains(&normalized), "{value} -> {normalized}");
            let turns = (value - normalized) / 360.0;
            assert!((turns - turns.round()).abs() < 1e-9, "{value} -> {normalized}");
        }
    }

    #[test]
    fn test_azimuth_from_counter() {
        let tracker = PositionTracker::new(0.0);

        assert_eq!(tracker.azimuth_from_counter(1000, 250), 270.0);
        assert_eq!(tracker.azimuth_from_counter(1000, -250), 90.0);
        assert_eq!(tracker.azimuth_from_counter(1000, 0), 0.0);
    }

    #[test]
    fn test_azimuth_applies_home_offset() {
        let tracker = PositionTracker::new(350.0);

        assert_eq!(tracker.azimuth_from_counter(3600, -200), 10.0);
    }

    #[test]
    fn test_shortest_delta() {
        assert_eq!(shortest_delta(10.0, 350.0), -20.0);
        assert_eq!(shortest_delta(350.0, 10.0), 20.0);
        assert_eq!(shortest_delta(0.0, 180.0), 180.0);
        assert_eq!(shortest_delta(180.0, 0.0), 180.0);
        assert_eq!(shortest_delta(90.0, 90.0), 0.0);
    }

    #[tokio::test]
    async fn test_refresh_azimuth_caches_calibration() {
        let mut registers = SimulatorRegisters::default();
        registers.counter = 250;
        let mut channel = CommandChannel::new(DomeCard::Simulator(SimulatedCard::new(registers)));
        let mut tracker = PositionTracker::new(0.0);

        assert_eq!(tracker.refresh_azimuth(&mut channel).await.unwrap(), 270.0);
        assert_eq!(tracker.refresh_azimuth(&mut channel).await.unwrap(), 270.0);

        let card = channel.card_mut().as_simulator_mut().unwrap();
        assert_eq!(card.count_commands(Command::GetImpPerTurn), 1);
        assert_eq!(card.count_commands(Command::GetCounter), 2);
        assert_eq!(tracker.home_sensor_steps(), 120);
    }

    #[tokio::test]
    async fn test_refresh_azimuth_without_calibration() {
        let mut registers = SimulatorRegisters::default();
        registers.steps_per_turn = 0;
        let mut channel = CommandChannel::new(DomeCard::Simulator(SimulatedCard::new(registers)));
        let mut tracker = PositionTracker::new(0.0);

        assert!(tracker.refresh_azimuth(&mut channel).await.is_err());
        assert_eq!(tracker.steps_per_turn(), None);
    }
}
