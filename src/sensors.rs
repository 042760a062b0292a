//! Environmental sensor polling.

use crate::{channel::CommandChannel, command::Command, psychrometrics::dew_point};

/// One poll of the environmental registers. Nothing is kept between polls.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SensorSnapshot {
    pub link_strength: f64,
    pub shutter_power: f64,
    pub shutter_battery: f64,
    pub card_power: f64,
    pub card_battery: f64,
    pub temp_in: f64,
    pub temp_out: f64,
    pub temp_humidity_sensor: f64,
    pub humidity: f64,
    pub pressure: f64,
    /// `None` when the dew point solver did not converge.
    pub dew_point: Option<f64>,
}

impl SensorSnapshot {
    pub async fn poll(channel: &mut CommandChannel) -> SensorSnapshot {
        let link_strength = channel.read_u8(Command::GetLinkStrength).await as f64;
        let shutter_power = channel.read_f32(Command::GetAnalog1).await as f64;
        let shutter_battery = channel.read_f32(Command::GetAnalog2).await as f64;
        let card_power = channel.read_f32(Command::GetMainAnalog1).await as f64;
        let card_battery = channel.read_f32(Command::GetMainAnalog2).await as f64;
        let temp_in = channel.read_f32(Command::GetTempIn).await as f64;
        let temp_out = channel.read_f32(Command::GetTempOut).await as f64;
        let temp_humidity_sensor = channel.read_f32(Command::GetTempHum).await as f64;
        let humidity = channel.read_f32(Command::GetHum).await as f64;
        let pressure = channel.read_f32(Command::GetPressure).await as f64;

        // The humidity sensor measures its own temperature; use that one.
        let dew_point = dew_point(humidity, temp_humidity_sensor);
        if dew_point.is_none() {
            log::warn!(
                "Dew point did not converge for {humidity:.1} % at {temp_humidity_sensor:.2} C."
            );
        }

        SensorSnapshot {
            link_strength,
            shutter_power,
            shutter_battery,
            card_power,
            card_battery,
            temp_in,
            temp_out,
            temp_humidity_sensor,
            humidity,
            pressure,
            dew_point,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        card::DomeCard,
        simulator::{SimulatedCard, SimulatorRegisters},
    };

    #[tokio::test]
    async fn test_poll_reads_all_registers() {
        let mut channel = CommandChannel::new(DomeCard::Simulator(SimulatedCard::default()));

        let snapshot = SensorSnapshot::poll(&mut channel).await;

        assert_eq!(snapshot.link_strength, 87.0);
        assert_eq!(snapshot.shutter_power, 98.5);
        assert_eq!(snapshot.card_battery, 95.5);
        assert_eq!(snapshot.temp_out, 9.75);
        assert_eq!(snapshot.pressure, 1013.25);
        assert_eq!(snapshot.humidity, 62.0);

        let dew = snapshot.dew_point.unwrap();
        assert!(dew < snapshot.temp_humidity_sensor);
        assert!((dew - 4.0).abs() < 0.5, "{dew}");

        let card = channel.card_mut().as_simulator_mut().unwrap();
        assert_eq!(card.command_log().len(), 10);
    }

    #[tokio::test]
    async fn test_poll_saturated_air() {
        let mut registers = SimulatorRegisters::default();
        registers.humidity = 100.0;
        registers.temp_humidity_sensor = -3.5;
        let mut channel = CommandChannel::new(DomeCard::Simulator(SimulatedCard::new(registers)));

        let snapshot = SensorSnapshot::poll(&mut channel).await;

        assert!((snapshot.dew_point.unwrap() + 3.5).abs() < 1e-6);
    }
}
