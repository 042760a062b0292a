//! Shutter state machine driven by the open and closed limit switches.

use crate::{
    channel::CommandChannel,
    command::DigitalIo,
    error::ScopeDomeResult,
    status::{CommandOutcome, ShutterState},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutterOperation {
    Open,
    Close,
}

/// Expected limit reached during a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutterEvent {
    Opened,
    Closed,
}

#[derive(Debug, Clone)]
pub struct Shutter {
    state: ShutterState,
    target: ShutterOperation,
    /// An output is asserted and its limit switch has not been reached yet.
    driving: bool,
}

impl Default for Shutter {
    fn default() -> Self {
        Shutter {
            state: ShutterState::Unknown,
            target: ShutterOperation::Close,
            driving: false,
        }
    }
}

impl Shutter {
    pub fn state(&self) -> ShutterState {
        self.state
    }

    pub fn target(&self) -> ShutterOperation {
        self.target
    }

    /// Start opening or closing. `inputs` is the last digital snapshot.
    pub async fn command(
        &mut self,
        operation: ShutterOperation,
        inputs: &[u8],
        channel: &mut CommandChannel,
    ) -> ScopeDomeResult<CommandOutcome> {
        log::info!("Control shutter {operation:?}");
        self.target = operation;

        let (limit, drive, opposite, reached) = match operation {
            ShutterOperation::Open => (
                DigitalIo::InOpen1,
                DigitalIo::OutOpen1,
                DigitalIo::OutClose1,
                ShutterState::Open,
            ),
            ShutterOperation::Close => (
                DigitalIo::InClosed1,
                DigitalIo::OutClose1,
                DigitalIo::OutOpen1,
                ShutterState::Closed,
            ),
        };

        if limit.is_set(inputs) {
            log::info!("Shutter already {reached:?}");
            self.state = reached;
            self.driving = false;
            return Ok(CommandOutcome::Complete);
        }

        channel.set_output_state(opposite, false).await?;
        channel.set_output_state(drive, true).await?;
        self.state = ShutterState::Moving;
        self.driving = true;
        Ok(CommandOutcome::InProgress)
    }

    /// Fold a fresh digital snapshot into the shutter state.
    pub async fn update(
        &mut self,
        inputs: &[u8],
        channel: &mut CommandChannel,
    ) -> ScopeDomeResult<Option<ShutterEvent>> {
        let open = DigitalIo::InOpen1.is_set(inputs);
        let closed = DigitalIo::InClosed1.is_set(inputs);

        if open {
            match (self.state, self.target) {
                (ShutterState::Moving, ShutterOperation::Open) if self.driving => {
                    log::info!("Shutter is open.");
                    // The limit switch already stopped the motor.
                    channel.set_output_state(DigitalIo::OutOpen1, false).await?;
                    self.state = ShutterState::Open;
                    self.driving = false;
                    return Ok(Some(ShutterEvent::Opened));
                }
                // Still leaving the open limit.
                (ShutterState::Moving, ShutterOperation::Close) if self.driving => {}
                _ => self.state = ShutterState::Open,
            }
        } else if closed {
            match (self.state, self.target) {
                (ShutterState::Moving, ShutterOperation::Close) if self.driving => {
                    log::info!("Shutter is closed.");
                    channel.set_output_state(DigitalIo::OutClose1, false).await?;
                    self.state = ShutterState::Closed;
                    self.driving = false;
                    return Ok(Some(ShutterEvent::Closed));
                }
                (ShutterState::Moving, ShutterOperation::Open) if self.driving => {}
                _ => self.state = ShutterState::Closed,
            }
        } else {
            self.state = ShutterState::Moving;
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        card::DomeCard,
        command::{Command, DIGITAL_BUFFER_LEN},
        simulator::SimulatedCard,
    };

    fn simulated_channel() -> CommandChannel {
        CommandChannel::new(DomeCard::Simulator(SimulatedCard::default()))
    }

    fn inputs(lines: &[DigitalIo]) -> [u8; DIGITAL_BUFFER_LEN] {
        let mut state = [0u8; DIGITAL_BUFFER_LEN];
        for line in lines {
            line.assign(&mut state, true);
        }
        state
    }

    fn logged(channel: &mut CommandChannel) -> Vec<(Command, Vec<u8>)> {
        channel
            .card_mut()
            .as_simulator_mut()
            .unwrap()
            .command_log()
            .to_vec()
    }

    #[tokio::test]
    async fn test_open_when_already_open_is_immediate() {
        let mut channel = simulated_channel();
        let mut shutter = Shutter::default();

        let outcome = shutter
            .command(ShutterOperation::Open, &inputs(&[DigitalIo::InOpen1]), &mut channel)
            .await
            .unwrap();

        assert_eq!(outcome, CommandOutcome::Complete);
        assert_eq!(shutter.state(), ShutterState::Open);
        assert!(logged(&mut channel).is_empty());
    }

    #[tokio::test]
    async fn test_open_drives_outputs() {
        let mut channel = simulated_channel();
        let mut shutter = Shutter::default();

        let outcome = shutter
            .command(ShutterOperation::Open, &inputs(&[DigitalIo::InClosed1]), &mut channel)
            .await
            .unwrap();

        assert_eq!(outcome, CommandOutcome::InProgress);
        assert_eq!(shutter.state(), ShutterState::Moving);
        assert_eq!(
            logged(&mut channel),
            vec![
                (Command::ClearDigitalChannel, vec![DigitalIo::OutClose1.index()]),
                (Command::SetDigitalChannel, vec![DigitalIo::OutOpen1.index()]),
            ]
        );
    }

    #[tokio::test]
    async fn test_update_reports_expected_open() {
        let mut channel = simulated_channel();
        let mut shutter = Shutter::default();
        shutter
            .command(ShutterOperation::Open, &inputs(&[DigitalIo::InClosed1]), &mut channel)
            .await
            .unwrap();

        assert_eq!(shutter.update(&inputs(&[]), &mut channel).await.unwrap(), None);
        assert_eq!(shutter.state(), ShutterState::Moving);

        let event = shutter
            .update(&inputs(&[DigitalIo::InOpen1]), &mut channel)
            .await
            .unwrap();
        assert_eq!(event, Some(ShutterEvent::Opened));
        assert_eq!(shutter.state(), ShutterState::Open);
        assert_eq!(
            logged(&mut channel).last().unwrap(),
            &(Command::ClearDigitalChannel, vec![DigitalIo::OutOpen1.index()])
        );
    }

    #[tokio::test]
    async fn test_update_while_leaving_limit_stays_moving() {
        let mut channel = simulated_channel();
        let mut shutter = Shutter::default();
        shutter
            .command(ShutterOperation::Close, &inputs(&[DigitalIo::InOpen1]), &mut channel)
            .await
            .unwrap();

        let event = shutter
            .update(&inputs(&[DigitalIo::InOpen1]), &mut channel)
            .await
            .unwrap();

        assert_eq!(event, None);
        assert_eq!(shutter.state(), ShutterState::Moving);
        assert_eq!(shutter.target(), ShutterOperation::Close);
    }

    #[tokio::test]
    async fn test_update_from_unknown_settles_without_event() {
        let mut channel = simulated_channel();
        let mut shutter = Shutter::default();

        let event = shutter
            .update(&inputs(&[DigitalIo::InClosed1]), &mut channel)
            .await
            .unwrap();

        assert_eq!(event, None);
        assert_eq!(shutter.state(), ShutterState::Closed);
        assert!(logged(&mut channel).is_empty());
    }

    #[tokio::test]
    async fn test_settles_after_undriven_gap() {
        let mut channel = simulated_channel();
        let mut shutter = Shutter::default();
        let open = inputs(&[DigitalIo::InOpen1]);
        shutter.update(&open, &mut channel).await.unwrap();
        assert_eq!(shutter.state(), ShutterState::Open);

        // Both switches read clear once without any command in flight.
        shutter.update(&inputs(&[]), &mut channel).await.unwrap();
        assert_eq!(shutter.state(), ShutterState::Moving);

        let event = shutter.update(&open, &mut channel).await.unwrap();
        assert_eq!(event, None);
        assert_eq!(shutter.state(), ShutterState::Open);
        assert!(logged(&mut channel).is_empty());
    }
}
