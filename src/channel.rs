//! Command channel to the dome card.
//!
//! Every call is one write followed by one read. Reads are tried at most
//! twice. When both attempts fail a typed read returns zero and the caller
//! relies on the next poll to correct it; `read_buffer` returns `None` so
//! the caller can keep its last snapshot. Writes are not retried since
//! repeating a rotation command would repeat the motion.

use crate::{
    card::DomeCard,
    command::{Command, DigitalIo},
    error::ScopeDomeResult,
};

pub const READ_ATTEMPTS: usize = 2;

pub struct CommandChannel {
    card: DomeCard,
}

impl CommandChannel {
    pub fn new(card: DomeCard) -> CommandChannel {
        CommandChannel { card }
    }

    pub fn card_mut(&mut self) -> &mut DomeCard {
        &mut self.card
    }

    pub fn card(&self) -> &DomeCard {
        &self.card
    }

    pub async fn detect(&mut self) -> bool {
        self.card.detect().await
    }

    pub async fn write_command(&mut self, command: Command) -> ScopeDomeResult<()> {
        let written = self.card.write(command).await;
        let acknowledged = self.card.read(command).await;
        written.and(acknowledged)
    }

    pub async fn write_command_with_payload(
        &mut self,
        command: Command,
        payload: &[u8],
    ) -> ScopeDomeResult<()> {
        let written = self.card.write_buf(command, payload).await;
        let acknowledged = self.card.read(command).await;
        written.and(acknowledged)
    }

    /// One write + read round trip, no retry.
    pub async fn read_reply(&mut self, command: Command, len: usize) -> ScopeDomeResult<Vec<u8>> {
        let written = self.card.write(command).await;
        let reply = self.card.read_buf(command, len).await;
        written.and(reply)
    }

    pub async fn read_buffer(&mut self, command: Command, len: usize) -> Option<Vec<u8>> {
        for attempt in 1..=READ_ATTEMPTS {
            match self.read_reply(command, len).await {
                Ok(reply) => return Some(reply),
                Err(error) => {
                    log::warn!("Read of {command:?} failed on attempt {attempt}: {error}");
                }
            }
        }
        None
    }

    async fn read_array<const N: usize>(&mut self, command: Command) -> [u8; N] {
        self.read_buffer(command, N)
            .await
            .and_then(|reply| reply.try_into().ok())
            .unwrap_or([0; N])
    }

    pub async fn read_u8(&mut self, command: Command) -> u8 {
        u8::from_le_bytes(self.read_array(command).await)
    }

    pub async fn read_s8(&mut self, command: Command) -> i8 {
        i8::from_le_bytes(self.read_array(command).await)
    }

    pub async fn read_u16(&mut self, command: Command) -> u16 {
        u16::from_le_bytes(self.read_array(command).await)
    }

    pub async fn read_s16(&mut self, command: Command) -> i16 {
        i16::from_le_bytes(self.read_array(command).await)
    }

    pub async fn read_u32(&mut self, command: Command) -> u32 {
        u32::from_le_bytes(self.read_array(command).await)
    }

    pub async fn read_s32(&mut self, command: Command) -> i32 {
        i32::from_le_bytes(self.read_array(command).await)
    }

    pub async fn read_f32(&mut self, command: Command) -> f32 {
        f32::from_le_bytes(self.read_array(command).await)
    }

    pub async fn write_u8(&mut self, command: Command, value: u8) -> ScopeDomeResult<()> {
        self.write_command_with_payload(command, &value.to_le_bytes()).await
    }

    pub async fn write_u16(&mut self, command: Command, value: u16) -> ScopeDomeResult<()> {
        self.write_command_with_payload(command, &value.to_le_bytes()).await
    }

    pub async fn set_output_state(&mut self, line: DigitalIo, on: bool) -> ScopeDomeResult<()> {
        let command = if on {
            Command::SetDigitalChannel
        } else {
            Command::ClearDigitalChannel
        };
        self.write_u8(command, line.index()).await
    }
}
