//! Real dome card reached over a byte stream (serial port or TCP).

use crate::{
    command::Command,
    error::{ScopeDomeError, ScopeDomeResult},
    frame::{encode_frame, read_frame},
};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    time::{timeout, timeout_at, Duration, Instant},
};
use tokio_serial::SerialPortBuilderExt;

pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const REPLY_TIMEOUT: Duration = Duration::from_millis(500);

pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

pub struct HardwareCard {
    stream: Box<dyn Transport>,
    reply_timeout: Duration,
}

impl HardwareCard {
    pub fn new(stream: Box<dyn Transport>) -> HardwareCard {
        HardwareCard {
            stream,
            reply_timeout: REPLY_TIMEOUT,
        }
    }

    pub fn open_serial(path: &str, baud_rate: u32) -> ScopeDomeResult<HardwareCard> {
        let port = tokio_serial::new(path, baud_rate).open_native_async()?;
        log::info!("Opened serial port {path} at {baud_rate} baud.");
        Ok(HardwareCard::new(Box::new(port)))
    }

    pub async fn connect_tcp(host: &str, port: u16) -> ScopeDomeResult<HardwareCard> {
        let stream = TcpStream::connect(&format!("{host}:{port}")).await?;
        log::info!("Connected to dome card at {host}:{port}.");
        Ok(HardwareCard::new(Box::new(stream)))
    }

    pub async fn detect(&mut self) -> bool {
        if let Err(error) = self.write(Command::ConnectionTest).await {
            log::error!("Failed to send connection test: {error}");
            return false;
        }
        match self.read(Command::ConnectionTest).await {
            Ok(()) => true,
            Err(error) => {
                log::error!("Dome card did not answer connection test: {error}");
                false
            }
        }
    }

    pub async fn write(&mut self, command: Command) -> ScopeDomeResult<()> {
        self.write_buf(command, &[]).await
    }

    pub async fn write_buf(&mut self, command: Command, payload: &[u8]) -> ScopeDomeResult<()> {
        let frame = encode_frame(command.byte_value(), payload)?;
        self.discard_pending().await?;
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read the acknowledge the card sends after an action command.
    pub async fn read(&mut self, command: Command) -> ScopeDomeResult<()> {
        let ack = Command::Ack.byte_value();
        let (opcode, _) = self.receive(command, |opcode| opcode == ack).await?;
        match Command::from_byte(opcode) {
            Some(Command::Ack) => Ok(()),
            Some(reply) if reply.is_refusal() => Err(ScopeDomeError::new(&format!(
                "Card refused {command:?} with {reply:?}."
            ))),
            _ => Err(ScopeDomeError::new(&format!(
                "Unexpected reply 0x{opcode:02X} to {command:?}."
            ))),
        }
    }

    pub async fn read_buf(&mut self, command: Command, len: usize) -> ScopeDomeResult<Vec<u8>> {
        let expected = command.byte_value();
        let (opcode, payload) = self.receive(command, |opcode| opcode == expected).await?;
        if opcode != expected {
            return Err(ScopeDomeError::new(&format!(
                "Card refused {command:?} with opcode 0x{opcode:02X}."
            )));
        }
        if payload.len() != len {
            return Err(ScopeDomeError::new(&format!(
                "Reply to {command:?} has {} bytes; expected {len}.",
                payload.len()
            )));
        }
        Ok(payload)
    }

    /// Wait for the reply to `command`. Frames that are neither `expected`
    /// nor a refusal are late replies to earlier commands and are dropped.
    async fn receive<F>(&mut self, command: Command, expected: F) -> ScopeDomeResult<(u8, Vec<u8>)>
    where
        F: Fn(u8) -> bool,
    {
        let deadline = Instant::now() + self.reply_timeout;
        loop {
            let (opcode, payload) = timeout_at(deadline, read_frame(&mut self.stream)).await??;
            let refusal = Command::from_byte(opcode).is_some_and(|reply| reply.is_refusal());
            if expected(opcode) || refusal {
                return Ok((opcode, payload));
            }
            log::warn!("Dropping stale reply 0x{opcode:02X} while waiting for {command:?}.");
        }
    }

    /// Throw away bytes already waiting on the link, left over from a
    /// reply that arrived after its timeout.
    async fn discard_pending(&mut self) -> ScopeDomeResult<()> {
        let mut scratch = [0u8; 64];
        let mut discarded = 0;
        while let Ok(read) = timeout(Duration::ZERO, self.stream.read(&mut scratch)).await {
            match read? {
                0 => break,
                count => discarded += count,
            }
        }
        if discarded > 0 {
            log::warn!("Discarded {discarded} stale bytes from the dome card link.");
        }
        Ok(())
    }
}
