//! Wire framing between the host and the dome card.
//!
//! `0xAA, opcode, len, payload[len], crc8` where the CRC-8/MAXIM covers
//! opcode, length and payload.

use crate::error::{ScopeDomeError, ScopeDomeResult};
use tokio::io::{AsyncRead, AsyncReadExt};

pub const FRAME_HEADER: u8 = 0xAA;

pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for byte in data {
        let mut value = *byte;
        for _ in 0..8 {
            let mix = (crc ^ value) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            value >>= 1;
        }
    }
    crc
}

pub fn encode_frame(opcode: u8, payload: &[u8]) -> ScopeDomeResult<Vec<u8>> {
    let len = u8::try_from(payload.len()).map_err(|_| {
        ScopeDomeError::new(&format!("Payload of {} bytes does not fit a frame.", payload.len()))
    })?;

    let mut frame = Vec::with_capacity(payload.len() + 4);
    frame.push(FRAME_HEADER);
    frame.push(opcode);
    frame.push(len);
    frame.extend_from_slice(payload);
    frame.push(crc8(&frame[1..]));
    Ok(frame)
}

/// Read one frame, returning its opcode and payload.
pub async fn read_frame<R>(reader: &mut R) -> ScopeDomeResult<(u8, Vec<u8>)>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let header = reader.read_u8().await?;
    if header != FRAME_HEADER {
        return Err(ScopeDomeError::new(&format!("Bad frame header 0x{header:02X}.")));
    }

    let opcode = reader.read_u8().await?;
    let len = reader.read_u8().await?;
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    let crc = reader.read_u8().await?;

    let mut covered = Vec::with_capacity(payload.len() + 2);
    covered.push(opcode);
    covered.push(len);
    covered.extend_from_slice(&payload);
    let expected = crc8(&covered);
    if crc != expected {
        return Err(ScopeDomeError::new(&format!(
            "Checksum mismatch on opcode 0x{opcode:02X}: got 0x{crc:02X}, expected 0x{expected:02X}."
        )));
    }

    Ok((opcode, payload))
}
