//! Define the dome card opcodes and digital I/O line indices.
//!
//! The reply width of each opcode is not carried by the protocol; callers
//! know it at the call site and pick the matching typed read.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Ack,
    FunctionNotSupported,
    MotionConflict,
    ParamError,
    FuncBufferError,
    ConnectionTest,
    ClearDigitalChannel,
    SetDigitalChannel,
    GetCounter,
    ResetCounter,
    CCWRotation,
    CWRotation,
    GetCounterExt,
    FindHome,
    Stop,
    GetStatus,
    GetImpPerTurn,
    GetHomeSensorPosition,
    GetAllDigitalExt,
    GetLinkStrength,
    GetAnalog1,
    GetAnalog2,
    GetMainAnalog1,
    GetMainAnalog2,
    GetTempIn,
    GetTempOut,
    GetTempHum,
    GetHum,
    GetPressure,
    GetVersionFirmware,
    GetVersionFirmwareRotary,
}

const ALL_COMMANDS: [Command; 31] = [
    Command::Ack,
    Command::FunctionNotSupported,
    Command::MotionConflict,
    Command::ParamError,
    Command::FuncBufferError,
    Command::ConnectionTest,
    Command::ClearDigitalChannel,
    Command::SetDigitalChannel,
    Command::GetCounter,
    Command::ResetCounter,
    Command::CCWRotation,
    Command::CWRotation,
    Command::GetCounterExt,
    Command::FindHome,
    Command::Stop,
    Command::GetStatus,
    Command::GetImpPerTurn,
    Command::GetHomeSensorPosition,
    Command::GetAllDigitalExt,
    Command::GetLinkStrength,
    Command::GetAnalog1,
    Command::GetAnalog2,
    Command::GetMainAnalog1,
    Command::GetMainAnalog2,
    Command::GetTempIn,
    Command::GetTempOut,
    Command::GetTempHum,
    Command::GetHum,
    Command::GetPressure,
    Command::GetVersionFirmware,
    Command::GetVersionFirmwareRotary,
];

impl Command {
    pub fn byte_value(&self) -> u8 {
        match self {
            Command::Ack => 0x01,
            Command::FunctionNotSupported => 0x02,
            Command::MotionConflict => 0x03,
            Command::ParamError => 0x04,
            Command::FuncBufferError => 0x05,
            Command::ConnectionTest => 0x06,
            Command::ClearDigitalChannel => 0x08,
            Command::SetDigitalChannel => 0x0A,
            Command::GetCounter => 0x10,
            Command::ResetCounter => 0x11,
            Command::CCWRotation => 0x12,
            Command::CWRotation => 0x13,
            Command::GetCounterExt => 0x14,
            Command::FindHome => 0x20,
            Command::Stop => 0x21,
            Command::GetStatus => 0x22,
            Command::GetImpPerTurn => 0x23,
            Command::GetHomeSensorPosition => 0x24,
            Command::GetAllDigitalExt => 0x30,
            Command::GetLinkStrength => 0x40,
            Command::GetAnalog1 => 0x41,
            Command::GetAnalog2 => 0x42,
            Command::GetMainAnalog1 => 0x43,
            Command::GetMainAnalog2 => 0x44,
            Command::GetTempIn => 0x45,
            Command::GetTempOut => 0x46,
            Command::GetTempHum => 0x47,
            Command::GetHum => 0x48,
            Command::GetPressure => 0x49,
            Command::GetVersionFirmware => 0x50,
            Command::GetVersionFirmwareRotary => 0x51,
        }
    }

    pub fn from_byte(value: u8) -> Option<Command> {
        ALL_COMMANDS
            .iter()
            .copied()
            .find(|command| command.byte_value() == value)
    }

    /// Reply opcodes the card uses to refuse a command.
    pub fn is_refusal(&self) -> bool {
        matches!(
            self,
            Command::FunctionNotSupported
                | Command::MotionConflict
                | Command::ParamError
                | Command::FuncBufferError
        )
    }
}

/// Status register bit set while the dome is rotating.
pub const STATUS_ROTATING: u16 = 0x0002;
/// Status register bit set while the card is seeking the home sensor.
pub const STATUS_HOMING: u16 = 0x0008;

/// Width of the bulk digital state returned by `GetAllDigitalExt`.
pub const DIGITAL_BUFFER_LEN: usize = 5;

/// Index of a digital line in the card's packed I/O bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigitalIo {
    OutCcw,
    OutCw,
    OutRelay1,
    OutRelay2,
    OutRelay3,
    OutRelay4,
    OutOpen1,
    OutClose1,
    OutOpen2,
    OutClose2,
    OutScope,
    OutCcd,
    OutLight,
    OutFan,
    InEncoder,
    InHome,
    InOpen1,
    InClosed1,
    InOpen2,
    InClosed2,
    InScopeHome,
    InRain,
    InCloud,
    InSafe,
    InRotaryLink,
    InFree,
}

impl DigitalIo {
    pub fn index(&self) -> u8 {
        match self {
            DigitalIo::OutCcw => 0,
            DigitalIo::OutCw => 1,
            DigitalIo::OutRelay1 => 2,
            DigitalIo::OutRelay2 => 3,
            DigitalIo::OutRelay3 => 4,
            DigitalIo::OutRelay4 => 5,
            DigitalIo::OutOpen1 => 6,
            DigitalIo::OutClose1 => 7,
            DigitalIo::OutOpen2 => 8,
            DigitalIo::OutClose2 => 9,
            DigitalIo::OutScope => 10,
            DigitalIo::OutCcd => 11,
            DigitalIo::OutLight => 12,
            DigitalIo::OutFan => 13,
            DigitalIo::InEncoder => 16,
            DigitalIo::InHome => 17,
            DigitalIo::InOpen1 => 18,
            DigitalIo::InClosed1 => 19,
            DigitalIo::InOpen2 => 20,
            DigitalIo::InClosed2 => 21,
            DigitalIo::InScopeHome => 22,
            DigitalIo::InRain => 23,
            DigitalIo::InCloud => 24,
            DigitalIo::InSafe => 25,
            DigitalIo::InRotaryLink => 26,
            DigitalIo::InFree => 27,
        }
    }

    /// Logical state of this line in a packed bitfield.
    pub fn is_set(&self, state: &[u8]) -> bool {
        let index = self.index() as usize;
        state
            .get(index >> 3)
            .map(|byte| (byte >> (index & 7)) & 1 == 1)
            .unwrap_or(false)
    }

    pub fn assign(&self, state: &mut [u8], on: bool) {
        let index = self.index() as usize;
        if let Some(byte) = state.get_mut(index >> 3) {
            let bit = 1 << (index & 7);
            if on {
                *byte |= bit;
            } else {
                *byte &= !bit;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_byte_matches_byte_value() {
        for command in ALL_COMMANDS {
            assert_eq!(Command::from_byte(command.byte_value()), Some(command));
        }
        assert_eq!(Command::from_byte(0xFF), None);
    }

    #[test]
    fn test_digital_line_bit_position() {
        // InClosed1 is line 19: byte 2, bit 3.
        let state = [0x00, 0x00, 0x08, 0x00, 0x00];

        assert!(DigitalIo::InClosed1.is_set(&state));
        assert!(!DigitalIo::InOpen1.is_set(&state));
    }

    #[test]
    fn test_assign_round_trip() {
        let mut state = [0u8; DIGITAL_BUFFER_LEN];

        DigitalIo::OutFan.assign(&mut state, true);
        assert!(DigitalIo::OutFan.is_set(&state));
        assert_eq!(state[1], 0x20);

        DigitalIo::OutFan.assign(&mut state, false);
        assert_eq!(state, [0u8; DIGITAL_BUFFER_LEN]);
    }

    #[test]
    fn test_short_buffer_reads_as_off() {
        assert!(!DigitalIo::InFree.is_set(&[0xFF]));
    }
}
