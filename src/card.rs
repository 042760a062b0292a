//! Capability boundary between the control logic and a dome card.
//!
//! The backend is picked once when a session connects and stays fixed
//! for the lifetime of that session.

use crate::{
    command::Command, error::ScopeDomeResult, hardware_card::HardwareCard,
    simulator::SimulatedCard,
};

pub enum DomeCard {
    Hardware(HardwareCard),
    Simulator(SimulatedCard),
}

impl DomeCard {
    pub async fn detect(&mut self) -> bool {
        match self {
            DomeCard::Hardware(card) => card.detect().await,
            DomeCard::Simulator(card) => card.detect(),
        }
    }

    pub async fn write(&mut self, command: Command) -> ScopeDomeResult<()> {
        match self {
            DomeCard::Hardware(card) => card.write(command).await,
            DomeCard::Simulator(card) => card.write(command),
        }
    }

    pub async fn write_buf(&mut self, command: Command, payload: &[u8]) -> ScopeDomeResult<()> {
        match self {
            DomeCard::Hardware(card) => card.write_buf(command, payload).await,
            DomeCard::Simulator(card) => card.write_buf(command, payload),
        }
    }

    pub async fn read(&mut self, command: Command) -> ScopeDomeResult<()> {
        match self {
            DomeCard::Hardware(card) => card.read(command).await,
            DomeCard::Simulator(card) => card.read(command),
        }
    }

    pub async fn read_buf(&mut self, command: Command, len: usize) -> ScopeDomeResult<Vec<u8>> {
        match self {
            DomeCard::Hardware(card) => card.read_buf(command, len).await,
            DomeCard::Simulator(card) => card.read_buf(command, len),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DomeCard::Hardware(_) => "hardware",
            DomeCard::Simulator(_) => "simulator",
        }
    }

    pub fn as_simulator_mut(&mut self) -> Option<&mut SimulatedCard> {
        match self {
            DomeCard::Simulator(card) => Some(card),
            DomeCard::Hardware(_) => None,
        }
    }
}
