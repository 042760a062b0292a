pub mod card;
pub mod channel;
pub mod command;
pub mod config;
pub mod console;
pub mod dome;
pub mod error;
pub mod frame;
pub mod hardware_card;
pub mod inertia;
pub mod mock_controller;
pub mod position;
pub mod psychrometrics;
pub mod sensors;
pub mod shutter;
pub mod simulator;
pub mod status;
