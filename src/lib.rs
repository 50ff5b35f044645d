//! Fault injection trigger for the Raspberry Pi Pico.
//!
//! Watches a UART for [`consts::TRIGGER_PATTERN`], waits a configurable number of core cycles
//! and then pulses a GPIO for a configurable number of cycles. Delay and width are set at
//! runtime over a second, line oriented serial channel with `"<delay> <width>\n"`.
//!
//! Everything in here is hardware agnostic and built on `embedded-hal` traits. The board
//! specific wiring lives in the firmware binary.
#![cfg_attr(not(test), no_std)]

pub mod command;
pub mod config;
pub mod consts;
pub mod engine;
pub mod pulse;
pub mod trigger;

pub use command::{Command, CommandInterpreter, ParsePolicy};
pub use config::{ConfigUpdate, GlitchConfig};
pub use engine::{Bootloader, Glitcher, Step};
pub use pulse::{CycleDelay, GlitchEvent};
pub use trigger::Trigger;
