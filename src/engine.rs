//! The outer loop: drain the command channel, try the trigger pattern once, fire on a match.

use embedded_hal::digital::v2::OutputPin;
use embedded_hal::serial;

use crate::command::{Command, CommandInterpreter};
use crate::config::GlitchConfig;
use crate::consts::GLITCH_ACTIVE_POLARITY;
use crate::pulse::{self, CycleDelay, GlitchEvent};
use crate::trigger::{self, Trigger};

/// Hands control over to the firmware update mode of the chip.
pub trait Bootloader {
  fn reboot_to_bootloader(&mut self) -> !;
}

/// What one outer iteration did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(not(test), derive(defmt::Format))]
pub struct Step {
  /// Configuration after the drained command lines, if any line was applied.
  pub reconfigured: Option<GlitchConfig>,
  pub trigger: Trigger,
  pub glitch: Option<GlitchEvent>,
}

pub struct Glitcher<C, T, P, D, B> {
  config: GlitchConfig,
  interpreter: CommandInterpreter,
  commands: C,
  trigger: T,
  pin: P,
  delay: D,
  bootloader: B,
}

impl<C, T, P, D, B> Glitcher<C, T, P, D, B>
where
  C: serial::Read<u8> + serial::Write<u8>,
  T: serial::Read<u8>,
  P: OutputPin,
  D: CycleDelay,
  B: Bootloader,
{
  /// Takes ownership of the channels and the output, driving the output to idle right away.
  pub fn new(
    config: GlitchConfig,
    interpreter: CommandInterpreter,
    commands: C,
    trigger: T,
    mut pin: P,
    delay: D,
    bootloader: B,
  ) -> Self {
    pin.set_state(!GLITCH_ACTIVE_POLARITY).ok();
    Glitcher {
      config,
      interpreter,
      commands,
      trigger,
      pin,
      delay,
      bootloader,
    }
  }

  pub fn config(&self) -> &GlitchConfig {
    &self.config
  }

  pub fn interpreter(&self) -> &CommandInterpreter {
    &self.interpreter
  }

  /// Processes every byte the command channel has ready and returns as soon as it runs dry.
  pub fn poll_commands(&mut self) -> Option<GlitchConfig> {
    let mut reconfigured = None;

    while let Ok(byte) = self.commands.read() {
      match self.interpreter.feed(byte) {
        Some(Command::Reboot) => self.bootloader.reboot_to_bootloader(),
        Some(Command::Line(update)) => {
          self.config.apply(update);
          reconfigured = Some(self.config);
        }
        Some(Command::Rejected(_)) => self.send(b"error\n"),
        Some(Command::Interrupt | Command::Clear | Command::Overflow) | None => {}
      }
    }

    reconfigured
  }

  /// One blocking attempt at the trigger pattern, firing and reporting on a full match.
  pub fn arm(&mut self) -> (Trigger, Option<GlitchEvent>) {
    let trigger = trigger::match_trigger(&mut self.trigger);
    if trigger != Trigger::Armed {
      return (trigger, None);
    }

    let event = pulse::fire(&mut self.pin, &mut self.delay, &self.config);
    self.send(event.status_line().as_bytes());
    (trigger, Some(event))
  }

  pub fn step(&mut self) -> Step {
    let reconfigured = self.poll_commands();
    let (trigger, glitch) = self.arm();
    Step {
      reconfigured,
      trigger,
      glitch,
    }
  }

  /// Best effort, a host that does not listen must not stall the trigger loop.
  fn send(&mut self, bytes: &[u8]) {
    for &byte in bytes {
      if nb::block!(self.commands.write(byte)).is_err() {
        return;
      }
    }
    nb::block!(self.commands.flush()).ok();
  }
}
