//! Glitch timing parameters shared between the command interpreter and the trigger engine.

use crate::consts::*;

/// Fields converted from one command line. `None` means the field did not parse and the
/// previously held value stays in effect.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(not(test), derive(defmt::Format))]
pub struct ConfigUpdate {
  pub delay_offset: Option<i32>,
  pub pulse_width: Option<i32>,
}

impl ConfigUpdate {
  pub fn is_complete(&self) -> bool {
    self.delay_offset.is_some() && self.pulse_width.is_some()
  }
}

/// Delay and pulse width of the next glitch.
///
/// `resolved_delay` is derived from `delay_offset` and only ever changes together with it, so
/// readers always see a consistent pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(not(test), derive(defmt::Format))]
pub struct GlitchConfig {
  min_delay: u32,
  delay_offset: i32,
  pulse_width: i32,
  resolved_delay: u32,
}

impl GlitchConfig {
  /// Starts from the default offset and width; `min_delay` is fixed from here on.
  pub fn new(sys_clk_hz: u32) -> Self {
    let min_delay = sys_clk_hz / MIN_DELAY_DIVISOR;
    GlitchConfig {
      min_delay,
      delay_offset: DEFAULT_DELAY_OFFSET,
      pulse_width: DEFAULT_PULSE_WIDTH,
      resolved_delay: resolve(min_delay, DEFAULT_DELAY_OFFSET),
    }
  }

  pub fn min_delay(&self) -> u32 {
    self.min_delay
  }

  pub fn delay_offset(&self) -> i32 {
    self.delay_offset
  }

  pub fn pulse_width(&self) -> i32 {
    self.pulse_width
  }

  /// Cycles between the last trigger byte and the rising edge of the pulse.
  pub fn resolved_delay(&self) -> u32 {
    self.resolved_delay
  }

  /// Cycles the output stays active. Negative widths collapse to the shortest possible pulse.
  pub fn width_cycles(&self) -> u32 {
    self.pulse_width.max(0) as u32
  }

  /// Overwrites the fields present in `update` and recomputes the resolved delay.
  pub fn apply(&mut self, update: ConfigUpdate) {
    if let Some(delay_offset) = update.delay_offset {
      self.delay_offset = delay_offset;
    }
    if let Some(pulse_width) = update.pulse_width {
      self.pulse_width = pulse_width;
    }
    self.resolved_delay = resolve(self.min_delay, self.delay_offset);
  }
}

fn resolve(min_delay: u32, delay_offset: i32) -> u32 {
  let cycles = min_delay as i64 + delay_offset as i64;
  cycles.clamp(0, u32::MAX as i64) as u32
}
