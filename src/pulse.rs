use core::fmt::Write;

use embedded_hal::digital::v2::OutputPin;
use heapless::String;

use crate::config::GlitchConfig;
use crate::consts::{GLITCH_ACTIVE_POLARITY, STATUS_LINE_LEN};

/// Spins for a number of core clock cycles.
pub trait CycleDelay {
  /// Returns after *at least* `cycles` cycles. Must not sleep or yield.
  fn delay_cycles(&mut self, cycles: u32);
}

/// The parameters a glitch was fired with, as reported back to the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(not(test), derive(defmt::Format))]
pub struct GlitchEvent {
  pub delay_offset: i32,
  pub pulse_width: i32,
}

impl GlitchEvent {
  /// `"glitch <delay> <width>\n"`
  pub fn status_line(&self) -> String<STATUS_LINE_LEN> {
    let mut line = String::new();
    // Cannot overflow: two i32 plus the prefix fit into STATUS_LINE_LEN.
    let _ = writeln!(line, "glitch {} {}", self.delay_offset, self.pulse_width);
    line
  }
}

/// Waits the resolved delay, then holds `pin` active for the pulse width.
///
/// The sequence is never interrupted once started.
pub fn fire<P: OutputPin, D: CycleDelay>(
  pin: &mut P,
  delay: &mut D,
  config: &GlitchConfig,
) -> GlitchEvent {
  let (delay_cycles, width_cycles) = (config.resolved_delay(), config.width_cycles());

  uninterrupted(|| {
    delay.delay_cycles(delay_cycles);
    pin.set_state(GLITCH_ACTIVE_POLARITY).ok();
    delay.delay_cycles(width_cycles);
    pin.set_state(!GLITCH_ACTIVE_POLARITY).ok();
  });

  GlitchEvent {
    delay_offset: config.delay_offset(),
    pulse_width: config.pulse_width(),
  }
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
fn uninterrupted<R>(f: impl FnOnce() -> R) -> R {
  cortex_m::interrupt::free(|_| f())
}

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
fn uninterrupted<R>(f: impl FnOnce() -> R) -> R {
  f()
}
