use embedded_hal::serial;

use crate::consts::TRIGGER_PATTERN;

/// Result of one attempt at matching [`TRIGGER_PATTERN`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(not(test), derive(defmt::Format))]
pub enum Trigger {
  /// All pattern bytes were seen back to back.
  Armed,
  /// The byte at `position` did not match (or could not be read).
  Mismatch { position: usize },
}

/// Reads the trigger line one byte at a time, blocking on each byte, and gives up on the first
/// byte that differs from the pattern.
///
/// There is no resynchronisation: the next attempt starts over at the first pattern byte with
/// whatever arrives next. Receive errors count as a mismatch.
pub fn match_trigger<T: serial::Read<u8>>(line: &mut T) -> Trigger {
  for (position, &expected) in TRIGGER_PATTERN.iter().enumerate() {
    match nb::block!(line.read()) {
      Ok(byte) if byte == expected => {}
      _ => return Trigger::Mismatch { position },
    }
  }
  Trigger::Armed
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use embedded_hal::serial::Read;
  use std::collections::VecDeque;

  /// Trigger line that replays a fixed byte sequence and reports a break once exhausted.
  pub struct ScriptedLine {
    pub bytes: VecDeque<u8>,
  }

  #[derive(Debug)]
  pub struct LineIdle;

  impl ScriptedLine {
    pub fn new(bytes: &[u8]) -> Self {
      ScriptedLine {
        bytes: bytes.iter().copied().collect(),
      }
    }
  }

  impl serial::Read<u8> for ScriptedLine {
    type Error = LineIdle;

    fn read(&mut self) -> nb::Result<u8, LineIdle> {
      self.bytes.pop_front().ok_or(nb::Error::Other(LineIdle))
    }
  }

  /// Hands out `WouldBlock` a few times before every byte, like a slow UART.
  struct SlowLine {
    inner: ScriptedLine,
    stalls: usize,
    pending: usize,
  }

  impl serial::Read<u8> for SlowLine {
    type Error = LineIdle;

    fn read(&mut self) -> nb::Result<u8, LineIdle> {
      if self.pending > 0 {
        self.pending -= 1;
        return Err(nb::Error::WouldBlock);
      }
      self.pending = self.stalls;
      self.inner.read()
    }
  }

  #[test]
  fn full_pattern_arms() {
    let mut line = ScriptedLine::new(&[0x01, 0x00, 0x01, 0x00, 0xFF]);
    assert_eq!(match_trigger(&mut line), Trigger::Armed);
    assert!(line.bytes.is_empty());
  }

  #[test]
  fn mismatch_stops_reading() {
    let mut line = ScriptedLine::new(&[0x01, 0x00, 0x02, 0x00, 0xFF]);
    assert_eq!(match_trigger(&mut line), Trigger::Mismatch { position: 2 });
    assert_eq!(line.bytes, [0x00, 0xFF]);
  }

  #[test]
  fn no_resync_inside_attempt() {
    // 0x01 0x01 0x00 0x01 0x00 0xFF contains the pattern at offset 1, but the second byte
    // already fails the first attempt and the following attempt starts at 0x00.
    let mut line = ScriptedLine::new(&[0x01, 0x01, 0x00, 0x01, 0x00, 0xFF]);
    assert_eq!(match_trigger(&mut line), Trigger::Mismatch { position: 1 });
    assert_eq!(match_trigger(&mut line), Trigger::Mismatch { position: 0 });
    assert_eq!(match_trigger(&mut line), Trigger::Mismatch { position: 2 });
  }

  #[test]
  fn read_error_is_a_mismatch() {
    let mut line = ScriptedLine::new(&[0x01, 0x00]);
    assert_eq!(match_trigger(&mut line), Trigger::Mismatch { position: 2 });
  }

  #[test]
  fn blocks_until_bytes_arrive() {
    let mut line = SlowLine {
      inner: ScriptedLine::new(&TRIGGER_PATTERN),
      stalls: 3,
      pending: 3,
    };
    assert_eq!(match_trigger(&mut line), Trigger::Armed);
  }
}
