//! Line oriented command protocol on the host channel.
//!
//! Every byte is classified on arrival:
//! - `0x03` is swallowed,
//! - `r` reboots into the USB bootloader,
//! - `$` throws away the line typed so far,
//! - `\n` ends the line, which is scanned for `<delay> <width>`,
//! - anything else is appended to the line buffer.
//!
//! Nothing here ever reports an error to the host unless [`ParsePolicy::Strict`] is selected.

use crate::config::ConfigUpdate;
use crate::consts::*;

/// Fixed capacity line buffer. The cursor never reaches the capacity: the byte that would fill
/// the last slot wraps it back to zero and the whole line is lost.
pub struct LineBuffer {
  buf: [u8; COMMAND_BUFFER_LEN],
  cursor: usize,
}

impl LineBuffer {
  pub const fn new() -> Self {
    LineBuffer {
      buf: [0; COMMAND_BUFFER_LEN],
      cursor: 0,
    }
  }

  /// Appends `byte`, returns `false` if the buffer overflowed and was reset.
  pub fn push(&mut self, byte: u8) -> bool {
    self.buf[self.cursor] = byte;
    self.cursor += 1;
    if self.cursor >= COMMAND_BUFFER_LEN {
      self.cursor = 0;
      return false;
    }
    true
  }

  pub fn clear(&mut self) {
    self.cursor = 0;
  }

  pub fn cursor(&self) -> usize {
    self.cursor
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.buf[..self.cursor]
  }
}

impl Default for LineBuffer {
  fn default() -> Self {
    Self::new()
  }
}

/// How a terminated line that did not yield both integers is treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(not(test), derive(defmt::Format))]
pub enum ParsePolicy {
  /// Apply whatever converted, keep the previous values for the rest.
  Lenient,
  /// Only complete lines are applied, everything else is answered with `error`.
  Strict,
}

impl Default for ParsePolicy {
  fn default() -> Self {
    if cfg!(feature = "strict-commands") {
      ParsePolicy::Strict
    } else {
      ParsePolicy::Lenient
    }
  }
}

/// Outcome of feeding one byte to the interpreter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(not(test), derive(defmt::Format))]
pub enum Command {
  Interrupt,
  Reboot,
  Clear,
  /// The line buffer ran full and was discarded.
  Overflow,
  /// A terminated line, to be applied to the configuration.
  Line(ConfigUpdate),
  /// A terminated line refused under [`ParsePolicy::Strict`].
  Rejected(ConfigUpdate),
}

pub struct CommandInterpreter {
  line: LineBuffer,
  policy: ParsePolicy,
}

impl CommandInterpreter {
  pub const fn new(policy: ParsePolicy) -> Self {
    CommandInterpreter {
      line: LineBuffer::new(),
      policy,
    }
  }

  pub fn policy(&self) -> ParsePolicy {
    self.policy
  }

  pub fn cursor(&self) -> usize {
    self.line.cursor()
  }

  /// Consumes one byte from the command channel. Plain line content yields `None`.
  pub fn feed(&mut self, byte: u8) -> Option<Command> {
    match byte {
      INTERRUPT_BYTE => Some(Command::Interrupt),
      REBOOT_BYTE => Some(Command::Reboot),
      NEWLINE_BYTE => {
        let update = parse_line(self.line.as_bytes());
        self.line.clear();
        match self.policy {
          ParsePolicy::Strict if !update.is_complete() => Some(Command::Rejected(update)),
          _ => Some(Command::Line(update)),
        }
      }
      CLEAR_BYTE => {
        self.line.clear();
        Some(Command::Clear)
      }
      _ => {
        if self.line.push(byte) {
          None
        } else {
          Some(Command::Overflow)
        }
      }
    }
  }
}

impl Default for CommandInterpreter {
  fn default() -> Self {
    Self::new(ParsePolicy::default())
  }
}

/// Scans `"<delay> <width>"` the way a C `sscanf(line, "%d %d")` does.
///
/// A NUL byte ends the line. Conversion stops at the first field that fails, so a width is only
/// picked up after a delay converted. Out of range numbers saturate.
pub fn parse_line(line: &[u8]) -> ConfigUpdate {
  let end = line.iter().position(|&b| b == 0).unwrap_or(line.len());
  let mut rest = &line[..end];

  let mut update = ConfigUpdate::default();
  update.delay_offset = scan_int(&mut rest);
  if update.delay_offset.is_some() {
    update.pulse_width = scan_int(&mut rest);
  }
  update
}

fn is_space(byte: u8) -> bool {
  matches!(byte, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r')
}

/// Converts one `%d` field from the front of `input`, advancing it past the field on success.
fn scan_int(input: &mut &[u8]) -> Option<i32> {
  let line: &[u8] = *input;
  let start = line.iter().position(|&b| !is_space(b)).unwrap_or(line.len());
  let mut rest = &line[start..];

  let negative = match rest.first() {
    Some(b'-') => {
      rest = &rest[1..];
      true
    }
    Some(b'+') => {
      rest = &rest[1..];
      false
    }
    _ => false,
  };

  let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
  if digits == 0 {
    return None;
  }

  // Clamped one past i32::MAX so i32::MIN still fits after negation.
  let magnitude = rest[..digits].iter().fold(0i64, |acc, &d| {
    (acc * 10 + (d - b'0') as i64).min(i32::MAX as i64 + 1)
  });
  let value = if negative { -magnitude } else { magnitude };

  *input = &rest[digits..];
  Some(value.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn update(delay_offset: Option<i32>, pulse_width: Option<i32>) -> ConfigUpdate {
    ConfigUpdate {
      delay_offset,
      pulse_width,
    }
  }

  fn feed_all(interpreter: &mut CommandInterpreter, bytes: &[u8]) -> Vec<Command> {
    bytes.iter().filter_map(|&b| interpreter.feed(b)).collect()
  }

  #[test]
  fn parses_two_fields() {
    assert_eq!(parse_line(b"5 20"), update(Some(5), Some(20)));
    assert_eq!(parse_line(b"23650 17"), update(Some(23650), Some(17)));
  }

  #[test]
  fn parses_signs_and_whitespace() {
    assert_eq!(parse_line(b"  -7 \t +3"), update(Some(-7), Some(3)));
    assert_eq!(parse_line(b"12 34\r"), update(Some(12), Some(34)));
    assert_eq!(parse_line(b"1\x0b2"), update(Some(1), Some(2)));
  }

  #[test]
  fn unparsable_line_yields_nothing() {
    assert_eq!(parse_line(b"abc"), update(None, None));
    assert_eq!(parse_line(b""), update(None, None));
    assert_eq!(parse_line(b"- 5"), update(None, None));
    assert_eq!(parse_line(b"+"), update(None, None));
  }

  #[test]
  fn width_only_after_delay() {
    assert_eq!(parse_line(b"x 20"), update(None, None));
    assert_eq!(parse_line(b"5"), update(Some(5), None));
    assert_eq!(parse_line(b"5,20"), update(Some(5), None));
    assert_eq!(parse_line(b"5abc 20"), update(Some(5), None));
  }

  #[test]
  fn adjacent_fields_split_on_sign() {
    assert_eq!(parse_line(b"5-20"), update(Some(5), Some(-20)));
  }

  #[test]
  fn trailing_garbage_ignored() {
    assert_eq!(parse_line(b"5 20 30 foo"), update(Some(5), Some(20)));
  }

  #[test]
  fn nul_terminates_line() {
    assert_eq!(parse_line(b"5\x00 20"), update(Some(5), None));
    assert_eq!(parse_line(b"\x005 20"), update(None, None));
  }

  #[test]
  fn out_of_range_saturates() {
    assert_eq!(
      parse_line(b"99999999999 -99999999999"),
      update(Some(i32::MAX), Some(i32::MIN))
    );
    assert_eq!(
      parse_line(b"-2147483648 2147483647"),
      update(Some(i32::MIN), Some(i32::MAX))
    );
  }

  #[test]
  fn line_buffer_wraps_at_capacity() {
    let mut line = LineBuffer::new();
    for _ in 0..COMMAND_BUFFER_LEN - 1 {
      assert!(line.push(b'a'));
    }
    assert_eq!(line.cursor(), COMMAND_BUFFER_LEN - 1);
    assert!(!line.push(b'a'));
    assert_eq!(line.cursor(), 0);
    assert!(line.as_bytes().is_empty());
  }

  #[test]
  fn control_bytes() {
    let mut interpreter = CommandInterpreter::new(ParsePolicy::Lenient);
    assert_eq!(interpreter.feed(INTERRUPT_BYTE), Some(Command::Interrupt));
    assert_eq!(interpreter.feed(b'r'), Some(Command::Reboot));
    assert_eq!(interpreter.feed(b'1'), None);
    assert_eq!(interpreter.cursor(), 1);
    assert_eq!(interpreter.feed(b'$'), Some(Command::Clear));
    assert_eq!(interpreter.cursor(), 0);
  }

  #[test]
  fn interrupt_byte_is_not_buffered() {
    let mut interpreter = CommandInterpreter::new(ParsePolicy::Lenient);
    let commands = feed_all(&mut interpreter, b"5\x03 20\n");
    assert_eq!(
      commands,
      [Command::Interrupt, Command::Line(update(Some(5), Some(20)))]
    );
  }

  #[test]
  fn newline_resets_cursor_even_when_unparsable() {
    let mut interpreter = CommandInterpreter::new(ParsePolicy::Lenient);
    let commands = feed_all(&mut interpreter, b"abc\n");
    assert_eq!(commands, [Command::Line(update(None, None))]);
    assert_eq!(interpreter.cursor(), 0);
  }

  #[test]
  fn clear_discards_prefix() {
    let mut interpreter = CommandInterpreter::new(ParsePolicy::Lenient);
    let commands = feed_all(&mut interpreter, b"99 9$5 20\n");
    assert_eq!(
      commands,
      [Command::Clear, Command::Line(update(Some(5), Some(20)))]
    );
  }

  #[test]
  fn overflow_discards_line() {
    let mut interpreter = CommandInterpreter::new(ParsePolicy::Lenient);
    let commands = feed_all(&mut interpreter, &[b'7'; 130]);
    assert_eq!(commands, [Command::Overflow]);
    assert_eq!(interpreter.cursor(), 2);

    let commands = feed_all(&mut interpreter, b"\n");
    assert_eq!(commands, [Command::Line(update(Some(77), None))]);
  }

  #[test]
  fn strict_policy_rejects_partial_lines() {
    let mut interpreter = CommandInterpreter::new(ParsePolicy::Strict);
    assert_eq!(
      feed_all(&mut interpreter, b"5\n"),
      [Command::Rejected(update(Some(5), None))]
    );
    assert_eq!(
      feed_all(&mut interpreter, b"abc\n"),
      [Command::Rejected(update(None, None))]
    );
    assert_eq!(
      feed_all(&mut interpreter, b"5 20\n"),
      [Command::Line(update(Some(5), Some(20)))]
    );
  }
}
