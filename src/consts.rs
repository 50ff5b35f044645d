// Definitions valid for one particular electrical setup

use embedded_hal::digital::v2::PinState;

/// Whether the glitch output is driven high or low while the pulse is active.
///
/// # Semantics
/// If this is set to high, the pin is driven to 3.3V for the duration of the pulse and idles at
/// ground, otherwise the other way around.
pub const GLITCH_ACTIVE_POLARITY: PinState = PinState::High;

/// Byte sequence on the trigger line that arms one glitch.
pub const TRIGGER_PATTERN: [u8; 5] = [0x01, 0x00, 0x01, 0x00, 0xFF];

/// The trigger line is the target's 9600 baud bootloader UART
pub const TRIGGER_BAUD_RATE: u32 = 9600;

/// `min_delay = sys_clk / MIN_DELAY_DIVISOR`, roughly the duration of the last trigger byte on the wire.
pub const MIN_DELAY_DIVISOR: u32 = 1200;

pub const DEFAULT_DELAY_OFFSET: i32 = 0;
pub const DEFAULT_PULSE_WIDTH: i32 = 10;

/// Capacity of the command line buffer, longer lines are discarded.
pub const COMMAND_BUFFER_LEN: usize = 128;

/// Enough for `"glitch -2147483648 -2147483648\n"`.
pub const STATUS_LINE_LEN: usize = 32;

/// Ctrl-C as sent by terminal programs and host tooling; ignored.
pub const INTERRUPT_BYTE: u8 = 0x03;
pub const REBOOT_BYTE: u8 = b'r';
pub const CLEAR_BYTE: u8 = b'$';
pub const NEWLINE_BYTE: u8 = b'\n';
