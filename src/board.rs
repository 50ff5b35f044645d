// Glue between the RP2040 peripherals and the glitcher traits

use core::convert::Infallible;

use embedded_hal::serial;
use heapless::spsc::{Consumer, Producer};
use rp_pico::hal;

use pico_glitcher::{Bootloader, CycleDelay};

/// Command bytes received over USB and not yet looked at by the idle loop.
pub const RX_QUEUE_LEN: usize = 256;

/// Status output waiting for the USB interrupt. Holds a handful of status lines.
pub const TX_QUEUE_LEN: usize = 128;

/// The idle side of the USB CDC port.
///
/// The USB stack itself is serviced from `USBCTRL_IRQ`; this only touches the two queues, so
/// reading never blocks and writing drops output instead of waiting for a host that is not
/// listening.
pub struct UsbCommandPort {
  rx: Consumer<'static, u8, RX_QUEUE_LEN>,
  tx: Producer<'static, u8, TX_QUEUE_LEN>,
}

impl UsbCommandPort {
  pub fn new(rx: Consumer<'static, u8, RX_QUEUE_LEN>, tx: Producer<'static, u8, TX_QUEUE_LEN>) -> Self {
    UsbCommandPort { rx, tx }
  }
}

impl serial::Read<u8> for UsbCommandPort {
  type Error = Infallible;

  fn read(&mut self) -> nb::Result<u8, Infallible> {
    self.rx.dequeue().ok_or(nb::Error::WouldBlock)
  }
}

impl serial::Write<u8> for UsbCommandPort {
  type Error = Infallible;

  fn write(&mut self, word: u8) -> nb::Result<(), Infallible> {
    self.tx.enqueue(word).ok();
    Ok(())
  }

  /// Kicks the USB interrupt so queued output goes out without waiting for the next host poll.
  fn flush(&mut self) -> nb::Result<(), Infallible> {
    rtic::pend(hal::pac::Interrupt::USBCTRL_IRQ);
    Ok(())
  }
}

/// Busy waits on the core clock.
pub struct CoreCycles;

impl CycleDelay for CoreCycles {
  fn delay_cycles(&mut self, cycles: u32) {
    cortex_m::asm::delay(cycles);
  }
}

/// Reboots into the boot ROM's USB mass storage mode for reflashing.
pub struct RomBootloader;

impl Bootloader for RomBootloader {
  fn reboot_to_bootloader(&mut self) -> ! {
    defmt::info!("Rebooting into USB bootloader.");
    hal::rom_data::reset_to_usb_boot(0, 0);
    loop {
      cortex_m::asm::nop();
    }
  }
}
