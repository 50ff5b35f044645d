#![no_std]
#![no_main]
mod board;

use panic_halt as _;

#[rtic::app(device = rp_pico::hal::pac, peripherals = true)]
mod app {

  use defmt::*;
  use defmt_rtt as _;
  use fugit::RateExtU32;
  use heapless::spsc::{Consumer, Producer, Queue};
  use rp_pico::hal::clocks::init_clocks_and_plls;
  use rp_pico::hal::gpio::{OutputDriveStrength, OutputSlewRate};
  use rp_pico::hal::uart::{DataBits, StopBits, UartConfig, UartPeripheral};
  use rp_pico::hal::watchdog::Watchdog;
  use rp_pico::hal::{self, usb::UsbBus, Clock, Sio};
  use rp_pico::XOSC_CRYSTAL_FREQ;
  use usb_device::class_prelude::UsbBusAllocator;
  use usb_device::prelude::*;
  use usbd_serial::{SerialPort, USB_CLASS_CDC};

  use pico_glitcher::consts::TRIGGER_BAUD_RATE;
  use pico_glitcher::{CommandInterpreter, GlitchConfig, Glitcher};

  use crate::board::*;

  type TriggerUart = UartPeripheral<
    hal::uart::Enabled,
    hal::pac::UART0,
    (
      hal::gpio::Pin<hal::gpio::pin::bank0::Gpio0, hal::gpio::FunctionUart>,
      hal::gpio::Pin<hal::gpio::pin::bank0::Gpio1, hal::gpio::FunctionUart>,
    ),
  >;
  type GlitchPin = hal::gpio::Pin<hal::gpio::pin::bank0::Gpio2, hal::gpio::PushPullOutput>;
  type FirmwareGlitcher = Glitcher<UsbCommandPort, TriggerUart, GlitchPin, CoreCycles, RomBootloader>;

  #[shared]
  struct Shared {}

  #[local]
  struct Local {
    usb_dev: UsbDevice<'static, UsbBus>,
    serial: SerialPort<'static, UsbBus>,
    rx_producer: Producer<'static, u8, RX_QUEUE_LEN>,
    tx_consumer: Consumer<'static, u8, TX_QUEUE_LEN>,
    glitcher: FirmwareGlitcher,
  }

  #[init(local = [
    usb_bus: Option<UsbBusAllocator<UsbBus>> = None,
    rx_queue: Queue<u8, RX_QUEUE_LEN> = Queue::new(),
    tx_queue: Queue<u8, TX_QUEUE_LEN> = Queue::new(),
  ])]
  fn init(c: init::Context) -> (Shared, Local, init::Monotonics) {
    // Soft-reset does not release the hardware spinlocks
    // Release them now to avoid a deadlock after debug or watchdog reset
    unsafe {
      hal::sio::spinlock_reset();
    }
    info!("Initializing Raspberry Pi Pico.");

    let mut resets = c.device.RESETS;
    let mut watchdog = Watchdog::new(c.device.WATCHDOG);
    let clocks = init_clocks_and_plls(
      XOSC_CRYSTAL_FREQ,
      c.device.XOSC,
      c.device.CLOCKS,
      c.device.PLL_SYS,
      c.device.PLL_USB,
      &mut resets,
      &mut watchdog,
    )
    .ok()
    .unwrap();

    let sio = Sio::new(c.device.SIO);
    let pins = rp_pico::Pins::new(c.device.IO_BANK0, c.device.PADS_BANK0, sio.gpio_bank0, &mut resets);

    let mut glitch_pin = pins.gpio2.into_push_pull_output();
    glitch_pin.set_slew_rate(OutputSlewRate::Fast);
    glitch_pin.set_drive_strength(OutputDriveStrength::TwelveMilliAmps);

    let uart_pins = (
      pins.gpio0.into_mode::<hal::gpio::FunctionUart>(),
      pins.gpio1.into_mode::<hal::gpio::FunctionUart>(),
    );
    let trigger_uart = UartPeripheral::new(c.device.UART0, uart_pins, &mut resets)
      .enable(
        UartConfig::new(TRIGGER_BAUD_RATE.Hz(), DataBits::Eight, None, StopBits::One),
        clocks.peripheral_clock.freq(),
      )
      .unwrap();

    let usb_bus: &'static UsbBusAllocator<UsbBus> = c.local.usb_bus.insert(UsbBusAllocator::new(UsbBus::new(
      c.device.USBCTRL_REGS,
      c.device.USBCTRL_DPRAM,
      clocks.usb_clock,
      true,
      &mut resets,
    )));
    let serial = SerialPort::new(usb_bus);
    let usb_dev = UsbDeviceBuilder::new(usb_bus, UsbVidPid(0x16c0, 0x27dd))
      .manufacturer("pico-glitcher")
      .product("Glitch trigger")
      .serial_number("0001")
      .device_class(USB_CLASS_CDC)
      .build();

    let (rx_producer, rx_consumer) = c.local.rx_queue.split();
    let (tx_producer, tx_consumer) = c.local.tx_queue.split();

    let sys_clk_hz = clocks.system_clock.freq().to_Hz();
    let config = GlitchConfig::new(sys_clk_hz);
    let glitcher = Glitcher::new(
      config,
      CommandInterpreter::default(),
      UsbCommandPort::new(rx_consumer, tx_producer),
      trigger_uart,
      glitch_pin,
      CoreCycles,
      RomBootloader,
    );

    info!(
      "Initialization successful at {} Hz, minimum delay {} cycles",
      sys_clk_hz,
      config.min_delay()
    );

    (
      Shared {},
      Local {
        usb_dev,
        serial,
        rx_producer,
        tx_consumer,
        glitcher,
      },
      init::Monotonics(),
    )
  }

  /// Moves bytes between the CDC port and the queues the idle loop works on.
  #[task(
        binds = USBCTRL_IRQ,
        priority = 1,
        local = [usb_dev, serial, rx_producer, tx_consumer],
    )]
  fn usb_irq(c: usb_irq::Context) {
    let usb_irq::LocalResources {
      usb_dev,
      serial,
      rx_producer,
      tx_consumer,
    } = c.local;

    if usb_dev.poll(&mut [serial]) {
      let mut buf = [0u8; 64];
      if let Ok(count) = serial.read(&mut buf) {
        // Dropped bytes surface as a garbled line, which the interpreter already tolerates
        if buf[..count].iter().any(|&b| rx_producer.enqueue(b).is_err()) {
          warn!("Command queue full, dropping input.");
        }
      }
    }

    while let Some(&byte) = tx_consumer.peek() {
      match serial.write(&[byte]) {
        Ok(1) => {
          tx_consumer.dequeue();
        }
        _ => break,
      }
    }
  }

  #[idle(local = [glitcher])]
  fn idle(c: idle::Context) -> ! {
    info!("Waiting for trigger pattern.");

    loop {
      let step = c.local.glitcher.step();

      if let Some(config) = step.reconfigured {
        info!(
          "Reconfigured: offset {} width {} -> {} delay cycles",
          config.delay_offset(),
          config.pulse_width(),
          config.resolved_delay()
        );
      }

      match step.glitch {
        Some(event) => info!("Glitch fired: {}", event),
        None => trace!("Trigger not matched: {}", step.trigger),
      }
    }
  }
}
