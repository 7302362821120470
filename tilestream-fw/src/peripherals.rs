// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Board bring-up and the hardware handed to services.

use crate::engine::AssetEngine;
use core::cell::UnsafeCell;
use rp2040_hal::{
    self as hal,
    clocks::UsbClock,
    gpio::{bank0::Gpio25, FunctionSioOutput, Pin, PullDown},
    pac,
    usb::UsbBus,
    Timer,
};
use usb_device::class_prelude::UsbBusAllocator;

const XTAL_FREQ_HZ: u32 = 12_000_000;

pub type LedPin = Pin<Gpio25, FunctionSioOutput, PullDown>;

/// USB peripheral parts, consumed once the host link is brought up.
pub struct UsbParts {
    pub regs: pac::USBCTRL_REGS,
    pub dpram: pac::USBCTRL_DPRAM,
    pub clock: UsbClock,
    pub resets: pac::RESETS,
}

/// Everything services may touch.
pub struct Peripherals {
    pub timer: Timer,
    pub led_pin: LedPin,
    pub usb: Option<UsbParts>,
    pub engine: AssetEngine,
}

/// Clock, GPIO and timer setup. Returns `None` if the crystal does not start.
pub fn init_board() -> Option<(Timer, LedPin, UsbParts)> {
    let mut pac = pac::Peripherals::take()?;
    let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);

    let clocks = hal::clocks::init_clocks_and_plls(
        XTAL_FREQ_HZ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .ok()?;

    let sio = hal::Sio::new(pac.SIO);
    let pins = hal::gpio::Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );
    let led_pin = pins.gpio25.into_push_pull_output();
    let timer = Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);

    let usb = UsbParts {
        regs: pac.USBCTRL_REGS,
        dpram: pac.USBCTRL_DPRAM,
        clock: clocks.usb_clock,
        resets: pac.RESETS,
    };

    Some((timer, led_pin, usb))
}

/// Wrapper to hold the USB bus allocator in a static without `static mut`.
///
/// SAFETY: Only safe in a single-threaded (bare-metal, no OS) environment.
/// Written once during link bring-up, read-only afterwards.
struct SyncUsbBus(UnsafeCell<Option<UsbBusAllocator<UsbBus>>>);
unsafe impl Sync for SyncUsbBus {}

static USB_BUS: SyncUsbBus = SyncUsbBus(UnsafeCell::new(None));

/// Store the USB bus allocator (call once during link bring-up)
pub fn store_usb_bus(bus: UsbBusAllocator<UsbBus>) {
    // SAFETY: Called once, before any reference from `usb_bus_ref` exists
    unsafe {
        *USB_BUS.0.get() = Some(bus);
    }
}

/// Borrow the stored USB bus allocator for the rest of the program.
pub fn usb_bus_ref() -> Option<&'static UsbBusAllocator<UsbBus>> {
    // SAFETY: Never written again after `store_usb_bus`
    unsafe { (*USB_BUS.0.get()).as_ref() }
}
