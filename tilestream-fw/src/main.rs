// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

#![no_std]
#![no_main]

mod engine;
mod flash;
mod host;
mod layout;
mod peripherals;
mod services;
mod usb_transport;

use defmt_rtt as _;
use embedded_hal::digital::OutputPin;
use panic_probe as _;
use tilestream_common::service::{Event, EventBus, Service, ServiceContext};

defmt::timestamp!("{=u64:us}", { 0 });

use cortex_m_rt::entry;

#[unsafe(link_section = ".boot2")]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_GENERIC_03H;

fn halt() -> ! {
    loop {
        cortex_m::asm::nop();
    }
}

#[entry]
fn main() -> ! {
    defmt::println!("Tilestream init");

    let Some((timer, mut led_pin, usb)) = peripherals::init_board() else {
        defmt::error!("Board init failed");
        halt();
    };

    let layout = layout::MemoryLayout::from_linker();
    if !layout.matches_protocol() {
        defmt::error!(
            "Volume directory at 0x{:08x} does not match the host tool",
            layout.volume_dir
        );
        led_pin.set_high().ok();
        halt();
    }

    let volumes = flash::mount_volumes(&layout);
    defmt::println!("{} volume(s) mounted", volumes.len());

    let Some(engine) = engine::AssetEngine::new(&volumes) else {
        defmt::error!("Asset engine already taken");
        halt();
    };

    let mut peripherals = peripherals::Peripherals {
        timer,
        led_pin,
        usb: Some(usb),
        engine,
    };
    let events = EventBus::new();
    events.publish(Event::RequestLink);

    let usb_service = services::UsbTransportService::new();
    let host_service = services::HostLinkService::new();
    let loader_service = services::LoaderService::new();
    let drain_service = services::FifoDrainService::new();
    let led_service = services::LedBlinkService::new();
    let services: [&dyn Service<peripherals::Peripherals>; 5] = [
        &usb_service,
        &host_service,
        &loader_service,
        &drain_service,
        &led_service,
    ];

    loop {
        let mut ctx = ServiceContext {
            peripherals: &mut peripherals,
            events: &events,
        };
        for service in services {
            service.process(&mut ctx);
        }
    }
}
