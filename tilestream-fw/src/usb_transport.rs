// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! USB CDC link to the host tool.
//!
//! Inbound bytes are collected by a [`FrameAccumulator`] until a `0x00`
//! delimiter, then COBS-decoded into a [`Command`]. Outbound [`Response`]s are
//! encoded into a stack buffer and written out while the bus is polled.

use rp2040_hal::usb::UsbBus;
use tilestream_common::protocol::{Command, Response, USB_PID, USB_VID};
use usb_device::class_prelude::UsbBusAllocator;
use usb_device::prelude::*;
use usbd_serial::SerialPort;

/// Largest encoded command, with headroom for COBS overhead on a `WriteRam`.
const MAX_FRAME: usize = 512;
const TX_BUF_SIZE: usize = 512;
/// Polls allowed without progress before a write is abandoned.
const MAX_STALLED_POLLS: u32 = 10_000;

#[derive(Debug, defmt::Format)]
pub enum TransportError {
    StringTooLong,
    Encode,
    Stalled,
    Write,
}

/// COBS frame collector. An overlong frame is skipped up to its delimiter.
struct FrameAccumulator {
    buf: [u8; MAX_FRAME],
    len: usize,
    overflowed: bool,
}

impl FrameAccumulator {
    const fn new() -> Self {
        Self {
            buf: [0; MAX_FRAME],
            len: 0,
            overflowed: false,
        }
    }

    /// Feed one byte; yields a command when it closes a valid frame.
    fn push(&mut self, byte: u8) -> Option<Command> {
        if byte != 0x00 {
            if self.overflowed {
                return None;
            }
            let Some(slot) = self.buf.get_mut(self.len) else {
                defmt::warn!("USB: frame over {} bytes skipped", MAX_FRAME);
                self.overflowed = true;
                return None;
            };
            *slot = byte;
            self.len += 1;
            return None;
        }

        let len = core::mem::take(&mut self.len);
        if core::mem::take(&mut self.overflowed) || len == 0 {
            return None;
        }
        match postcard::from_bytes_cobs::<Command>(&mut self.buf[..len]) {
            Ok(cmd) => Some(cmd),
            Err(_) => {
                defmt::warn!("USB: undecodable {}-byte frame dropped", len);
                None
            }
        }
    }
}

pub struct UsbTransport {
    serial: SerialPort<'static, UsbBus>,
    usb_dev: UsbDevice<'static, UsbBus>,
    rx: FrameAccumulator,
}

impl UsbTransport {
    pub fn new(usb_bus: &'static UsbBusAllocator<UsbBus>) -> Result<Self, TransportError> {
        let serial = SerialPort::new(usb_bus);
        let usb_dev = UsbDeviceBuilder::new(usb_bus, UsbVidPid(USB_VID, USB_PID))
            .strings(&[StringDescriptors::default()
                .manufacturer("ADNT")
                .product("Tilestream")
                .serial_number("0001")])
            .map_err(|_| TransportError::StringTooLong)?
            .device_class(usbd_serial::USB_CLASS_CDC)
            .build();

        Ok(Self {
            serial,
            usb_dev,
            rx: FrameAccumulator::new(),
        })
    }

    /// Service the USB peripheral. Call at least once per main loop pass.
    pub fn poll(&mut self) -> bool {
        self.usb_dev.poll(&mut [&mut self.serial])
    }

    pub fn is_configured(&self) -> bool {
        self.usb_dev.state() == UsbDeviceState::Configured
    }

    /// Next complete command, if one has arrived.
    ///
    /// Reads one byte at a time so that bytes past the end of a frame stay in
    /// the endpoint for the next call.
    pub fn try_receive(&mut self) -> Option<Command> {
        let mut byte = [0u8; 1];
        while let Ok(1) = self.serial.read(&mut byte) {
            if let Some(cmd) = self.rx.push(byte[0]) {
                return Some(cmd);
            }
        }
        None
    }

    pub fn send(&mut self, resp: &Response) -> Result<(), TransportError> {
        let mut buf = [0u8; TX_BUF_SIZE];
        let frame = postcard::to_slice_cobs(resp, &mut buf).map_err(|_| TransportError::Encode)?;
        self.write_frame(frame)
    }

    /// Push a whole frame out, polling while the endpoint is full.
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let mut rest = frame;
        let mut stalled = 0;
        while !rest.is_empty() {
            match self.serial.write(rest) {
                Ok(n) => {
                    rest = &rest[n..];
                    stalled = 0;
                }
                Err(UsbError::WouldBlock) if stalled < MAX_STALLED_POLLS => {
                    stalled += 1;
                    self.poll();
                }
                Err(UsbError::WouldBlock) => return Err(TransportError::Stalled),
                Err(_) => return Err(TransportError::Write),
            }
        }
        Ok(())
    }
}
