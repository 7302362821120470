// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! USB polling, and the link state shared between services.
//!
//! The transport only exists once the host link service has brought USB up,
//! so it lives in a static next to the inbound command queue rather than in
//! [`Peripherals`].

use crate::{peripherals::Peripherals, usb_transport::UsbTransport};
use core::cell::{Cell, UnsafeCell};
use heapless::spsc::Queue;
use tilestream_common::{
    protocol::Command,
    service::{Service, ServiceContext},
};

const COMMAND_QUEUE_DEPTH: usize = 8;

/// Static slot accessed only through [`Shared::with`].
///
/// SAFETY: Single core, no interrupt handlers touch these statics, and no
/// caller re-enters `with` on the same slot from inside its closure.
struct Shared<T>(UnsafeCell<T>);
unsafe impl<T> Sync for Shared<T> {}

impl<T> Shared<T> {
    const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        // SAFETY: see the type-level comment
        unsafe { f(&mut *self.0.get()) }
    }
}

static COMMANDS: Shared<Queue<Command, COMMAND_QUEUE_DEPTH>> = Shared::new(Queue::new());
static TRANSPORT: Shared<Option<UsbTransport>> = Shared::new(None);

/// Oldest command not yet dispatched.
pub fn pop_command() -> Option<Command> {
    COMMANDS.with(|queue| queue.dequeue())
}

/// Install the transport once USB is up.
pub fn store_transport(transport: UsbTransport) {
    TRANSPORT.with(|slot| *slot = Some(transport));
}

/// Run `f` against the transport, if the link was brought up.
pub fn with_transport<R>(f: impl FnOnce(&mut UsbTransport) -> R) -> Option<R> {
    TRANSPORT.with(|slot| slot.as_mut().map(f))
}

/// Like [`with_transport`], but only once a host has configured the device.
pub fn with_configured_transport<R>(f: impl FnOnce(&mut UsbTransport) -> R) -> Option<R> {
    with_transport(|transport| transport.is_configured().then(|| f(transport))).flatten()
}

/// Polls USB and queues every complete command for the host link service.
pub struct UsbTransportService {
    dropped: Cell<u32>,
}

impl UsbTransportService {
    pub fn new() -> Self {
        Self {
            dropped: Cell::new(0),
        }
    }
}

impl Service<Peripherals> for UsbTransportService {
    fn process(&self, _ctx: &mut ServiceContext<Peripherals>) {
        with_transport(|transport| {
            transport.poll();

            while let Some(cmd) = transport.try_receive() {
                if COMMANDS.with(|queue| queue.enqueue(cmd)).is_err() {
                    let dropped = self.dropped.get().wrapping_add(1);
                    self.dropped.set(dropped);
                    defmt::warn!("USB: command queue full, {} dropped so far", dropped);
                }
            }
        });
    }
}
