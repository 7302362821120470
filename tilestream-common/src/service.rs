// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Cooperative services and the event bus between them.
//!
//! The main loop calls every [`Service`] in turn. Services never block and
//! keep their own state in `Cell`s; whatever one of them needs to tell
//! another is published on the [`EventBus`] and removed by whoever consumes it.

use crate::error::Fault;
use crate::loader::LoadEvent;
use core::cell::{Cell, RefCell};
use heapless::Vec;

/// Events that can be sent between services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// Bring up the host link
    RequestLink,
    /// Progress reported by the asset loader
    Load(LoadEvent),
    /// A trusted request faulted and the sandboxed unit was aborted
    UnitAborted(Fault),
}

/// Events held between two passes of the consuming service.
pub const EVENT_CAPACITY: usize = 32;

pub struct EventBus {
    events: RefCell<Vec<Event, EVENT_CAPACITY>>,
    dropped: Cell<u32>,
}

impl EventBus {
    pub const fn new() -> Self {
        Self {
            events: RefCell::new(Vec::new()),
            dropped: Cell::new(0),
        }
    }

    /// Queue `event`; it is dropped if the bus is full.
    pub fn publish(&self, event: Event) {
        if self.events.borrow_mut().push(event).is_err() {
            let dropped = self.dropped.get().wrapping_add(1);
            self.dropped.set(dropped);
            diag!("Event bus full, dropping event ({} so far): {:?}", dropped, event);
        }
    }

    /// Remove every event matching `filter`. Returns how many were removed.
    pub fn consume(&self, mut filter: impl FnMut(&Event) -> bool) -> usize {
        let mut events = self.events.borrow_mut();
        let before = events.len();
        events.retain(|e| !filter(e));
        before - events.len()
    }

    /// Remove every event `select` picks out and pass its payload to
    /// `handle`, oldest first. `handle` must not publish.
    pub fn take<T>(&self, mut select: impl FnMut(&Event) -> Option<T>, mut handle: impl FnMut(T)) {
        self.events.borrow_mut().retain(|e| match select(e) {
            Some(picked) => {
                handle(picked);
                false
            }
            None => true,
        });
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    /// Events lost to a full bus since startup.
    pub fn dropped(&self) -> u32 {
        self.dropped.get()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared context passed to all services
pub struct ServiceContext<'a, P> {
    pub peripherals: &'a mut P,
    pub events: &'a EventBus,
}

/// Trait for services that run in the main loop
pub trait Service<P> {
    /// Do one bounded slice of work. State changes go through interior mutability.
    fn process(&self, ctx: &mut ServiceContext<P>);
}
