// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Advances every running load by one step per pass.

use crate::peripherals::Peripherals;
use tilestream_common::service::{Event, Service, ServiceContext};
use tilestream_common::LoadEvent;

pub struct LoaderService;

impl LoaderService {
    pub fn new() -> Self {
        Self
    }
}

impl Service<Peripherals> for LoaderService {
    fn process(&self, ctx: &mut ServiceContext<Peripherals>) {
        let events = ctx.events;
        ctx.peripherals.engine.pump(|event| {
            match event {
                LoadEvent::GroupLoaded {
                    cube,
                    ordinal,
                    verified: false,
                    ..
                } => defmt::warn!("Loader: cube {} group {} failed CRC", cube, ordinal),
                LoadEvent::Failed { cube, error } => {
                    defmt::warn!("Loader: cube {} failed: {:?}", cube, error)
                }
                _ => defmt::trace!("Loader: {:?}", event),
            }
            events.publish(Event::Load(event));
        });
    }
}
