// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Streams FIFO contents to the host as `AssetData` frames.
//!
//! Without a configured host nothing is read, so full FIFOs hold the
//! loader back instead of losing data. Bytes leave a FIFO only once their
//! frame has been written.

use crate::{peripherals::Peripherals, services::usb, usb_transport::TransportError};
use heapless::Vec;
use tilestream_common::protocol::{Response, ASSET_FRAME_SIZE};
use tilestream_common::service::{Service, ServiceContext};
use tilestream_common::CubeId;

pub struct FifoDrainService;

impl FifoDrainService {
    pub fn new() -> Self {
        Self
    }
}

impl Service<Peripherals> for FifoDrainService {
    fn process(&self, ctx: &mut ServiceContext<Peripherals>) {
        let consumers = &mut ctx.peripherals.engine.consumers;
        let pending = consumers.pending_mask();
        if pending == 0 {
            return;
        }

        usb::with_configured_transport(|transport| {
            for cube in CubeId::iter_mask(pending) {
                let Some(mut consumer) = consumers.get(cube) else {
                    continue;
                };
                let sent = consumer.transmit(ASSET_FRAME_SIZE, |run| {
                    let data = Vec::from_slice(run).map_err(|_| TransportError::Encode)?;
                    transport.send(&Response::AssetData {
                        cube: cube.raw(),
                        data,
                    })
                });
                if let Err(e) = sent {
                    defmt::warn!("Drain: cube {} frame not sent, will retry: {:?}", cube.raw(), e);
                }
            }
        });
    }
}
