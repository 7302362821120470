// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Offline run of the streaming path over an in-memory bus.
//!
//! The same loader and FIFOs the firmware uses are driven step by step; after
//! every loader pass each selected cube's FIFO is drained by a fixed amount,
//! standing in for the radio.

use anyhow::{anyhow, bail, Context, Result};
use tilestream_common::abi::{ASSET_SLOTS_PER_BANK, NUM_CUBE_SLOTS};
use tilestream_common::group::loaded_base_addr;
use tilestream_common::memory::RAM_SIZE;
use tilestream_common::{
    validate_config, AssetLoader, BoundSlots, CubeFifos, CubeId, LoadEvent, SliceBus,
};

use crate::stage::{Addressing, Staged};

#[derive(Debug, Clone, Copy)]
pub struct SimOptions {
    pub cube_mask: u32,
    /// Bytes taken out of each FIFO per step.
    pub drain_per_step: usize,
    pub max_steps: usize,
    pub slots: BoundSlots,
}

#[derive(Debug, Clone)]
pub struct SimReport {
    pub steps: usize,
    /// Rounded tiles per slot, as counted by the validator.
    pub slot_tiles: [u16; ASSET_SLOTS_PER_BANK],
    pub events: Vec<LoadEvent>,
    /// Everything drained, indexed by cube.
    pub streams: Vec<Vec<u8>>,
    /// Base address records read back per staged descriptor, indexed by cube.
    pub base_addrs: Vec<[Option<u16>; NUM_CUBE_SLOTS]>,
}

impl SimReport {
    pub fn stream(&self, cube: CubeId) -> &[u8] {
        &self.streams[cube.index()]
    }

    pub fn all_verified(&self) -> bool {
        self.events.iter().all(|event| match event {
            LoadEvent::GroupLoaded { verified, .. } => *verified,
            LoadEvent::Finished { .. } => true,
            LoadEvent::Failed { .. } => false,
        })
    }
}

/// Stream `staged` out of a volume holding `payload` until every cube is done.
pub fn run(
    payload: &[u8],
    handle: u32,
    addressing: Addressing,
    staged: &Staged,
    opts: &SimOptions,
) -> Result<SimReport> {
    if opts.cube_mask == 0 {
        bail!("no cubes selected");
    }
    if opts.drain_per_step == 0 {
        bail!("a drain of 0 bytes per step never finishes");
    }

    let mut ram = vec![0u8; RAM_SIZE as usize];
    let mut bus = SliceBus::new(&mut ram);
    bus.add_volume(handle, payload)
        .with_context(|| format!("cannot add volume {}", handle))?;
    if let Addressing::Virtual(segment) = addressing {
        bus.map_segment(segment, handle);
    }
    bus.write_ram(staged.base_va, &staged.image)
        .map_err(|e| anyhow!("staging failed: {}", e))?;

    let usage = validate_config(&bus, opts.slots, staged.config)
        .map_err(|e| anyhow!("configuration rejected: {}", e))?;

    let mut fifos: CubeFifos = CubeFifos::new();
    let (mut producers, mut consumers) = fifos.split();
    let mut loader: AssetLoader = AssetLoader::new();
    loader
        .start_config(opts.cube_mask, staged.config, opts.slots)
        .map_err(|e| anyhow!("load refused: {}", e))?;

    let mut events = Vec::new();
    let mut streams = vec![Vec::new(); NUM_CUBE_SLOTS];
    let mut buf = vec![0u8; opts.drain_per_step];
    let mut steps = 0;

    while !loader.is_idle() || consumers.pending_mask() != 0 {
        if steps == opts.max_steps {
            bail!("still streaming after {} steps", steps);
        }
        steps += 1;

        loader.pump(&mut bus, &mut producers, |event| events.push(event));
        for cube in CubeId::iter_mask(opts.cube_mask) {
            if let Some(mut consumer) = consumers.get(cube) {
                let n = consumer.read(&mut buf);
                streams[cube.index()].extend_from_slice(&buf[..n]);
            }
        }
    }

    let base_addrs = staged
        .descriptors
        .iter()
        .map(|&va| {
            let mut per_cube = [None; NUM_CUBE_SLOTS];
            for cube in CubeId::iter_mask(opts.cube_mask) {
                per_cube[cube.index()] = loaded_base_addr(&bus, va, cube);
            }
            per_cube
        })
        .collect();

    Ok(SimReport {
        steps,
        slot_tiles: usage.tiles,
        events,
        streams,
        base_addrs,
    })
}
