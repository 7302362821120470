// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! The asset path as hosted by this firmware: user RAM window, mounted
//! volumes, per-cube FIFOs and the loader that fills them.

use crate::flash::MountedVolume;
use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};
use tilestream_common::fifo::{CubeConsumers, CubeProducers};
use tilestream_common::memory::{Segment, VirtAddr, RAM_SIZE};
use tilestream_common::validate::BoundSlots;
use tilestream_common::{AssetLoader, CubeFifos, CubeId, Fault, LoadEvent, SliceBus};

/// Wrapper to hold engine storage in a static without `static mut`.
///
/// SAFETY: Handed out exactly once, guarded by `TAKEN`, from the
/// single-threaded main loop.
struct SyncStorage<T>(UnsafeCell<T>);
unsafe impl<T> Sync for SyncStorage<T> {}

static USER_RAM: SyncStorage<[u8; RAM_SIZE as usize]> =
    SyncStorage(UnsafeCell::new([0; RAM_SIZE as usize]));
static CUBE_FIFOS: SyncStorage<CubeFifos> = SyncStorage(UnsafeCell::new(CubeFifos::new()));
static TAKEN: AtomicBool = AtomicBool::new(false);

pub struct AssetEngine {
    pub bus: SliceBus<'static>,
    pub loader: AssetLoader,
    pub producers: CubeProducers<'static>,
    pub consumers: CubeConsumers<'static>,
    pub bound_slots: BoundSlots,
}

impl AssetEngine {
    /// Build the engine over the static storage. Returns `None` on a second call.
    pub fn new(volumes: &[MountedVolume]) -> Option<Self> {
        // No CAS on thumbv6m; only ever called from main before the loop starts
        if TAKEN.load(Ordering::Acquire) {
            return None;
        }
        TAKEN.store(true, Ordering::Release);

        // SAFETY: `TAKEN` guarantees these are the only references
        let (ram, fifos) = unsafe { (&mut *USER_RAM.0.get(), &mut *CUBE_FIFOS.0.get()) };

        let mut bus = SliceBus::new(ram);
        for volume in volumes {
            if bus.add_volume(volume.handle, volume.payload()).is_none() {
                defmt::warn!("ENGINE: volume {} rejected", volume.handle);
            }
        }

        let mut handles = volumes.iter().map(|v| v.handle);
        for segment in [Segment::Zero, Segment::One] {
            if let Some(handle) = handles.next() {
                if bus.map_segment(segment, handle) {
                    defmt::println!("ENGINE: volume {} mapped at segment {}", handle, segment.index());
                }
            }
        }

        let (producers, consumers) = fifos.split();

        Some(Self {
            bus,
            loader: AssetLoader::new(),
            producers,
            consumers,
            bound_slots: BoundSlots::ALL,
        })
    }

    /// Run one loader step, handing every event to `emit`.
    pub fn pump(&mut self, emit: impl FnMut(LoadEvent)) {
        self.loader.pump(&mut self.bus, &mut self.producers, emit);
    }

    /// Cancel jobs and drop whatever they already queued.
    pub fn cancel(&mut self, cube_mask: u32) -> u32 {
        let cancelled = self.loader.cancel(cube_mask);
        for cube in CubeId::iter_mask(cancelled) {
            if let Some(mut consumer) = self.consumers.get(cube) {
                consumer.clear();
            }
        }
        cancelled
    }

    /// Stream one trusted group to `cube`, dropping any load it was running.
    pub fn start_group(&mut self, cube: CubeId, group_va: VirtAddr) -> Result<(), Fault> {
        self.loader.start_group(&self.bus, cube, group_va)?;
        if let Some(mut consumer) = self.consumers.get(cube) {
            consumer.clear();
        }
        Ok(())
    }

    /// Abort the sandboxed unit after a fault on the trusted path.
    pub fn abort(&mut self, fault: Fault) -> u32 {
        let cancelled = self.cancel(u32::MAX);
        defmt::error!(
            "ENGINE: unit aborted on {:?}, cancelled cubes 0x{:08x}",
            fault,
            cancelled
        );
        cancelled
    }
}
