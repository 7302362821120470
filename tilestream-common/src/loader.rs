// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Per-cube asset load jobs.
//!
//! A job either walks a configuration table entry by entry, or streams a single
//! group handed over by a trusted caller. Each call to [`AssetLoader::pump`]
//! moves at most one FIFO's worth of data per cube; nothing here blocks.
//!
//! Configuration entries are re-read from user RAM when their turn comes and
//! resolved through [`AssetGroupInfo::from_configuration`], which re-checks
//! the volume handle. Whatever the validator saw earlier is not relied on.

use crate::abi::{
    round_tiles, CubeId, ASSET_GROUP_CRC_SIZE, ASSET_SLOTS_PER_BANK,
    NUM_CUBE_SLOTS, TILES_PER_ASSET_SLOT,
};
use crate::error::{AssetError, Fault};
use crate::fifo::CubeProducers;
use crate::group::{record_base_addr, AssetGroupInfo};
use crate::memory::{AssetBus, VirtAddr};
use crate::validate::{BoundSlots, ConfigTable};
use crc::{Crc, Digest, CRC_32_ISO_HDLC};
use serde::{Deserialize, Serialize};

static CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Something worth telling the host about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoadEvent {
    /// A group has been fully pushed into the cube's FIFO.
    GroupLoaded {
        cube: CubeId,
        ordinal: u16,
        base_addr: Option<u16>,
        verified: bool,
    },
    /// The cube's job has nothing left to load.
    Finished { cube: CubeId },
    /// The cube's job was dropped.
    Failed { cube: CubeId, error: AssetError },
}

/// Snapshot of a cube's current transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Progress {
    pub ordinal: u16,
    pub offset: u32,
    pub data_size: u32,
    pub paused: bool,
}

enum Source {
    Config {
        table: ConfigTable,
        slots: BoundSlots,
        next: u32,
        slot_tiles: [u32; ASSET_SLOTS_PER_BANK],
    },
    Single,
}

struct Stream {
    group: AssetGroupInfo,
    offset: u32,
    base_addr: Option<u16>,
    digest: Digest<'static, u32>,
}

impl Stream {
    fn new(group: AssetGroupInfo, base_addr: Option<u16>) -> Self {
        Self {
            group,
            offset: 0,
            base_addr,
            digest: CRC32.digest(),
        }
    }

    fn is_done(&self) -> bool {
        self.offset >= self.group.data_size
    }
}

struct Job {
    source: Source,
    current: Option<Stream>,
    paused: bool,
}

enum Next {
    Stream(Stream),
    Done,
}

impl Job {
    /// Resolve the next configuration entry, if any.
    fn next_stream<B: AssetBus + ?Sized>(&mut self, bus: &B) -> Result<Next, AssetError> {
        let Source::Config {
            table,
            slots,
            next,
            slot_tiles,
        } = &mut self.source
        else {
            return Ok(Next::Done);
        };

        if *next >= table.count {
            return Ok(Next::Done);
        }

        let entry = table.entry(bus, *next)?;
        *next += 1;

        let group = AssetGroupInfo::from_configuration(bus, &entry)?;

        // The entry may have been rewritten since validation
        let slot = entry.slot as usize;
        let Some(used) = slot_tiles.get_mut(slot).filter(|_| slots.is_bound(slot)) else {
            diag!("ASSET: Bad slot number {} at load time", slot);
            return Err(AssetError::BadSlot);
        };
        let tiles = round_tiles(u32::from(entry.num_tiles));
        if *used + tiles > TILES_PER_ASSET_SLOT {
            diag!("ASSET: Slot {} overflowed at load time", slot);
            return Err(AssetError::TooManyTiles);
        }

        let base = slot as u32 * TILES_PER_ASSET_SLOT + *used;
        *used += tiles;

        Ok(Next::Stream(Stream::new(group, u16::try_from(base).ok())))
    }
}

/// One optional job per cube.
pub struct AssetLoader<const CUBES: usize = NUM_CUBE_SLOTS> {
    jobs: [Option<Job>; CUBES],
}

impl<const CUBES: usize> AssetLoader<CUBES> {
    pub fn new() -> Self {
        Self {
            jobs: core::array::from_fn(|_| None),
        }
    }

    fn job_mut(&mut self, cube: CubeId) -> Option<&mut Job> {
        self.jobs.get_mut(cube.index())?.as_mut()
    }

    pub fn is_busy(&self, cube: CubeId) -> bool {
        matches!(self.jobs.get(cube.index()), Some(Some(_)))
    }

    pub fn is_idle(&self) -> bool {
        self.jobs.iter().all(Option::is_none)
    }

    pub fn active_mask(&self) -> u32 {
        self.mask_where(|_| true)
    }

    pub fn paused_mask(&self) -> u32 {
        self.mask_where(|job| job.paused)
    }

    fn mask_where(&self, pred: impl Fn(&Job) -> bool) -> u32 {
        self.jobs
            .iter()
            .enumerate()
            .filter(|(_, job)| job.as_ref().is_some_and(&pred))
            .fold(0, |mask, (i, _)| mask | (1u32 << i))
    }

    /// Start walking `table` on every cube in `cube_mask`.
    ///
    /// Refuses the whole request if any selected cube is out of range or busy.
    /// The table should already have passed [`crate::validate_config`] against
    /// the same `slots`; every entry is checked against them again as it loads.
    pub fn start_config(
        &mut self,
        cube_mask: u32,
        table: ConfigTable,
        slots: BoundSlots,
    ) -> Result<(), AssetError> {
        let cubes = CubeId::iter_mask(cube_mask).filter(|cube| cube.index() < CUBES);
        if cubes.clone().any(|cube| self.is_busy(cube)) {
            return Err(AssetError::Busy);
        }
        if cube_mask != 0 && cubes.clone().count() != cube_mask.count_ones() as usize {
            diag!("ASSET: Cube mask 0x{:08x} names unknown cubes", cube_mask);
            return Err(AssetError::BadCubeMask);
        }

        for cube in cubes {
            self.jobs[cube.index()] = Some(Job {
                source: Source::Config {
                    table,
                    slots,
                    next: 0,
                    slot_tiles: [0; ASSET_SLOTS_PER_BANK],
                },
                current: None,
                paused: false,
            });
        }
        Ok(())
    }

    /// Resolve a trusted group pointer and stream it to `cube`, replacing
    /// whatever that cube was doing.
    pub fn start_group<B: AssetBus + ?Sized>(
        &mut self,
        bus: &B,
        cube: CubeId,
        group_va: VirtAddr,
    ) -> Result<(), Fault> {
        let group = AssetGroupInfo::from_user_pointer(bus, group_va)?;
        let slot = self.jobs.get_mut(cube.index()).ok_or(Fault::InvalidParameter)?;
        *slot = Some(Job {
            source: Source::Single,
            current: Some(Stream::new(group, None)),
            paused: false,
        });
        Ok(())
    }

    pub fn pause(&mut self, cube: CubeId) -> bool {
        self.job_mut(cube).map(|job| job.paused = true).is_some()
    }

    pub fn resume(&mut self, cube: CubeId) -> bool {
        self.job_mut(cube).map(|job| job.paused = false).is_some()
    }

    /// Drop the jobs of every cube in `cube_mask`. Returns the mask actually cancelled.
    pub fn cancel(&mut self, cube_mask: u32) -> u32 {
        let mut cancelled = 0;
        for cube in CubeId::iter_mask(cube_mask) {
            if let Some(slot) = self.jobs.get_mut(cube.index()) {
                if slot.take().is_some() {
                    cancelled |= cube.bit();
                }
            }
        }
        cancelled
    }

    pub fn cancel_all(&mut self) -> u32 {
        self.cancel(u32::MAX)
    }

    pub fn progress(&self, cube: CubeId) -> Option<Progress> {
        let job = self.jobs.get(cube.index())?.as_ref()?;
        let stream = job.current.as_ref()?;
        Some(Progress {
            ordinal: stream.group.ordinal,
            offset: stream.offset,
            data_size: stream.group.data_size,
            paused: job.paused,
        })
    }

    /// Move data for every active, unpaused cube.
    pub fn pump<B: AssetBus + ?Sized, const N: usize>(
        &mut self,
        bus: &mut B,
        producers: &mut CubeProducers<'_, N, CUBES>,
        mut emit: impl FnMut(LoadEvent),
    ) {
        for index in 0..CUBES {
            let Some(cube) = CubeId::new(index as u8) else {
                break;
            };
            if let Err(error) = self.pump_cube(bus, producers, cube, &mut emit) {
                self.jobs[index] = None;
                emit(LoadEvent::Failed { cube, error });
            }
        }
    }

    fn pump_cube<B: AssetBus + ?Sized, const N: usize>(
        &mut self,
        bus: &mut B,
        producers: &mut CubeProducers<'_, N, CUBES>,
        cube: CubeId,
        emit: &mut impl FnMut(LoadEvent),
    ) -> Result<(), AssetError> {
        let slot = &mut self.jobs[cube.index()];
        let Some(job) = slot.as_mut() else {
            return Ok(());
        };
        if job.paused {
            return Ok(());
        }

        if job.current.is_none() {
            match job.next_stream(&*bus)? {
                Next::Stream(stream) => job.current = Some(stream),
                Next::Done => {
                    *slot = None;
                    emit(LoadEvent::Finished { cube });
                    return Ok(());
                }
            }
        }

        let Some(stream) = job.current.as_mut() else {
            return Ok(());
        };
        let Some(mut producer) = producers.get(cube) else {
            return Ok(());
        };

        let digest = &mut stream.digest;
        let moved =
            producer.fetch_from_group_with(&*bus, &stream.group, stream.offset, |bytes| {
                digest.update(bytes)
            })?;
        stream.offset += moved;

        if !stream.is_done() {
            return Ok(());
        }

        let Some(Stream {
            group,
            base_addr,
            digest,
            ..
        }) = job.current.take()
        else {
            return Ok(());
        };
        let verified = verify(&*bus, &group, digest.finalize());
        let base_addr = base_addr.filter(|&base| {
            record_base_addr(bus, group.va, cube, base)
                .inspect_err(|_| {
                    diag!("ASSET: Cannot record base address for group 0x{:08x}", group.va)
                })
                .is_ok()
        });

        emit(LoadEvent::GroupLoaded {
            cube,
            ordinal: group.ordinal,
            base_addr,
            verified,
        });

        if matches!(job.source, Source::Single) {
            *slot = None;
            emit(LoadEvent::Finished { cube });
        }
        Ok(())
    }
}

impl<const CUBES: usize> Default for AssetLoader<CUBES> {
    fn default() -> Self {
        Self::new()
    }
}

/// Compare the streamed bytes against the checksum recorded in the header.
fn verify<B: AssetBus + ?Sized>(bus: &B, group: &AssetGroupInfo, actual: u32) -> bool {
    let mut recorded = [0u8; ASSET_GROUP_CRC_SIZE];
    if group.copy_crc(bus, &mut recorded).is_err() {
        diag!("ASSET: Cannot read checksum of group 0x{:08x}", group.va);
        return false;
    }
    let expected = u32::from_le_bytes([recorded[0], recorded[1], recorded[2], recorded[3]]);
    if actual != expected {
        diag!(
            "ASSET: Group {} checksum mismatch: expected 0x{:08x}, got 0x{:08x}",
            group.ordinal,
            expected,
            actual
        );
    }
    actual == expected
}
