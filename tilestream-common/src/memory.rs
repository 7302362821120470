// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Sandbox address space and the collaborator seams the asset path reads through.
//!
//! Layout of the virtual address space seen by user applications:
//!
//! | VA range                      | contents                          |
//! |-------------------------------|-----------------------------------|
//! | `RAM_BASE .. +RAM_SIZE`       | user RAM                          |
//! | `SEGMENT_0_VA .. +SEGMENT_SIZE` | payload of the executing volume |
//! | `SEGMENT_1_VA .. +SEGMENT_SIZE` | payload of a secondary volume   |

use crate::error::BusError;
use core::num::NonZeroU32;

pub type VirtAddr = u32;

pub const RAM_BASE: VirtAddr = 0x0001_0000;
pub const RAM_SIZE: u32 = 0x8000;
pub const SEGMENT_0_VA: VirtAddr = 0x8000_0000;
pub const SEGMENT_1_VA: VirtAddr = 0xC000_0000;
/// Span of one flash segment; also the largest volume payload that can be addressed.
pub const SEGMENT_SIZE: u32 = 0x0100_0000;

pub const fn is_aligned(va: VirtAddr, align: u32) -> bool {
    va & (align - 1) == 0
}

/// A flash volume whose handle has been checked by a [`VolumeStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Volume(NonZeroU32);

impl Volume {
    /// Wrap a raw handle. Only volume stores should call this; everybody else
    /// gets a `Volume` back from [`VolumeStore::volume`].
    pub const fn from_handle(handle: u32) -> Option<Self> {
        match NonZeroU32::new(handle) {
            Some(h) => Some(Self(h)),
            None => None,
        }
    }

    pub const fn handle(self) -> u32 {
        self.0.get()
    }
}

/// Flash segment a virtual address falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Segment {
    Zero,
    One,
}

impl Segment {
    pub const fn base(self) -> VirtAddr {
        match self {
            Self::Zero => SEGMENT_0_VA,
            Self::One => SEGMENT_1_VA,
        }
    }

    pub const fn index(self) -> usize {
        match self {
            Self::Zero => 0,
            Self::One => 1,
        }
    }
}

/// Where a virtual range lives, with the offset into that region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Region {
    Ram { offset: u32 },
    Flash { segment: Segment, offset: u32 },
}

fn within(va: VirtAddr, len: u32, base: VirtAddr, size: u32) -> Option<Result<u32, BusError>> {
    let offset = va.checked_sub(base)?;
    if offset >= size {
        return None;
    }
    Some(match offset.checked_add(len) {
        Some(end) if end <= size => Ok(offset),
        _ => Err(BusError::OutOfBounds),
    })
}

/// Classify `len` bytes at `va`. The whole range must sit inside one region.
pub fn decode(va: VirtAddr, len: u32) -> Result<Region, BusError> {
    if let Some(r) = within(va, len, RAM_BASE, RAM_SIZE) {
        return r.map(|offset| Region::Ram { offset });
    }
    for segment in [Segment::Zero, Segment::One] {
        if let Some(r) = within(va, len, segment.base(), SEGMENT_SIZE) {
            return r.map(|offset| Region::Flash { segment, offset });
        }
    }
    Err(BusError::Unmapped)
}

/// Virtual-to-physical translation for the sandbox.
///
/// Implementations must reject any range that is not wholly mapped; they must
/// never fault the firmware itself.
pub trait Translator {
    /// Borrow `len` bytes of user RAM starting at `va`.
    fn map_ram(&self, va: VirtAddr, len: usize) -> Result<&[u8], BusError>;

    /// Mutable variant of [`Translator::map_ram`].
    fn map_ram_mut(&mut self, va: VirtAddr, len: usize) -> Result<&mut [u8], BusError>;

    /// Copy `dest.len()` bytes of read-only data (RAM or mapped flash) from `va`.
    fn copy_ro_data(&self, dest: &mut [u8], va: VirtAddr) -> Result<(), BusError>;
}

/// Flash volume lookups.
pub trait VolumeStore {
    /// Return the volume named by `handle` if it is live and intact.
    fn volume(&self, handle: u32) -> Option<Volume>;

    /// Volume currently mapped at `va`, if any.
    fn volume_for_va(&self, va: VirtAddr) -> Option<Volume>;

    /// Bounded copy out of a volume's payload, bypassing the address space.
    fn copy_payload(&self, volume: Volume, offset: u32, dest: &mut [u8]) -> Result<(), BusError>;
}

/// Everything the asset path needs from the platform.
pub trait AssetBus: Translator + VolumeStore {}

impl<T: Translator + VolumeStore + ?Sized> AssetBus for T {}

/// Take a fixed-size snapshot of user RAM.
pub fn snapshot_ram<const N: usize, T: Translator + ?Sized>(
    bus: &T,
    va: VirtAddr,
) -> Result<[u8; N], BusError> {
    let mut out = [0u8; N];
    out.copy_from_slice(bus.map_ram(va, N)?);
    Ok(out)
}

/// Take a fixed-size snapshot of read-only data.
pub fn snapshot_ro<const N: usize, T: Translator + ?Sized>(
    bus: &T,
    va: VirtAddr,
) -> Result<[u8; N], BusError> {
    let mut out = [0u8; N];
    bus.copy_ro_data(&mut out, va)?;
    Ok(out)
}
