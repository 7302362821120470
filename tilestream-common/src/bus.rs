// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! An [`AssetBus`](crate::AssetBus) over plain byte slices.
//!
//! User RAM is one mutable slice addressed from [`RAM_BASE`](crate::memory::RAM_BASE); every volume
//! payload is a read-only slice. The firmware builds one over its RAM window
//! and memory-mapped flash, the host tool and the tests over `Vec`s.

use crate::abi::MAX_VOLUMES;
use crate::error::BusError;
use crate::memory::{decode, Region, Segment, Translator, VirtAddr, Volume, VolumeStore, SEGMENT_SIZE};
use heapless::Vec;

struct Entry<'a> {
    volume: Volume,
    payload: &'a [u8],
    valid: bool,
}

pub struct SliceBus<'a> {
    ram: &'a mut [u8],
    volumes: Vec<Entry<'a>, MAX_VOLUMES>,
    segments: [Option<Volume>; 2],
}

fn span(offset: u32, len: usize, size: usize) -> Result<core::ops::Range<usize>, BusError> {
    let start = offset as usize;
    let end = start.checked_add(len).ok_or(BusError::OutOfBounds)?;
    if end > size {
        return Err(BusError::OutOfBounds);
    }
    Ok(start..end)
}

fn region(va: VirtAddr, len: usize) -> Result<Region, BusError> {
    let len = u32::try_from(len).map_err(|_| BusError::OutOfBounds)?;
    decode(va, len)
}

impl<'a> SliceBus<'a> {
    /// `ram` backs the user RAM window; it may be shorter than the window.
    pub fn new(ram: &'a mut [u8]) -> Self {
        Self {
            ram,
            volumes: Vec::new(),
            segments: [None, None],
        }
    }

    /// Register a volume. Fails on a zero or duplicate handle, an oversized
    /// payload, or a full directory.
    pub fn add_volume(&mut self, handle: u32, payload: &'a [u8]) -> Option<Volume> {
        let volume = Volume::from_handle(handle)?;
        if payload.len() > SEGMENT_SIZE as usize || self.entry(volume).is_some() {
            return None;
        }
        self.volumes
            .push(Entry {
                volume,
                payload,
                valid: true,
            })
            .ok()?;
        Some(volume)
    }

    /// Map a registered volume at `segment`. Returns `false` for unknown handles.
    pub fn map_segment(&mut self, segment: Segment, handle: u32) -> bool {
        let Some(volume) = Volume::from_handle(handle).filter(|v| self.entry(*v).is_some()) else {
            return false;
        };
        self.segments[segment.index()] = Some(volume);
        true
    }

    pub fn unmap_segment(&mut self, segment: Segment) {
        self.segments[segment.index()] = None;
    }

    /// Mark a volume as no longer live. Its handle stops resolving, its
    /// segment mapping stops being owned, and payload copies fail.
    pub fn invalidate(&mut self, handle: u32) {
        for entry in self.volumes.iter_mut().filter(|e| e.volume.handle() == handle) {
            entry.valid = false;
        }
    }

    /// Handles of every live volume.
    pub fn handles(&self) -> impl Iterator<Item = u32> + '_ {
        self.volumes
            .iter()
            .filter(|e| e.valid)
            .map(|e| e.volume.handle())
    }

    pub fn ram(&self) -> &[u8] {
        &*self.ram
    }

    pub fn ram_mut(&mut self) -> &mut [u8] {
        &mut *self.ram
    }

    /// Copy `data` into user RAM at `va`.
    pub fn write_ram(&mut self, va: VirtAddr, data: &[u8]) -> Result<(), BusError> {
        self.map_ram_mut(va, data.len())?.copy_from_slice(data);
        Ok(())
    }

    fn entry(&self, volume: Volume) -> Option<&Entry<'a>> {
        self.volumes.iter().find(|e| e.volume == volume)
    }

    fn live(&self, volume: Volume) -> Option<&Entry<'a>> {
        self.entry(volume).filter(|e| e.valid)
    }

    fn ram_range(&self, va: VirtAddr, len: usize) -> Result<core::ops::Range<usize>, BusError> {
        match region(va, len)? {
            Region::Ram { offset } => span(offset, len, self.ram.len()),
            Region::Flash { .. } => Err(BusError::Unmapped),
        }
    }
}

impl Translator for SliceBus<'_> {
    fn map_ram(&self, va: VirtAddr, len: usize) -> Result<&[u8], BusError> {
        let range = self.ram_range(va, len)?;
        Ok(&self.ram[range])
    }

    fn map_ram_mut(&mut self, va: VirtAddr, len: usize) -> Result<&mut [u8], BusError> {
        let range = self.ram_range(va, len)?;
        Ok(&mut self.ram[range])
    }

    fn copy_ro_data(&self, dest: &mut [u8], va: VirtAddr) -> Result<(), BusError> {
        let src = match region(va, dest.len())? {
            Region::Ram { offset } => &self.ram[span(offset, dest.len(), self.ram.len())?],
            Region::Flash { segment, offset } => {
                let volume = self.segments[segment.index()].ok_or(BusError::Unmapped)?;
                let entry = self.live(volume).ok_or(BusError::Unmapped)?;
                &entry.payload[span(offset, dest.len(), entry.payload.len())?]
            }
        };
        dest.copy_from_slice(src);
        Ok(())
    }
}

impl VolumeStore for SliceBus<'_> {
    fn volume(&self, handle: u32) -> Option<Volume> {
        let volume = Volume::from_handle(handle)?;
        self.live(volume).map(|e| e.volume)
    }

    fn volume_for_va(&self, va: VirtAddr) -> Option<Volume> {
        match decode(va, 1).ok()? {
            Region::Flash { segment, .. } => {
                let volume = self.segments[segment.index()]?;
                self.live(volume).map(|e| e.volume)
            }
            Region::Ram { .. } => None,
        }
    }

    fn copy_payload(&self, volume: Volume, offset: u32, dest: &mut [u8]) -> Result<(), BusError> {
        let entry = self.live(volume).ok_or(BusError::Unmapped)?;
        dest.copy_from_slice(&entry.payload[span(offset, dest.len(), entry.payload.len())?]);
        Ok(())
    }
}
