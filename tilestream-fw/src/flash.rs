// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Read-only access to the flash volume directory.
//!
//! Volumes are written from the host as UF2 images; the firmware never
//! programs flash. At boot the directory sector is scanned once and every
//! record whose payload lies inside the volume area and matches its CRC is
//! mounted.

use crate::layout::MemoryLayout;
use crc::{Crc, CRC_32_ISO_HDLC};
use heapless::Vec;
use tilestream_common::abi::{VolumeRecord, MAX_VOLUMES};
use tilestream_common::protocol::FLASH_BASE;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// A volume whose payload has been checked, addressed through XIP.
#[derive(Clone, Copy, defmt::Format)]
pub struct MountedVolume {
    pub handle: u32,
    pub addr: u32,
    pub size: u32,
}

impl MountedVolume {
    /// The payload as a slice of memory-mapped flash.
    pub fn payload(&self) -> &'static [u8] {
        // SAFETY: `mount_volumes` only yields ranges inside the volume area,
        // which is XIP-mapped for the whole run and never programmed.
        unsafe { core::slice::from_raw_parts(self.addr as *const u8, self.size as usize) }
    }
}

/// Read bytes from an absolute XIP flash address via volatile reads.
pub fn flash_read(abs_addr: u32, buf: &mut [u8]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte = unsafe { ((abs_addr + i as u32) as *const u8).read_volatile() };
    }
}

/// Compute CRC-32 (ISO HDLC) over flash data at the given absolute address.
pub fn compute_crc32(abs_addr: u32, size: u32) -> u32 {
    let mut digest = CRC32.digest();
    let mut remaining = size as usize;
    let mut addr = abs_addr;
    let mut chunk = [0u8; 256];

    while remaining > 0 {
        let n = remaining.min(chunk.len());
        flash_read(addr, &mut chunk[..n]);
        digest.update(&chunk[..n]);
        addr += n as u32;
        remaining -= n;
    }

    digest.finalize()
}

fn read_record(addr: u32) -> VolumeRecord {
    let mut bytes = [0u8; VolumeRecord::SIZE];
    flash_read(addr, &mut bytes);
    VolumeRecord::from_bytes(&bytes)
}

/// Check one directory record against the volume area.
fn check_record(record: &VolumeRecord, layout: &MemoryLayout) -> Option<MountedVolume> {
    let addr = FLASH_BASE.checked_add(record.payload_offset)?;
    let end = addr.checked_add(record.payload_size)?;
    if addr < layout.volume_area || end > layout.volume_area_end {
        defmt::warn!(
            "VOLUME: handle {} payload 0x{:08x}..0x{:08x} outside volume area",
            record.handle,
            addr,
            end
        );
        return None;
    }

    let crc = compute_crc32(addr, record.payload_size);
    if crc != record.payload_crc {
        defmt::warn!(
            "VOLUME: handle {} CRC mismatch: expected 0x{:08x}, got 0x{:08x}",
            record.handle,
            record.payload_crc,
            crc
        );
        return None;
    }

    Some(MountedVolume {
        handle: record.handle,
        addr,
        size: record.payload_size,
    })
}

/// Scan the directory and return every intact volume, in directory order.
pub fn mount_volumes(layout: &MemoryLayout) -> Vec<MountedVolume, MAX_VOLUMES> {
    let mut mounted = Vec::new();

    for index in 0..MAX_VOLUMES as u32 {
        let record = read_record(layout.volume_dir + index * VolumeRecord::SIZE as u32);
        if !record.is_used() {
            continue;
        }

        if mounted.iter().any(|v: &MountedVolume| v.handle == record.handle) {
            defmt::warn!("VOLUME: duplicate handle {} ignored", record.handle);
            continue;
        }

        if let Some(volume) = check_record(&record, layout) {
            defmt::println!(
                "VOLUME: mounted handle {} at 0x{:08x} ({} bytes)",
                volume.handle,
                volume.addr,
                volume.size
            );
            // Cannot overflow: at most MAX_VOLUMES records are scanned
            let _ = mounted.push(volume);
        }
    }

    mounted
}
