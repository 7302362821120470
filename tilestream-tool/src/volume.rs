// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Flash image of the volume region: one directory sector, then payloads on
//! sector boundaries.

use anyhow::{bail, Result};
use tilestream_common::abi::{VolumeRecord, MAX_VOLUMES, VOLUME_RECORD_MAGIC};
use tilestream_common::memory::SEGMENT_SIZE;
use tilestream_common::protocol::{
    FLASH_BASE, FLASH_SECTOR_SIZE, VOLUME_DIR_ADDR, VOLUME_REGION_SIZE,
};

use crate::CRC32;

const ERASED: u8 = 0xFF;

/// A volume region image meant to be flashed at [`VolumeImage::base`].
#[derive(Debug, Clone)]
pub struct VolumeImage {
    pub base: u32,
    pub bytes: Vec<u8>,
    pub records: Vec<VolumeRecord>,
}

/// Build the region for `(handle, payload)` pairs, in directory order.
pub fn build(volumes: &[(u32, Vec<u8>)]) -> Result<VolumeImage> {
    if volumes.len() > MAX_VOLUMES {
        bail!("{} volumes given, the directory holds {}", volumes.len(), MAX_VOLUMES);
    }

    let sector = FLASH_SECTOR_SIZE as usize;
    let mut bytes = vec![ERASED; sector];
    let mut records = Vec::with_capacity(volumes.len());

    for (index, (handle, payload)) in volumes.iter().enumerate() {
        if *handle == 0 {
            bail!("volume {}: handle 0 is reserved", index);
        }
        if volumes[..index].iter().any(|(h, _)| h == handle) {
            bail!("volume {}: duplicate handle {}", index, handle);
        }
        if payload.len() > SEGMENT_SIZE as usize {
            bail!("volume {}: {} bytes exceed a segment", handle, payload.len());
        }

        let start = bytes.len();
        bytes.extend_from_slice(payload);
        bytes.resize(bytes.len().next_multiple_of(sector), ERASED);

        let record = VolumeRecord {
            magic: VOLUME_RECORD_MAGIC,
            handle: *handle,
            payload_offset: VOLUME_DIR_ADDR - FLASH_BASE + start as u32,
            payload_size: payload.len() as u32,
            payload_crc: CRC32.checksum(payload),
        };
        let at = index * VolumeRecord::SIZE;
        bytes[at..at + VolumeRecord::SIZE].copy_from_slice(&record.to_bytes());
        records.push(record);
    }

    if bytes.len() > VOLUME_REGION_SIZE as usize {
        bail!(
            "volume region needs {} bytes, only {} available",
            bytes.len(),
            VOLUME_REGION_SIZE
        );
    }

    Ok(VolumeImage {
        base: VOLUME_DIR_ADDR,
        bytes,
        records,
    })
}

/// Used directory records of an image produced by [`build`].
pub fn read_directory(image: &[u8]) -> Vec<VolumeRecord> {
    image
        .chunks_exact(VolumeRecord::SIZE)
        .take(MAX_VOLUMES)
        .filter_map(|raw| <&[u8; VolumeRecord::SIZE]>::try_from(raw).ok())
        .map(VolumeRecord::from_bytes)
        .filter(VolumeRecord::is_used)
        .collect()
}

/// Payload of `record` inside `image`, if it lies within it.
pub fn payload<'a>(image: &'a [u8], record: &VolumeRecord) -> Option<&'a [u8]> {
    let start = FLASH_BASE
        .checked_add(record.payload_offset)?
        .checked_sub(VOLUME_DIR_ADDR)? as usize;
    image.get(start..start.checked_add(record.payload_size as usize)?)
}
