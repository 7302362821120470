// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Volume payloads: a run of asset groups, each a header followed by its
//! data, starting on [`ASSET_GROUP_SIZE_UNIT`] boundaries.

use anyhow::{bail, Result};
use tilestream_common::abi::{group_crc_from_crc32, ASSET_GROUP_SIZE_UNIT};
use tilestream_common::memory::SEGMENT_SIZE;
use tilestream_common::AssetGroupHeader;

use crate::CRC32;

/// Erased-flash filler between groups.
const PAD: u8 = 0xFF;
const HEADER_SIZE: usize = AssetGroupHeader::SIZE;

/// One group to be packed.
#[derive(Debug, Clone)]
pub struct GroupSpec {
    pub data: Vec<u8>,
    pub num_tiles: u16,
    pub ordinal: u16,
}

/// Where a group landed inside a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedGroup {
    pub header_offset: u32,
    pub header: AssetGroupHeader,
}

impl PackedGroup {
    pub fn data_offset(&self) -> u32 {
        self.header_offset + HEADER_SIZE as u32
    }

    pub fn data<'a>(&self, payload: &'a [u8]) -> &'a [u8] {
        let start = self.data_offset() as usize;
        &payload[start..start + self.header.data_size as usize]
    }
}

/// A packed payload and its table of contents.
#[derive(Debug, Clone)]
pub struct Pack {
    pub payload: Vec<u8>,
    pub groups: Vec<PackedGroup>,
}

fn align_up(value: usize) -> usize {
    value.next_multiple_of(ASSET_GROUP_SIZE_UNIT as usize)
}

/// Lay `specs` out back to back and stamp each header with its data CRC.
pub fn pack_groups(specs: &[GroupSpec]) -> Result<Pack> {
    let mut payload = Vec::new();
    let mut groups = Vec::with_capacity(specs.len());

    for spec in specs {
        let header_offset = align_up(payload.len());
        payload.resize(header_offset, PAD);

        let header = AssetGroupHeader {
            data_size: u32::try_from(spec.data.len())?,
            num_tiles: spec.num_tiles,
            ordinal: spec.ordinal,
            crc: group_crc_from_crc32(CRC32.checksum(&spec.data)),
        };
        payload.extend_from_slice(&header.to_bytes());
        payload.extend_from_slice(&spec.data);

        groups.push(PackedGroup {
            header_offset: header_offset as u32,
            header,
        });
    }

    if payload.len() > SEGMENT_SIZE as usize {
        bail!(
            "payload is {} bytes, a volume holds at most {}",
            payload.len(),
            SEGMENT_SIZE
        );
    }

    Ok(Pack { payload, groups })
}

/// A group found while walking a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InspectedGroup {
    pub group: PackedGroup,
    pub crc_ok: bool,
}

/// Walk the groups of a payload until the data ends or erased flash begins.
pub fn inspect(payload: &[u8]) -> Result<Vec<InspectedGroup>> {
    let mut found = Vec::new();
    let mut offset = 0usize;

    while offset + HEADER_SIZE <= payload.len() {
        let raw: &[u8; HEADER_SIZE] = payload[offset..offset + HEADER_SIZE].try_into()?;
        if raw.iter().all(|&b| b == PAD) {
            break;
        }

        let header = AssetGroupHeader::from_bytes(raw);
        let start = offset + HEADER_SIZE;
        let Some(end) = start
            .checked_add(header.data_size as usize)
            .filter(|&end| end <= payload.len())
        else {
            bail!(
                "group at 0x{:x} claims {} bytes, payload ends at 0x{:x}",
                offset,
                header.data_size,
                payload.len()
            );
        };

        found.push(InspectedGroup {
            group: PackedGroup {
                header_offset: offset as u32,
                header,
            },
            crc_ok: CRC32.checksum(&payload[start..end]) == header.data_crc32(),
        });
        offset = align_up(end);
    }

    Ok(found)
}
