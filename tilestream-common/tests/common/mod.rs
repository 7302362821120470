// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use crc::{Crc, CRC_32_ISO_HDLC};
use tilestream_common::abi::{group_crc_from_crc32, AssetConfiguration, AssetGroup};
use tilestream_common::memory::{RAM_BASE, RAM_SIZE};
use tilestream_common::AssetGroupHeader;

pub const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Where tests put their configuration table.
pub const CONFIG_VA: u32 = RAM_BASE;
/// Where tests put their first group descriptor.
pub const GROUP_VA: u32 = RAM_BASE + 0x400;

pub fn user_ram() -> Vec<u8> {
    vec![0u8; RAM_SIZE as usize]
}

/// Deterministic, non-repeating-looking test data.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed) ^ (i >> 8) as u8)
        .collect()
}

/// Header plus data, as the packaging tool lays a group out in a volume.
pub fn group_image(ordinal: u16, num_tiles: u16, data: &[u8]) -> Vec<u8> {
    let header = AssetGroupHeader {
        data_size: data.len() as u32,
        num_tiles,
        ordinal,
        crc: group_crc_from_crc32(CRC32.checksum(data)),
    };
    let mut out = header.to_bytes().to_vec();
    out.extend_from_slice(data);
    out
}

/// Place `image` at `offset` inside `payload`, growing it as needed.
pub fn place(payload: &mut Vec<u8>, offset: usize, image: &[u8]) {
    if payload.len() < offset + image.len() {
        payload.resize(offset + image.len(), 0xFF);
    }
    payload[offset..offset + image.len()].copy_from_slice(image);
}

/// Offset of `va` inside the user RAM buffer.
pub fn ram_offset(va: u32) -> usize {
    (va - RAM_BASE) as usize
}

pub fn put_descriptor(ram: &mut [u8], group_va: u32, header_va: u32) {
    let at = ram_offset(group_va);
    ram[at..at + AssetGroup::SIZE].copy_from_slice(&AssetGroup { p_hdr: header_va }.to_bytes());
}

pub fn put_config(ram: &mut [u8], config_va: u32, entries: &[AssetConfiguration]) {
    let mut at = ram_offset(config_va);
    for entry in entries {
        ram[at..at + AssetConfiguration::SIZE].copy_from_slice(&entry.to_bytes());
        at += AssetConfiguration::SIZE;
    }
}

pub fn entry(p_group: u32, volume: u32, data_size: u32, num_tiles: u16, slot: u8) -> AssetConfiguration {
    AssetConfiguration {
        p_group,
        volume,
        data_size,
        num_tiles,
        ordinal: 0,
        slot,
    }
}
