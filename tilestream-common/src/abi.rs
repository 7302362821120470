// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Binary layouts shared between user applications, the firmware and the
//! asset packaging tool.
//!
//! Every structure here is little-endian and decoded field by field from a
//! byte snapshot. Field offsets are a wire contract with the packaging tool.

use serde::{Deserialize, Serialize};

/// Asset slots available to one application.
pub const ASSET_SLOTS_PER_BANK: usize = 4;
/// Groups that may share one asset slot.
pub const ASSET_GROUPS_PER_SLOT: usize = 24;
/// Tile capacity of a single asset slot.
pub const TILES_PER_ASSET_SLOT: u32 = 4096;
/// Tile allocation granule within a slot.
pub const ASSET_GROUP_SIZE_UNIT: u32 = 16;
/// Size of the checksum recorded in every group header.
pub const ASSET_GROUP_CRC_SIZE: usize = 16;
/// Number of cubes the firmware can address.
pub const NUM_CUBE_SLOTS: usize = 24;
/// Default per-cube streaming buffer size.
pub const ASSET_FIFO_SIZE: usize = 64;

/// Largest configuration the validator will even look at.
pub const MAX_CONFIG_ENTRIES: usize = ASSET_GROUPS_PER_SLOT * ASSET_SLOTS_PER_BANK;

/// Round a tile count up to the allocation granule.
pub const fn round_tiles(num_tiles: u32) -> u32 {
    num_tiles.div_ceil(ASSET_GROUP_SIZE_UNIT) * ASSET_GROUP_SIZE_UNIT
}

/// Index of a cube slot, always below [`NUM_CUBE_SLOTS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CubeId(u8);

impl CubeId {
    pub const fn new(id: u8) -> Option<Self> {
        if (id as usize) < NUM_CUBE_SLOTS {
            Some(Self(id))
        } else {
            None
        }
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn raw(self) -> u8 {
        self.0
    }

    pub const fn bit(self) -> u32 {
        1 << self.0
    }

    /// Iterate over the cubes selected by a bitmask, lowest first.
    pub fn iter_mask(mask: u32) -> impl Iterator<Item = CubeId> + Clone {
        (0..NUM_CUBE_SLOTS as u8)
            .filter(move |id| mask & (1u32 << *id) != 0)
            .map(CubeId)
    }
}

fn le_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Header at the start of every asset group in flash. Group data follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AssetGroupHeader {
    pub data_size: u32,
    pub num_tiles: u16,
    pub ordinal: u16,
    pub crc: [u8; ASSET_GROUP_CRC_SIZE],
}

impl AssetGroupHeader {
    pub const SIZE: usize = 24;
    pub const DATA_SIZE_OFFSET: usize = 0;
    pub const NUM_TILES_OFFSET: usize = 4;
    pub const ORDINAL_OFFSET: usize = 6;
    pub const CRC_OFFSET: usize = 8;

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let mut crc = [0u8; ASSET_GROUP_CRC_SIZE];
        crc.copy_from_slice(&bytes[Self::CRC_OFFSET..Self::CRC_OFFSET + ASSET_GROUP_CRC_SIZE]);
        Self {
            data_size: le_u32(bytes, Self::DATA_SIZE_OFFSET),
            num_tiles: le_u16(bytes, Self::NUM_TILES_OFFSET),
            ordinal: le_u16(bytes, Self::ORDINAL_OFFSET),
            crc,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.data_size.to_le_bytes());
        out[4..6].copy_from_slice(&self.num_tiles.to_le_bytes());
        out[6..8].copy_from_slice(&self.ordinal.to_le_bytes());
        out[Self::CRC_OFFSET..].copy_from_slice(&self.crc);
        out
    }

    /// CRC-32 carried in the first four checksum bytes by the packaging tool.
    pub fn data_crc32(&self) -> u32 {
        le_u32(&self.crc, 0)
    }
}

/// Checksum field layout produced by the packaging tool: CRC-32 of the group
/// data in the first four bytes, the rest zero.
pub fn group_crc_from_crc32(crc32: u32) -> [u8; ASSET_GROUP_CRC_SIZE] {
    let mut crc = [0u8; ASSET_GROUP_CRC_SIZE];
    crc[..4].copy_from_slice(&crc32.to_le_bytes());
    crc
}

/// User-space group descriptor. Only the header pointer is read by firmware;
/// the per-cube records that follow are located with [`AssetGroup::cube_offset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AssetGroup {
    pub p_hdr: u32,
}

impl AssetGroup {
    pub const SIZE: usize = 4;
    pub const ALIGN: u32 = 4;

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        Self {
            p_hdr: le_u32(bytes, 0),
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        self.p_hdr.to_le_bytes()
    }

    /// Byte offset, from the descriptor start, of the record for `cube`.
    pub const fn cube_offset(cube: CubeId) -> u32 {
        (Self::SIZE + cube.index() * AssetGroupCube::SIZE) as u32
    }

    /// Descriptor plus one record per cube.
    pub const fn total_size() -> usize {
        Self::SIZE + NUM_CUBE_SLOTS * AssetGroupCube::SIZE
    }
}

/// Per-cube state recorded in user RAM after a group has been loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AssetGroupCube {
    pub base_addr: u16,
}

impl AssetGroupCube {
    pub const SIZE: usize = 4;

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        Self {
            base_addr: le_u16(bytes, 0),
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..2].copy_from_slice(&self.base_addr.to_le_bytes());
        out
    }
}

/// One entry of a user-supplied asset configuration.
///
/// This is always a snapshot: the table itself lives in user RAM and may be
/// rewritten by the application at any moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AssetConfiguration {
    pub p_group: u32,
    pub volume: u32,
    pub data_size: u32,
    pub num_tiles: u16,
    pub ordinal: u16,
    pub slot: u8,
}

impl AssetConfiguration {
    pub const SIZE: usize = 20;

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        Self {
            p_group: le_u32(bytes, 0),
            volume: le_u32(bytes, 4),
            data_size: le_u32(bytes, 8),
            num_tiles: le_u16(bytes, 12),
            ordinal: le_u16(bytes, 14),
            slot: bytes[16],
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.p_group.to_le_bytes());
        out[4..8].copy_from_slice(&self.volume.to_le_bytes());
        out[8..12].copy_from_slice(&self.data_size.to_le_bytes());
        out[12..14].copy_from_slice(&self.num_tiles.to_le_bytes());
        out[14..16].copy_from_slice(&self.ordinal.to_le_bytes());
        out[16] = self.slot;
        out
    }
}

/// Magic marking a used record in the flash volume directory.
pub const VOLUME_RECORD_MAGIC: u32 = 0x564F_4C31;
/// Directory capacity.
pub const MAX_VOLUMES: usize = 8;

/// Flash volume directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VolumeRecord {
    pub magic: u32,
    pub handle: u32,
    /// Payload start, relative to the flash base.
    pub payload_offset: u32,
    pub payload_size: u32,
    pub payload_crc: u32,
}

impl VolumeRecord {
    pub const SIZE: usize = 20;

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        Self {
            magic: le_u32(bytes, 0),
            handle: le_u32(bytes, 4),
            payload_offset: le_u32(bytes, 8),
            payload_size: le_u32(bytes, 12),
            payload_crc: le_u32(bytes, 16),
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.magic.to_le_bytes());
        out[4..8].copy_from_slice(&self.handle.to_le_bytes());
        out[8..12].copy_from_slice(&self.payload_offset.to_le_bytes());
        out[12..16].copy_from_slice(&self.payload_size.to_le_bytes());
        out[16..20].copy_from_slice(&self.payload_crc.to_le_bytes());
        out
    }

    pub fn is_used(&self) -> bool {
        self.magic == VOLUME_RECORD_MAGIC && self.handle != 0
    }
}
